//! Type-checked operation tree handed to the [`Writer`](super::Writer).
//!
//! Names are already resolved to declarations by the checker; every dynamic
//! operation carries the static types the checker settled on and the source
//! offset diagnostics point at.

use std::sync::Arc;

use crate::coerce::CastMode;
use crate::dispatch::{DispatchFlags, DispatchKind};
use crate::lambda::CapturedVariable;
use crate::typ::ScriptType;
use crate::val::Val;

#[derive(Debug, Clone)]
pub enum Node {
    Const(Val),
    /// Reads a unit parameter.
    Param(Arc<str>),
    /// Reads a local, a lambda parameter or a captured variable.
    Local(Arc<str>),
    /// Declares a local of type `ty`; yields the stored value.
    Let {
        name: Arc<str>,
        ty: ScriptType,
        value: Box<Node>,
    },
    /// Assigns a declared variable, converting to its type; yields the stored value.
    Store { name: Arc<str>, value: Box<Node> },
    /// Evaluates in order; yields the last value, `null` when empty.
    Seq(Vec<Node>),
    Cast {
        value: Box<Node>,
        to: ScriptType,
        mode: CastMode,
    },
    Dynamic(DynamicOp),
    /// String concatenation of all operands, left to right.
    Concat { operands: Vec<Node>, offset: u32 },
    Lambda(LambdaNode),
    /// `Class::function` or `receiver::method` bound to a functional shape.
    MethodRef {
        shape: Arc<str>,
        target: RefTarget,
        offset: u32,
    },
    /// `for (ty name : iterable) body` over a dynamic iterable. The
    /// iterator protocol goes through call sites; each element converts
    /// explicitly to `ty`. Yields `null`.
    ForEach {
        name: Arc<str>,
        ty: ScriptType,
        iterable: Box<Node>,
        body: Box<Node>,
        offset: u32,
    },
    /// `[a, b, ..]`: a whitelisted list sized for the elements, filled in order.
    ListInit { elements: Vec<Node>, offset: u32 },
}

/// Operation whose target depends on runtime argument types.
#[derive(Debug, Clone)]
pub struct DynamicOp {
    pub kind: DispatchKind,
    pub name: Arc<str>,
    /// Receiver first for kinds that take one.
    pub args: Vec<Node>,
    /// Type of the slot the result flows into.
    pub ret: ScriptType,
    pub flags: DispatchFlags,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct LambdaNode {
    pub shape: Arc<str>,
    pub captures: Vec<CapturedVariable>,
    pub params: Vec<Arc<str>>,
    pub body: Box<Node>,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub enum RefTarget {
    /// Whitelisted static function.
    Function(Arc<str>),
    /// Method of a receiver whose class the checker knows statically.
    Bound {
        receiver: Box<Node>,
        class: Arc<str>,
        method: Arc<str>,
    },
}

impl Node {
    pub fn param(name: &str) -> Node {
        Node::Param(Arc::from(name))
    }

    pub fn local(name: &str) -> Node {
        Node::Local(Arc::from(name))
    }

    pub fn declare(name: &str, ty: ScriptType, value: Node) -> Node {
        Node::Let {
            name: Arc::from(name),
            ty,
            value: Box::new(value),
        }
    }

    pub fn store(name: &str, value: Node) -> Node {
        Node::Store {
            name: Arc::from(name),
            value: Box::new(value),
        }
    }

    pub fn cast(value: Node, to: ScriptType, mode: CastMode) -> Node {
        Node::Cast {
            value: Box::new(value),
            to,
            mode,
        }
    }

    /// Dynamic operation yielding `def` with no flags.
    pub fn dynamic(kind: DispatchKind, name: &str, args: Vec<Node>, offset: u32) -> Node {
        Node::Dynamic(DynamicOp::new(kind, name, args, offset))
    }

    /// `receiver.name(args..)`
    pub fn call(receiver: Node, name: &str, args: Vec<Node>, offset: u32) -> Node {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(receiver);
        all.extend(args);
        Node::dynamic(DispatchKind::MethodCall, name, all, offset)
    }

    pub fn for_each(name: &str, ty: ScriptType, iterable: Node, body: Node, offset: u32) -> Node {
        Node::ForEach {
            name: Arc::from(name),
            ty,
            iterable: Box::new(iterable),
            body: Box::new(body),
            offset,
        }
    }

    pub fn list(elements: Vec<Node>, offset: u32) -> Node {
        Node::ListInit { elements, offset }
    }

        pub fn binary(name: &str, lhs: Node, rhs: Node, offset: u32) -> Node {
        Node::dynamic(DispatchKind::BinaryOperator, name, vec![lhs, rhs], offset)
    }
}

impl From<Val> for Node {
    fn from(val: Val) -> Node {
        Node::Const(val)
    }
}

impl From<DynamicOp> for Node {
    fn from(op: DynamicOp) -> Node {
        Node::Dynamic(op)
    }
}

impl DynamicOp {
    pub fn new(kind: DispatchKind, name: &str, args: Vec<Node>, offset: u32) -> Self {
        Self {
            kind,
            name: Arc::from(name),
            args,
            ret: ScriptType::Def,
            flags: DispatchFlags::NONE,
            offset,
        }
    }

    pub fn returning(mut self, ret: ScriptType) -> Self {
        self.ret = ret;
        self
    }

    pub fn with_flags(mut self, flags: DispatchFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// One compilation unit: declared parameters and the body.
#[derive(Debug, Clone)]
pub struct UnitSource {
    pub name: Arc<str>,
    pub params: Vec<(Arc<str>, ScriptType)>,
    pub body: Node,
}

impl UnitSource {
    pub fn new(name: &str, body: Node) -> Self {
        Self {
            name: Arc::from(name),
            params: Vec::new(),
            body,
        }
    }

    pub fn param(mut self, name: &str, ty: ScriptType) -> Self {
        self.params.push((Arc::from(name), ty));
        self
    }
}
