use std::sync::Arc;

use super::frame::FrameLayout;
use super::ir::{Node, RefTarget};
use crate::lambda::CaptureMode;
use crate::typ::ScriptType;
use crate::util::fast_map::{FastHashMap, FastHashSet, fast_hash_map_new, fast_hash_set_new};

#[derive(Debug, Clone)]
pub(super) struct Binding {
    pub(super) slot: usize,
    pub(super) ty: ScriptType,
    /// Declared as a unit parameter; reading it makes the unit need it.
    pub(super) param: bool,
}

/// Names visible in one function frame and the slots they occupy.
/// Later declarations shadow earlier ones of the same name.
pub(super) struct Scope {
    bindings: FastHashMap<Arc<str>, Binding>,
    by_ref: FastHashSet<Arc<str>>,
    cells: Vec<bool>,
}

impl Scope {
    /// Scope for a function whose body is `body`. Variables that a lambda
    /// directly inside `body` captures by reference get cell slots.
    pub(super) fn new(body: &Node) -> Self {
        let mut by_ref = fast_hash_set_new();
        collect_by_ref(body, &mut by_ref);
        Self {
            bindings: fast_hash_map_new(),
            by_ref,
            cells: Vec::new(),
        }
    }

    pub(super) fn declare(&mut self, name: &Arc<str>, ty: ScriptType, param: bool) -> usize {
        let slot = self.cells.len();
        self.cells.push(self.by_ref.contains(name));
        self.bindings.insert(name.clone(), Binding { slot, ty, param });
        slot
    }

    #[inline]
    pub(super) fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    #[inline]
    pub(super) fn is_cell(&self, slot: usize) -> bool {
        self.cells.get(slot).copied().unwrap_or(false)
    }

    pub(super) fn into_layout(self) -> FrameLayout {
        FrameLayout::new(self.cells)
    }
}

/// Names captured by reference by lambdas in `node`, not descending into
/// lambda bodies: those are frames of their own.
fn collect_by_ref(node: &Node, out: &mut FastHashSet<Arc<str>>) {
    match node {
        Node::Const(_) | Node::Param(_) | Node::Local(_) => {}
        Node::Let { value, .. } | Node::Store { value, .. } | Node::Cast { value, .. } => collect_by_ref(value, out),
        Node::Seq(nodes) | Node::Concat { operands: nodes, .. } | Node::ListInit { elements: nodes, .. } => {
            for n in nodes {
                collect_by_ref(n, out);
            }
        }
        Node::Dynamic(op) => {
            for arg in &op.args {
                collect_by_ref(arg, out);
            }
        }
        Node::Lambda(lambda) => {
            out.extend(
                lambda
                    .captures
                    .iter()
                    .filter(|c| c.mode == CaptureMode::ByRef)
                    .map(|c| c.name.clone()),
            );
        }
        Node::ForEach { iterable, body, .. } => {
            collect_by_ref(iterable, out);
            collect_by_ref(body, out);
        }
        Node::MethodRef { target, .. } => {
            if let RefTarget::Bound { receiver, .. } = target {
                collect_by_ref(receiver, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::ir::LambdaNode;
    use crate::lambda::CapturedVariable;
    use crate::val::Val;

    fn lambda(captures: Vec<CapturedVariable>, body: Node) -> Node {
        Node::Lambda(LambdaNode {
            shape: Arc::from("IntSupplier"),
            captures,
            params: Vec::new(),
            body: Box::new(body),
            offset: 0,
        })
    }

    #[test]
    fn only_direct_by_ref_captures_become_cells() {
        let inner = lambda(vec![CapturedVariable::by_ref("deep", ScriptType::INT)], Node::local("deep"));
        let body = Node::Seq(vec![
            lambda(vec![CapturedVariable::by_ref("n", ScriptType::INT)], inner),
            lambda(vec![CapturedVariable::by_value("m", ScriptType::INT)], Node::Const(Val::Null)),
        ]);
        let mut scope = Scope::new(&body);
        let n = scope.declare(&Arc::from("n"), ScriptType::INT, false);
        let m = scope.declare(&Arc::from("m"), ScriptType::INT, false);
        let deep = scope.declare(&Arc::from("deep"), ScriptType::INT, false);
        assert!(scope.is_cell(n));
        assert!(!scope.is_cell(m));
        assert!(!scope.is_cell(deep));
        assert_eq!(scope.into_layout().len(), 3);
    }

    #[test]
    fn later_declarations_shadow() {
        let mut scope = Scope::new(&Node::Seq(Vec::new()));
        let name: Arc<str> = Arc::from("x");
        scope.declare(&name, ScriptType::INT, true);
        let second = scope.declare(&name, ScriptType::Text, false);
        let binding = scope.lookup("x").unwrap();
        assert_eq!(binding.slot, second);
        assert_eq!(binding.ty, ScriptType::Text);
        assert!(!binding.param);
    }
}
