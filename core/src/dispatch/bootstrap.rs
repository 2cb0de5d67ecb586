//! Dynamic dispatch resolution callback.
//!
//! Given the calling context, the operation name, its static signature, the
//! flag set and the runtime arguments, produce the target the operation
//! should invoke for these argument types. No caching happens here; call
//! sites cache what this returns.

use std::sync::Arc;

use anyhow::anyhow;

use super::{DispatchFlags, DispatchKind, Signature, describe_args, operators};
use crate::catalog::DescriptorCatalog;
use crate::error::{Result, ScriptError, SiteLocation};
use crate::lambda::Closure;
use crate::typ::ScriptType;
use crate::val::Val;
use crate::whitelist::{FunctionalShape, Lookup, Target};

/// Calling-context handle: where the operation lives and what it may call.
pub struct CallContext<'a> {
    lookup: &'a Arc<dyn Lookup>,
    location: SiteLocation,
}

impl<'a> CallContext<'a> {
    pub fn new(lookup: &'a Arc<dyn Lookup>, location: SiteLocation) -> Self {
        Self { lookup, location }
    }

    #[inline]
    pub fn lookup(&self) -> &'a dyn Lookup {
        self.lookup.as_ref()
    }

    #[inline]
    pub fn location(&self) -> &SiteLocation {
        &self.location
    }

    fn failure(&self, name: &str, args: &[Val], reason: impl Into<String>) -> ScriptError {
        ScriptError::Dispatch {
            location: self.location.clone(),
            name: name.into(),
            arg_types: describe_args(args),
            reason: reason.into(),
        }
    }
}

/// Entry point for hosts passing the flag set as raw bits.
pub fn bootstrap(
    ctx: &CallContext<'_>,
    kind: DispatchKind,
    name: &str,
    signature: &Signature,
    flags: u8,
    args: &[Val],
) -> Result<Target> {
    let flags = DispatchFlags::from_bits(flags)
        .ok_or_else(|| ctx.failure(name, args, format!("unknown flag bits {flags:#04x}")))?;
    resolve(ctx, kind, name, signature, flags, args)
}

pub fn resolve(
    ctx: &CallContext<'_>,
    kind: DispatchKind,
    name: &str,
    signature: &Signature,
    flags: DispatchFlags,
    args: &[Val],
) -> Result<Target> {
    if kind.has_receiver() {
        match args.first() {
            None => return Err(ctx.failure(name, args, "missing receiver")),
            Some(Val::Null) => return Err(ctx.failure(name, args, "receiver is null")),
            Some(_) => {}
        }
    }
    let resolved = match kind {
        DispatchKind::MethodCall => resolve_method(ctx, name, args)?,
        DispatchKind::Load if args.len() == 1 => ctx.lookup.getter(args[0].type_name(), name),
        DispatchKind::Store if args.len() == 2 => ctx.lookup.setter(args[0].type_name(), name),
        DispatchKind::Load | DispatchKind::Store => None,
        DispatchKind::Reference => resolve_reference(ctx, name, signature, args)?,
        DispatchKind::UnaryOperator | DispatchKind::BinaryOperator | DispatchKind::ShiftOperator => {
            operators::resolve(kind, name, flags, args)?
        }
    };
    resolved.ok_or_else(|| ctx.failure(name, args, "no permitted target for these argument types"))
}

fn resolve_method(ctx: &CallContext<'_>, name: &str, args: &[Val]) -> Result<Option<Target>> {
    let Some((receiver, rest)) = args.split_first() else {
        return Ok(None);
    };
    if let Some(closure) = Closure::from_val(receiver) {
        let shape = closure.shape();
        if shape.method().as_ref() == name && shape.arity() == rest.len() {
            return closure_invoker(shape).map(Some);
        }
    }
    Ok(ctx.lookup.method(receiver.type_name(), name, rest.len()))
}

/// Target calling whatever closure of `shape` arrives as the receiver.
fn closure_invoker(shape: &FunctionalShape) -> Result<Target> {
    let mut params = Vec::with_capacity(shape.arity() + 1);
    params.push(ScriptType::Object(shape.name().clone()));
    params.extend_from_slice(shape.params());
    let descriptor = DescriptorCatalog::global().intern(
        &format!("{}.{}", shape.name(), shape.method()),
        &params,
        shape.ret().clone(),
    )?;
    Ok(Target::new(descriptor, |args| {
        let (receiver, rest) = args.split_first().ok_or_else(|| anyhow!("missing closure receiver"))?;
        let closure = Closure::from_val(receiver).ok_or_else(|| anyhow!("{} is not a closure", receiver.type_name()))?;
        Ok(closure.call(rest)?)
    }))
}

/// `receiver::name` bound to the functional shape the site returns. The
/// same method may be referenced into several shapes, so the shape is part
/// of the descriptor name.
fn resolve_reference(ctx: &CallContext<'_>, name: &str, signature: &Signature, args: &[Val]) -> Result<Option<Target>> {
    let ScriptType::Object(shape_name) = signature.ret() else {
        return Err(ctx.failure(name, args, format!("method reference must produce a functional shape, not {}", signature.ret())));
    };
    let Some(shape) = ctx.lookup.functional_shape(shape_name) else {
        return Err(ctx.failure(name, args, format!("unknown functional shape {shape_name}")));
    };
    let [receiver] = args else {
        return Ok(None);
    };
    let Some(method) = ctx.lookup.method(receiver.type_name(), name, shape.arity()) else {
        return Ok(None);
    };
    let receiver_type = ScriptType::parse(receiver.type_name()).unwrap_or_else(|| ScriptType::object(receiver.type_name()));
    let descriptor = DescriptorCatalog::global().intern(
        &format!("{}::{name}->{shape_name}", receiver.type_name()),
        &[receiver_type],
        ScriptType::Object(shape_name.clone()),
    )?;
    let lookup = Arc::clone(ctx.lookup);
    Ok(Some(Target::new(descriptor, move |args| {
        let receiver = args.first().cloned().unwrap_or_default();
        Ok(Closure::bound_method(shape.clone(), method.clone(), Some(receiver), lookup.clone()).into_val())
    })))
}
