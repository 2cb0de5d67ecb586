use std::fmt;
use std::sync::Arc;

use super::{Capture, CaptureMode, CapturedVariable, LambdaBody};
use crate::coerce::{CastMode, CoercionTable};
use crate::dispatch::{adapt_args, describe_args};
use crate::error::{Result, ScriptError, SiteLocation};
use crate::typ::ScriptType;
use crate::val::{HostRef, Val};
use crate::whitelist::{FunctionalShape, Lookup, Target};

/// A synthesized lambda, ready to be bound once per evaluation.
pub struct ClosureFactory {
    shape: FunctionalShape,
    captures: Arc<[CapturedVariable]>,
    body: LambdaBody,
    location: SiteLocation,
    lookup: Arc<dyn Lookup>,
}

impl ClosureFactory {
    pub(super) fn new(
        shape: FunctionalShape,
        captures: Arc<[CapturedVariable]>,
        body: LambdaBody,
        location: SiteLocation,
        lookup: Arc<dyn Lookup>,
    ) -> Self {
        Self {
            shape,
            captures,
            body,
            location,
            lookup,
        }
    }

    #[inline]
    pub fn shape(&self) -> &FunctionalShape {
        &self.shape
    }

    #[inline]
    pub fn captures(&self) -> &[CapturedVariable] {
        &self.captures
    }

    /// Binds the current captures. By-value captures are converted to their
    /// declared type and copied; by-reference captures must be cells.
    pub fn bind(&self, captures: Vec<Capture>) -> Result<Closure> {
        if captures.len() != self.captures.len() {
            return Err(ScriptError::rejected(
                &self.location,
                "wrong number of captured values",
                self.captures.len(),
                captures.len(),
            ));
        }
        let table = CoercionTable::global()?;
        let bound = self
            .captures
            .iter()
            .zip(captures)
            .map(|(decl, capture)| match (decl.mode, capture) {
                (CaptureMode::ByValue, Capture::Value(v)) => {
                    Ok(Capture::Value(table.coerce(&v, &decl.ty, CastMode::Implicit, Some(self.lookup.as_ref()))?))
                }
                (CaptureMode::ByRef, cell @ Capture::Cell(_)) => Ok(cell),
                (mode, _) => Err(ScriptError::rejected(
                    &self.location,
                    format!("capture `{}` bound with the wrong mode", decl.name),
                    format!("{mode:?}"),
                    "the other mode",
                )),
            })
            .collect::<Result<Box<[_]>>>()?;
        Ok(Closure {
            shape: self.shape.clone(),
            captures: bound,
            body: self.body.clone(),
            location: self.location.clone(),
            lookup: self.lookup.clone(),
        })
    }
}

impl fmt::Debug for ClosureFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureFactory")
            .field("shape", self.shape.descriptor())
            .field("captures", &self.captures)
            .field("body", &self.body)
            .finish()
    }
}

/// Bound closure implementing a functional shape. Object-typed arguments,
/// captures and results convert through the lookup it was synthesized with.
pub struct Closure {
    shape: FunctionalShape,
    captures: Box<[Capture]>,
    body: LambdaBody,
    location: SiteLocation,
    lookup: Arc<dyn Lookup>,
}

impl Closure {
    /// Delegate closure for a method reference, bound to `receiver` when
    /// the method is an instance method.
    pub fn bound_method(shape: FunctionalShape, target: Target, receiver: Option<Val>, lookup: Arc<dyn Lookup>) -> Closure {
        Closure {
            shape,
            captures: receiver.map(Capture::Value).into_iter().collect(),
            body: LambdaBody::Delegate(target),
            location: SiteLocation::detached(),
            lookup,
        }
    }

    #[inline]
    pub fn shape(&self) -> &FunctionalShape {
        &self.shape
    }

    #[inline]
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self.body, LambdaBody::Delegate(_))
    }

    /// Calls the shape's method: arguments convert to the shape's parameter
    /// types, the result to its return type.
    pub fn call(&self, args: &[Val]) -> Result<Val> {
        if args.len() != self.shape.arity() {
            return Err(ScriptError::Dispatch {
                location: self.location.clone(),
                name: self.shape.method().clone(),
                arg_types: describe_args(args),
                reason: format!("{} expects {} argument(s)", self.shape.descriptor(), self.shape.arity()),
            });
        }
        let lookup = Some(self.lookup.as_ref());
        let args = adapt_args(self.shape.params(), args, lookup)?;
        let result = match &self.body {
            LambdaBody::Compiled { body, .. } => body(&self.captures[..], args.as_ref())?,
            LambdaBody::Delegate(target) if self.captures.is_empty() => {
                target.invoke(&adapt_args(target.descriptor().params(), args.as_ref(), lookup)?)?
            }
            LambdaBody::Delegate(target) => {
                let mut full = Vec::with_capacity(self.captures.len() + args.len());
                full.extend(self.captures.iter().map(Capture::get));
                full.extend_from_slice(args.as_ref());
                target.invoke(&adapt_args(target.descriptor().params(), &full, lookup)?)?
            }
        };
        match self.shape.ret() {
            ScriptType::Void => Ok(Val::Null),
            ScriptType::Def => Ok(result),
            ret => CoercionTable::global()?.coerce(&result, ret, CastMode::Implicit, lookup),
        }
    }

    pub fn into_val(self) -> Val {
        Val::Object(HostRef::new(self.shape.name().clone(), self))
    }

    pub fn from_val(val: &Val) -> Option<&Closure> {
        val.as_object()?.downcast_ref::<Closure>()
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("shape", self.shape.descriptor())
            .field("captures", &self.captures)
            .field("body", &self.body)
            .finish()
    }
}
