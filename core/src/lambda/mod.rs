//! Lambda synthesis.
//!
//! A [`LambdaDescriptor`] is checked against the functional shape it
//! targets once, producing a [`ClosureFactory`]; every evaluation of the
//! lambda expression then binds the current captures into a [`Closure`].
//! Closures are ordinary host objects whose class is the shape name, so
//! calling the shape's method on one goes through the usual call sites.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, ScriptError, SiteLocation};
use crate::typ::ScriptType;
use crate::val::Val;
use crate::whitelist::{FunctionalShape, Lookup, Target};

mod cell;
mod closure;

pub use cell::{Capture, VarCell};
pub use closure::{Closure, ClosureFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    ByValue,
    ByRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedVariable {
    pub name: Arc<str>,
    pub ty: ScriptType,
    pub mode: CaptureMode,
}

impl CapturedVariable {
    pub fn by_value(name: impl Into<Arc<str>>, ty: ScriptType) -> Self {
        Self {
            name: name.into(),
            ty,
            mode: CaptureMode::ByValue,
        }
    }

    pub fn by_ref(name: impl Into<Arc<str>>, ty: ScriptType) -> Self {
        Self {
            name: name.into(),
            ty,
            mode: CaptureMode::ByRef,
        }
    }
}

/// Compiled lambda body: receives the bound captures, then the call
/// arguments already converted to the shape's parameter types.
pub type BodyFn = Arc<dyn Fn(&[Capture], &[Val]) -> Result<Val> + Send + Sync>;

#[derive(Clone)]
pub enum LambdaBody {
    Compiled { arity: usize, body: BodyFn },
    /// Forwards to an existing callable. Captures (at most a bound receiver)
    /// are passed ahead of the call arguments.
    Delegate(Target),
}

impl fmt::Debug for LambdaBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LambdaBody::Compiled { arity, .. } => write!(f, "Compiled(arity={arity})"),
            LambdaBody::Delegate(target) => write!(f, "Delegate({})", target.descriptor()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LambdaDescriptor {
    pub shape: Arc<str>,
    pub captures: Vec<CapturedVariable>,
    pub body: LambdaBody,
    pub location: SiteLocation,
}

/// Turns lambda descriptors into closure factories, rejecting descriptors
/// whose shape is unknown or does not fit the body.
pub struct LambdaSynthesizer {
    lookup: Arc<dyn Lookup>,
}

impl LambdaSynthesizer {
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        Self { lookup }
    }

    pub fn synthesize(&self, desc: LambdaDescriptor) -> Result<ClosureFactory> {
        let Some(shape) = self.lookup.functional_shape(&desc.shape) else {
            return Err(unknown_shape(&desc.location, &desc.shape));
        };
        let (expected, actual) = match &desc.body {
            LambdaBody::Compiled { arity, .. } => (shape.arity(), *arity),
            LambdaBody::Delegate(target) => (shape.arity() + desc.captures.len(), target.descriptor().arity()),
        };
        if expected != actual {
            return Err(ScriptError::rejected(
                &desc.location,
                "lambda does not fit its functional shape",
                shape.descriptor(),
                lambda_shape(&desc.body, actual),
            ));
        }
        tracing::debug!(
            target: "scour::lambda",
            shape = %shape.descriptor(),
            captures = desc.captures.len(),
            delegate = matches!(desc.body, LambdaBody::Delegate(_)),
            "synthesized closure"
        );
        Ok(ClosureFactory::new(
            shape,
            desc.captures.into(),
            desc.body,
            desc.location,
            self.lookup.clone(),
        ))
    }

    /// Synthesizes and binds in one step for a delegate to `target`,
    /// optionally bound to a receiver.
    pub fn delegate(&self, shape: &str, target: Target, receiver: Option<Val>, location: SiteLocation) -> Result<Closure> {
        let captures = match &receiver {
            Some(_) => vec![CapturedVariable::by_value("this", ScriptType::Def)],
            None => Vec::new(),
        };
        let factory = self.synthesize(LambdaDescriptor {
            shape: Arc::from(shape),
            captures,
            body: LambdaBody::Delegate(target),
            location,
        })?;
        factory.bind(receiver.map(Capture::Value).into_iter().collect())
    }

    pub fn lookup(&self) -> &dyn Lookup {
        self.lookup.as_ref()
    }
}

pub(crate) fn unknown_shape(location: &SiteLocation, shape: &str) -> ScriptError {
    ScriptError::rejected(location, "no functional shape with this name", "a whitelisted functional shape", shape)
}

fn lambda_shape(body: &LambdaBody, arity: usize) -> String {
    match body {
        LambdaBody::Compiled { .. } => format!("lambda taking {arity} argument(s)"),
        LambdaBody::Delegate(target) => target.descriptor().to_string(),
    }
}

/// Lambda synthesis callback.
///
/// Resolves `shape` in the caller's lookup, synthesizes `body` and binds
/// `captures` in order; by-value captures are those passed as values,
/// by-reference captures those passed as cells. Returns the closure object.
pub fn bootstrap(
    lookup: &Arc<dyn Lookup>,
    location: SiteLocation,
    shape: &str,
    body: LambdaBody,
    captures: Vec<Capture>,
) -> Result<Val> {
    let declared = captures
        .iter()
        .enumerate()
        .map(|(i, capture)| {
            let name: Arc<str> = Arc::from(format!("capture{i}"));
            match capture {
                Capture::Value(_) => CapturedVariable::by_value(name, ScriptType::Def),
                Capture::Cell(_) => CapturedVariable::by_ref(name, ScriptType::Def),
            }
        })
        .collect();
    let factory = LambdaSynthesizer::new(lookup.clone()).synthesize(LambdaDescriptor {
        shape: Arc::from(shape),
        captures: declared,
        body,
        location,
    })?;
    Ok(factory.bind(captures)?.into_val())
}
