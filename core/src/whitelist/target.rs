use std::fmt;
use std::sync::Arc;

use crate::catalog::Descriptor;
use crate::error::{Result, ScriptError};
use crate::val::Val;

/// Host function backing a whitelisted operation. For instance operations
/// the receiver is `args[0]`.
pub type NativeFn = Arc<dyn Fn(&[Val]) -> anyhow::Result<Val> + Send + Sync>;

/// A resolved, invocable operation together with the descriptor naming it.
#[derive(Clone)]
pub struct Target {
    descriptor: Descriptor,
    func: NativeFn,
}

impl Target {
    pub fn new<F>(descriptor: Descriptor, func: F) -> Self
    where
        F: Fn(&[Val]) -> anyhow::Result<Val> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            func: Arc::new(func),
        }
    }

    pub fn from_native(descriptor: Descriptor, func: NativeFn) -> Self {
        Self { descriptor, func }
    }

    #[inline]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Two targets are the same when they share a descriptor and function.
    #[inline]
    pub fn same(&self, other: &Target) -> bool {
        self.descriptor.same(&other.descriptor) && Arc::ptr_eq(&self.func, &other.func)
    }

    /// Calls the host function. Script errors raised further down (for
    /// example by a closure the host invoked) keep their kind.
    #[inline]
    pub fn invoke(&self, args: &[Val]) -> Result<Val> {
        (self.func)(args).map_err(|err| match err.downcast::<ScriptError>() {
            Ok(script) => script,
            Err(other) => ScriptError::Host(other),
        })
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", self.descriptor)
    }
}
