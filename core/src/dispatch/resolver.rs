use std::sync::Arc;

use super::CallSite;
use super::bootstrap::{self, CallContext};
use crate::error::Result;
use crate::val::Val;
use crate::whitelist::{Lookup, Target};

/// Fallback invoked by a call site when its cache cannot answer.
pub trait Resolver: Send + Sync {
    fn resolve(&self, site: &CallSite, args: &[Val]) -> Result<Target>;

    /// Lookup used for object-typed argument and result conversions.
    fn lookup(&self) -> Option<&dyn Lookup> {
        None
    }
}

/// Resolves against a whitelist through the dispatch bootstrap.
#[derive(Clone)]
pub struct LookupResolver {
    lookup: Arc<dyn Lookup>,
}

impl LookupResolver {
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        Self { lookup }
    }
}

impl Resolver for LookupResolver {
    fn resolve(&self, site: &CallSite, args: &[Val]) -> Result<Target> {
        let ctx = CallContext::new(&self.lookup, site.location().clone());
        bootstrap::resolve(&ctx, site.kind(), site.name(), site.signature(), site.flags(), args)
    }

    fn lookup(&self) -> Option<&dyn Lookup> {
        Some(self.lookup.as_ref())
    }
}
