use std::fmt;
use std::sync::Arc;

use anyhow::Context;

use super::frame::FrameLayout;
use super::writer::{SiteArena, Step};
use crate::coerce::{CastMode, CoercionTable};
use crate::dispatch::{CallSite, CallSiteId};
use crate::error::ScriptError;
use crate::typ::ScriptType;
use crate::util::fast_map::FastHashSet;
use crate::val::Val;
use crate::whitelist::Lookup;

/// Executable form of one unit. Immutable once built; any number of threads
/// may execute it at the same time.
pub struct CompiledUnit {
    name: Arc<str>,
    params: Box<[(Arc<str>, ScriptType)]>,
    needs: FastHashSet<Arc<str>>,
    layout: FrameLayout,
    body: Step,
    sites: SiteArena,
    lookup: Arc<dyn Lookup>,
}

impl CompiledUnit {
    pub(super) fn new(
        name: Arc<str>,
        params: Vec<(Arc<str>, ScriptType)>,
        needs: FastHashSet<Arc<str>>,
        layout: FrameLayout,
        body: Step,
        sites: SiteArena,
        lookup: Arc<dyn Lookup>,
    ) -> Self {
        Self {
            name,
            params: params.into(),
            needs,
            layout,
            body,
            sites,
            lookup,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &ScriptType)> {
        self.params.iter().map(|(name, ty)| (name.as_ref(), ty))
    }

    /// Whether the body reads parameter `name`. Parameters it never reads
    /// may be left unbound.
    #[inline]
    pub fn needs(&self, name: &str) -> bool {
        self.needs.contains(name)
    }

    pub fn call_sites(&self) -> impl Iterator<Item = (CallSiteId, &CallSite)> {
        self.sites.get().into_iter().flat_map(|table| table.iter())
    }

    /// Runs the unit. Bound values convert implicitly to their declared
    /// parameter types; names that are not parameters are ignored.
    pub fn execute(&self, bindings: &[(&str, Val)]) -> anyhow::Result<Val> {
        let table = CoercionTable::global()?;
        let mut frame = self.layout.frame();
        for (slot, (name, ty)) in self.params.iter().enumerate() {
            let bound = bindings.iter().find(|(n, _)| *n == name.as_ref()).map(|(_, v)| v);
            match bound {
                Some(val) => {
                    let val = table
                        .coerce(val, ty, CastMode::Implicit, Some(self.lookup.as_ref()))
                        .with_context(|| format!("binding parameter `{name}` of {}", self.name))?;
                    frame.set(slot, val);
                }
                None if self.needs(name) => return Err(ScriptError::MissingParameter(name.to_string()).into()),
                None => {}
            }
        }
        (self.body)(&mut frame).with_context(|| format!("executing {}", self.name))
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("slots", &self.layout.len())
            .field("call_sites", &self.call_sites().count())
            .finish()
    }
}
