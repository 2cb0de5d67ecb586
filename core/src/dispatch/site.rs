use std::borrow::Cow;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use super::{DispatchFlags, DispatchKind, InlineCache, Resolver, Signature, describe_args};
use crate::coerce::{CastMode, CoercionTable};
use crate::error::{Result, ScriptError, SiteLocation};
use crate::typ::ScriptType;
use crate::val::Val;
use crate::whitelist::{Lookup, Target};

/// One dynamic-operation occurrence in compiled source.
pub struct CallSite {
    location: SiteLocation,
    kind: DispatchKind,
    name: Arc<str>,
    signature: Signature,
    flags: DispatchFlags,
    resolver: Arc<dyn Resolver>,
    cache: InlineCache,
}

impl CallSite {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        location: SiteLocation,
        kind: DispatchKind,
        name: impl Into<Arc<str>>,
        signature: Signature,
        flags: DispatchFlags,
        resolver: Arc<dyn Resolver>,
        depth: usize,
    ) -> Self {
        Self {
            location,
            kind,
            name: name.into(),
            signature,
            flags,
            resolver,
            cache: InlineCache::new(depth),
        }
    }

    #[inline]
    pub fn location(&self) -> &SiteLocation {
        &self.location
    }

    #[inline]
    pub fn kind(&self) -> DispatchKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn flags(&self) -> DispatchFlags {
        self.flags
    }

    #[inline]
    pub fn cache(&self) -> &InlineCache {
        &self.cache
    }

    /// Runs the operation: cached target when the argument shape was seen
    /// before, otherwise resolve, cache while below the bound, and call.
    pub fn invoke(&self, args: &[Val]) -> Result<Val> {
        if self.kind.has_receiver() && args.first().is_some_and(Val::is_null) {
            if self.flags.contains(DispatchFlags::ALLOWS_NULL) {
                return Ok(Val::Null);
            }
            return Err(self.failure(args, "receiver is null"));
        }
        if let Some(target) = self.cache.probe(args) {
            return self.call(target, args);
        }
        let target = self.resolve(args)?;
        self.cache.insert(args, &target);
        self.call(&target, args)
    }

    /// Resolves without consulting or filling the cache.
    pub fn resolve(&self, args: &[Val]) -> Result<Target> {
        self.cache.record_lookup();
        self.resolver.resolve(self, args).inspect_err(|err| {
            tracing::debug!(
                target: "scour::dispatch",
                site = %self.location,
                name = %self.name,
                args = %describe_args(args),
                error = %err,
                "resolution failed"
            );
        })
    }

    pub(crate) fn failure(&self, args: &[Val], reason: impl Into<String>) -> ScriptError {
        ScriptError::Dispatch {
            location: self.location.clone(),
            name: self.name.clone(),
            arg_types: describe_args(args),
            reason: reason.into(),
        }
    }

    fn call(&self, target: &Target, args: &[Val]) -> Result<Val> {
        let lookup = self.resolver.lookup();
        let adapted = adapt_args(target.descriptor().params(), args, lookup)?;
        let result = target.invoke(&adapted)?;
        match self.signature.ret() {
            ScriptType::Def => Ok(result),
            ScriptType::Void => Ok(Val::Null),
            ret => {
                let mode = if self.flags.contains(DispatchFlags::EXPLICIT_CAST) {
                    CastMode::Explicit
                } else {
                    CastMode::Implicit
                };
                CoercionTable::global()?.coerce(&result, ret, mode, lookup)
            }
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("location", &self.location)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Implicitly converts `args` into the parameter types a target declares.
/// Borrows when every argument already conforms.
pub(crate) fn adapt_args<'a>(
    params: &[ScriptType],
    args: &'a [Val],
    lookup: Option<&dyn Lookup>,
) -> Result<Cow<'a, [Val]>> {
    if params.len() != args.len() || params.iter().zip(args).all(|(p, a)| conforms(p, a)) {
        return Ok(Cow::Borrowed(args));
    }
    let table = CoercionTable::global()?;
    let converted = params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            if conforms(param, arg) {
                Ok(arg.clone())
            } else {
                table.coerce(arg, param, CastMode::Implicit, lookup)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Cow::Owned(converted))
}

#[inline]
fn conforms(param: &ScriptType, arg: &Val) -> bool {
    match param {
        ScriptType::Def | ScriptType::Void => true,
        ScriptType::Primitive(tag) => arg.tag() == *tag,
        ScriptType::Boxed(tag) => arg.is_null() || arg.tag() == *tag,
        ScriptType::Text => matches!(arg, Val::Str(_) | Val::Null),
        ScriptType::Object(_) => matches!(arg, Val::Object(_) | Val::Null),
    }
}

/// Stable handle to a call site inside its unit's [`CallSiteTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSiteId(u32);

impl CallSiteId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena owning every call site of one compiled unit. Sites are appended
/// while compiling and never removed; the table is dropped with the unit.
#[derive(Debug, Default)]
pub struct CallSiteTable {
    sites: Vec<CallSite>,
}

impl CallSiteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, site: CallSite) -> CallSiteId {
        let id = CallSiteId(self.sites.len() as u32);
        self.sites.push(site);
        id
    }

    #[inline]
    pub fn get(&self, id: CallSiteId) -> Option<&CallSite> {
        self.sites.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CallSiteId, &CallSite)> {
        self.sites.iter().enumerate().map(|(i, site)| (CallSiteId(i as u32), site))
    }
}

impl Index<CallSiteId> for CallSiteTable {
    type Output = CallSite;

    #[inline]
    fn index(&self, id: CallSiteId) -> &CallSite {
        &self.sites[id.index()]
    }
}
