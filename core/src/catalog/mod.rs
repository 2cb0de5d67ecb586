//! Descriptor catalog.
//!
//! Every generated code unit (coercion routine, whitelisted target, operator
//! implementation, closure method) is addressed by an interned
//! [`Descriptor`]. Interning the same name and parameter list twice yields
//! the same allocation, so descriptors compare and hash by identity.

use std::fmt;
use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use once_cell::sync::Lazy;

use crate::error::{Result, ScriptError};
use crate::typ::{ScriptType, join_types};
use crate::util::fast_map::PtrKey;

mod well_known;

pub use well_known::WellKnown;

#[derive(Debug)]
pub struct DescriptorData {
    name: Arc<str>,
    params: Box<[ScriptType]>,
    ret: ScriptType,
}

/// Interned operation descriptor: name, ordered parameter types, return type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Descriptor(PtrKey<DescriptorData>);

impl Descriptor {
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.0.name
    }

    #[inline]
    pub fn params(&self) -> &[ScriptType] {
        &self.0.0.params
    }

    #[inline]
    pub fn ret(&self) -> &ScriptType {
        &self.0.0.ret
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.0.0.params.len()
    }

    /// Identity check; equivalent to `==` but explicit at call sites that
    /// rely on interning.
    #[inline]
    pub fn same(&self, other: &Descriptor) -> bool {
        self.0 == other.0
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Descriptor({self})")
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}){}", self.name(), join_types(self.params()), self.ret())
    }
}

type SignatureKey = (Arc<str>, Box<[ScriptType]>);

/// Append-only intern table for descriptors.
#[derive(Default)]
pub struct DescriptorCatalog {
    entries: DashMap<SignatureKey, Descriptor>,
}

static GLOBAL_CATALOG: Lazy<DescriptorCatalog> = Lazy::new(DescriptorCatalog::new);

impl DescriptorCatalog {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Process-wide catalog shared by every compilation.
    pub fn global() -> &'static DescriptorCatalog {
        &GLOBAL_CATALOG
    }

    /// Returns the descriptor for `name(params) -> ret`, creating it on first
    /// use. Re-interning a known name and parameter list with a different
    /// return type is a registration bug and is reported as
    /// [`ScriptError::CatalogConflict`].
    pub fn intern(&self, name: &str, params: &[ScriptType], ret: ScriptType) -> Result<Descriptor> {
        let key: SignatureKey = (Arc::from(name), params.to_vec().into_boxed_slice());
        if let Some(existing) = self.entries.get(&key) {
            return Self::check_return(existing.value(), ret);
        }
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => Self::check_return(occupied.get(), ret),
            Entry::Vacant(slot) => {
                let (name, params) = slot.key().clone();
                let descriptor = Descriptor(PtrKey(Arc::new(DescriptorData { name, params, ret })));
                tracing::trace!(target: "scour::catalog", descriptor = %descriptor, "interned");
                slot.insert(descriptor.clone());
                Ok(descriptor)
            }
        }
    }

    /// Looks up an already interned descriptor without creating one.
    pub fn get(&self, name: &str, params: &[ScriptType]) -> Option<Descriptor> {
        let key: SignatureKey = (Arc::from(name), params.to_vec().into_boxed_slice());
        self.entries.get(&key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_return(existing: &Descriptor, ret: ScriptType) -> Result<Descriptor> {
        if *existing.ret() == ret {
            return Ok(existing.clone());
        }
        tracing::warn!(
            target: "scour::catalog",
            descriptor = %existing,
            requested = %ret,
            "conflicting descriptor registration"
        );
        Err(ScriptError::CatalogConflict {
            name: existing.0.0.name.clone(),
            params: join_types(existing.params()),
            existing: existing.ret().to_string(),
            requested: ret.to_string(),
        })
    }
}
