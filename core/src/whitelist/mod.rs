//! Permitted-API lookup.
//!
//! The backend only consumes the [`Lookup`] trait; [`Whitelist`] is the
//! immutable implementation hosts normally build once through
//! [`WhitelistBuilder`] and share by reference.

use std::sync::Arc;

use crate::catalog::Descriptor;
use crate::typ::ScriptType;
use crate::util::fast_map::FastHashMap;

mod builder;
mod target;

pub use builder::WhitelistBuilder;
pub use target::{NativeFn, Target};

/// Root class every whitelisted class derives from.
pub const ROOT_CLASS: &str = "Object";

/// Queries the backend issues against the host's permitted API.
///
/// Every query returns zero or one target. Implementations must not change
/// their answers while compiled units that consult them are alive.
pub trait Lookup: Send + Sync {
    /// Instance method `name` taking `arity` arguments besides the receiver.
    fn method(&self, class: &str, name: &str, arity: usize) -> Option<Target>;
    /// Static function callable without a receiver.
    fn function(&self, name: &str, arity: usize) -> Option<Target>;
    fn getter(&self, class: &str, field: &str) -> Option<Target>;
    fn setter(&self, class: &str, field: &str) -> Option<Target>;
    fn functional_shape(&self, name: &str) -> Option<FunctionalShape>;
    fn is_assignable(&self, from: &str, to: &str) -> bool;
}

/// Single-method interface a closure can be bound to.
#[derive(Debug, Clone)]
pub struct FunctionalShape {
    name: Arc<str>,
    method: Arc<str>,
    descriptor: Descriptor,
}

impl FunctionalShape {
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub fn method(&self) -> &Arc<str> {
        &self.method
    }

    /// `Shape.method(params)ret`
    #[inline]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    #[inline]
    pub fn params(&self) -> &[ScriptType] {
        self.descriptor.params()
    }

    #[inline]
    pub fn ret(&self) -> &ScriptType {
        self.descriptor.ret()
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.descriptor.arity()
    }
}

#[derive(Default)]
pub(crate) struct ClassEntry {
    parent: Option<Arc<str>>,
    /// name -> arity -> target
    methods: FastHashMap<Arc<str>, FastHashMap<usize, Target>>,
    getters: FastHashMap<Arc<str>, Target>,
    setters: FastHashMap<Arc<str>, Target>,
}

/// Immutable whitelist.
#[derive(Default)]
pub struct Whitelist {
    classes: FastHashMap<Arc<str>, ClassEntry>,
    functions: FastHashMap<Arc<str>, FastHashMap<usize, Target>>,
    shapes: FastHashMap<Arc<str>, FunctionalShape>,
}

impl Whitelist {
    pub fn builder() -> WhitelistBuilder<'static> {
        WhitelistBuilder::new()
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Visits `class`, its declared ancestors, then the root. Unknown
    /// classes go straight to the root.
    fn ancestry<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a ClassEntry> + 'a {
        let limit = self.classes.len() + 1;
        let mut next: Option<&'a str> = Some(class);
        let mut reached_root = false;
        let mut steps = 0;
        std::iter::from_fn(move || {
            while steps <= limit {
                steps += 1;
                let name = match next.take() {
                    Some(name) => name,
                    None if !reached_root => ROOT_CLASS,
                    None => return None,
                };
                if name == ROOT_CLASS {
                    reached_root = true;
                }
                let Some(entry) = self.classes.get(name) else {
                    continue;
                };
                next = entry.parent.as_deref();
                return Some(entry);
            }
            None
        })
    }
}

impl Lookup for Whitelist {
    fn method(&self, class: &str, name: &str, arity: usize) -> Option<Target> {
        self.ancestry(class)
            .find_map(|entry| entry.methods.get(name).and_then(|by_arity| by_arity.get(&arity)))
            .cloned()
    }

    fn function(&self, name: &str, arity: usize) -> Option<Target> {
        self.functions.get(name).and_then(|by_arity| by_arity.get(&arity)).cloned()
    }

    fn getter(&self, class: &str, field: &str) -> Option<Target> {
        self.ancestry(class).find_map(|entry| entry.getters.get(field)).cloned()
    }

    fn setter(&self, class: &str, field: &str) -> Option<Target> {
        self.ancestry(class).find_map(|entry| entry.setters.get(field)).cloned()
    }

    fn functional_shape(&self, name: &str) -> Option<FunctionalShape> {
        self.shapes.get(name).cloned()
    }

    fn is_assignable(&self, from: &str, to: &str) -> bool {
        if from == to || to == ROOT_CLASS {
            return true;
        }
        let mut current = self.classes.get(from).and_then(|e| e.parent.as_deref());
        let mut steps = 0;
        while let Some(name) = current {
            if name == to {
                return true;
            }
            steps += 1;
            if steps > self.classes.len() {
                break;
            }
            current = self.classes.get(name).and_then(|e| e.parent.as_deref());
        }
        false
    }
}
