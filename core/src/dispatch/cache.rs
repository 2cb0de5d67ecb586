use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use once_cell::sync::OnceCell;

use super::TypeKey;
use crate::val::Val;
use crate::whitelist::Target;

/// Lifecycle of an inline cache. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheState {
    Uninitialized = 0,
    Monomorphic = 1,
    Polymorphic = 2,
    /// Bound exceeded; the site resolves every call without caching.
    Megamorphic = 3,
}

impl CacheState {
    fn from_u8(raw: u8) -> CacheState {
        match raw {
            0 => CacheState::Uninitialized,
            1 => CacheState::Monomorphic,
            2 => CacheState::Polymorphic,
            _ => CacheState::Megamorphic,
        }
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CacheState::Uninitialized => "uninitialized",
            CacheState::Monomorphic => "monomorphic",
            CacheState::Polymorphic => "polymorphic",
            CacheState::Megamorphic => "megamorphic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Calls served from a cached entry.
    pub hits: u64,
    /// Calls that had to resolve.
    pub misses: u64,
    /// Resolver invocations, failures included.
    pub lookups: u64,
}

struct CacheEntry {
    shape: Box<[TypeKey]>,
    target: Target,
}

impl CacheEntry {
    #[inline]
    fn matches(&self, args: &[Val]) -> bool {
        self.shape.len() == args.len() && self.shape.iter().zip(args).all(|(key, arg)| key.matches(arg))
    }
}

/// What [`InlineCache::insert`] did with a resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Cached,
    /// Another thread cached the same shape first.
    Raced,
    /// No free slot; the cache is now megamorphic.
    Overflowed,
    /// Already megamorphic; nothing stored.
    Bypassed,
}

/// Bounded polymorphic inline cache.
///
/// Slots are write-once and filled in order, so the read path is a lock-free
/// linear scan that stops at the first empty slot. Concurrent misses on the
/// same shape may both resolve; whichever write lands first is kept.
pub struct InlineCache {
    slots: Box<[OnceCell<CacheEntry>]>,
    state: AtomicU8,
    hits: AtomicU64,
    misses: AtomicU64,
    lookups: AtomicU64,
}

impl InlineCache {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            slots: (0..depth).map(|_| OnceCell::new()).collect(),
            state: AtomicU8::new(CacheState::Uninitialized as u8),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn state(&self) -> CacheState {
        CacheState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of cached shapes.
    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
        }
    }

    /// Cached target for the shape of `args`. Always misses once megamorphic.
    #[inline]
    pub fn probe(&self, args: &[Val]) -> Option<&Target> {
        if self.state() == CacheState::Megamorphic {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        for slot in self.slots.iter() {
            let Some(entry) = slot.get() else {
                break;
            };
            if entry.matches(args) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(&entry.target);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    #[inline]
    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Stores `target` for the shape of `args` in the first free slot.
    pub fn insert(&self, args: &[Val], target: &Target) -> Insertion {
        if self.state() == CacheState::Megamorphic {
            return Insertion::Bypassed;
        }
        let mut pending = Some(CacheEntry {
            shape: args.iter().map(TypeKey::of).collect(),
            target: target.clone(),
        });
        for (idx, slot) in self.slots.iter().enumerate() {
            if let Some(existing) = slot.get() {
                if existing.matches(args) {
                    return Insertion::Raced;
                }
                continue;
            }
            let Some(entry) = pending.take() else {
                break;
            };
            match slot.try_insert(entry) {
                Ok(_) => {
                    let next = if idx == 0 {
                        CacheState::Monomorphic
                    } else {
                        CacheState::Polymorphic
                    };
                    self.state.fetch_max(next as u8, Ordering::AcqRel);
                    return Insertion::Cached;
                }
                Err((winner, entry)) => {
                    if winner.matches(args) {
                        return Insertion::Raced;
                    }
                    pending = Some(entry);
                }
            }
        }
        let previous = self.state.swap(CacheState::Megamorphic as u8, Ordering::AcqRel);
        if previous != CacheState::Megamorphic as u8 {
            tracing::debug!(
                target: "scour::dispatch",
                depth = self.depth(),
                "inline cache went megamorphic"
            );
        }
        Insertion::Overflowed
    }
}

impl fmt::Debug for InlineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineCache")
            .field("state", &self.state())
            .field("len", &self.len())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DescriptorCatalog;
    use crate::typ::ScriptType;

    fn target(name: &str) -> Target {
        let catalog = DescriptorCatalog::new();
        let descriptor = catalog.intern(name, &[ScriptType::Def], ScriptType::Def).unwrap();
        Target::new(descriptor, |args| Ok(args[0].clone()))
    }

    #[test]
    fn fills_slots_in_order_then_overflows() {
        let cache = InlineCache::new(2);
        assert_eq!(cache.state(), CacheState::Uninitialized);
        assert_eq!(cache.insert(&[Val::Int(1)], &target("a")), Insertion::Cached);
        assert_eq!(cache.state(), CacheState::Monomorphic);
        assert_eq!(cache.insert(&[Val::from("x")], &target("b")), Insertion::Cached);
        assert_eq!(cache.state(), CacheState::Polymorphic);
        assert_eq!(cache.insert(&[Val::Long(1)], &target("c")), Insertion::Overflowed);
        assert_eq!(cache.state(), CacheState::Megamorphic);
        assert_eq!(cache.insert(&[Val::Bool(true)], &target("d")), Insertion::Bypassed);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn probe_matches_by_shape_not_value() {
        let cache = InlineCache::new(4);
        cache.insert(&[Val::Int(1), Val::from("a")], &target("a"));
        assert!(cache.probe(&[Val::Int(99), Val::from("zz")]).is_some());
        assert!(cache.probe(&[Val::Int(99)]).is_none());
        assert!(cache.probe(&[Val::Long(99), Val::from("zz")]).is_none());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 2));
    }

    #[test]
    fn objects_are_keyed_by_class() {
        let cache = InlineCache::new(4);
        cache.insert(&[Val::object("Doc", 1u8)], &target("a"));
        assert!(cache.probe(&[Val::object("Doc", 2u8)]).is_some());
        assert!(cache.probe(&[Val::object("Field", 2u8)]).is_none());
        assert_eq!(cache.insert(&[Val::object("Doc", 3u8)], &target("a")), Insertion::Raced);
    }

    #[test]
    fn megamorphic_probe_always_misses() {
        let cache = InlineCache::new(1);
        cache.insert(&[Val::Int(1)], &target("a"));
        cache.insert(&[Val::Long(1)], &target("b"));
        assert_eq!(cache.state(), CacheState::Megamorphic);
        assert!(cache.probe(&[Val::Int(1)]).is_none());
    }
}
