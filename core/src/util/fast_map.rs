use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

pub type FastHashSet<K> = rustc_hash::FxHashSet<K>;

#[inline]
pub fn fast_hash_map_new<K, V>() -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::default()
}

#[inline]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::with_capacity_and_hasher(capacity, Default::default())
}

#[inline]
pub fn fast_hash_set_new<K>() -> FastHashSet<K> {
    rustc_hash::FxHashSet::default()
}

/// Map key comparing an `Arc` by allocation address rather than by value.
///
/// Interned data (descriptors, class names) is compared this way so that a
/// lookup never walks the pointee.
#[derive(Debug)]
pub struct PtrKey<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> PtrKey<T> {
    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T: ?Sized> Clone for PtrKey<T> {
    fn clone(&self) -> Self {
        PtrKey(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for PtrKey<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for PtrKey<T> {}

impl<T: ?Sized> Hash for PtrKey<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ptr_key_ignores_equal_contents() {
        let a: Arc<str> = Arc::from("score");
        let b: Arc<str> = Arc::from("score");
        let mut set = fast_hash_set_new();
        set.insert(PtrKey(a.clone()));
        set.insert(PtrKey(a));
        set.insert(PtrKey(b));
        assert_eq!(set.len(), 2);
    }
}
