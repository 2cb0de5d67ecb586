use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque reference to a host object.
///
/// Scripts never look inside; only whitelisted targets downcast the payload.
/// Equality is reference identity.
#[derive(Clone)]
pub struct HostRef {
    class: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl HostRef {
    pub fn new<T: Any + Send + Sync>(class: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            class: class.into(),
            inner: Arc::new(value),
        }
    }

    pub fn from_arc<T: Any + Send + Sync>(class: impl Into<Arc<str>>, value: Arc<T>) -> Self {
        Self {
            class: class.into(),
            inner: value,
        }
    }

    /// Whitelist class this object was registered under.
    #[inline]
    pub fn class(&self) -> &Arc<str> {
        &self.class
    }

    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef({}@{:x})", self.class, self.addr())
    }
}

impl fmt::Display for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.class, self.addr())
    }
}
