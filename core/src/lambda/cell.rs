use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::val::Val;

/// Heap cell shared between a scope and every closure capturing one of its
/// variables by reference. Lives as long as its longest holder.
#[derive(Clone, Default)]
pub struct VarCell(Arc<Mutex<Val>>);

impl VarCell {
    pub fn new(val: Val) -> Self {
        VarCell(Arc::new(Mutex::new(val)))
    }

    #[inline]
    pub fn get(&self) -> Val {
        self.lock().clone()
    }

    #[inline]
    pub fn set(&self, val: Val) {
        *self.lock() = val;
    }

    /// Replaces the value with `f(old)` under the lock.
    pub fn update(&self, f: impl FnOnce(&Val) -> Val) -> Val {
        let mut guard = self.lock();
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    #[inline]
    pub fn ptr_eq(&self, other: &VarCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // A panic while holding the lock cannot leave a half-written Val behind.
    fn lock(&self) -> MutexGuard<'_, Val> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for VarCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarCell({:?})", self.get())
    }
}

/// A captured value as handed to a closure body.
#[derive(Debug, Clone)]
pub enum Capture {
    /// Private copy taken when the closure was bound.
    Value(Val),
    Cell(VarCell),
}

impl Capture {
    #[inline]
    pub fn get(&self) -> Val {
        match self {
            Capture::Value(v) => v.clone(),
            Capture::Cell(cell) => cell.get(),
        }
    }

    /// Writes through a by-reference capture. By-value captures are
    /// private to the closure and simply replaced.
    pub fn set(&mut self, val: Val) {
        match self {
            Capture::Value(v) => *v = val,
            Capture::Cell(cell) => cell.set(val),
        }
    }

    #[inline]
    pub fn as_cell(&self) -> Option<&VarCell> {
        match self {
            Capture::Cell(cell) => Some(cell),
            Capture::Value(_) => None,
        }
    }
}
