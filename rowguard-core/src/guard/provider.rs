//! Attaching guards to protected objects.

use super::Guard;
use crate::grant::ObjectId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// An object that can be checked for per-object permissions.
///
/// Implementors usually keep their guard in a [`GuardCell`] so it is built on
/// first use and reused afterwards.
pub trait GuardProvider {
    /// Identity of the protected object.
    fn object_id(&self) -> ObjectId;

    /// The guard protecting this object, or `None` when the object has no
    /// usable guard.
    fn provide_guard(&self) -> Option<Arc<dyn Guard>>;
}

#[derive(Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Detached,
    Attached(Arc<dyn Guard>),
}

/// Lazily initialized, replaceable guard slot.
///
/// The slot starts empty and is filled by the first
/// [`get_or_init`](Self::get_or_init). A guard can be swapped with
/// [`set`](Self::set); [`detach`](Self::detach) marks the object as having no
/// guard, which `get_or_init` does not undo. [`reset`](Self::reset) returns
/// the slot to empty so the next access builds a fresh guard.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rowguard_core::{BasicGuard, Guard, GuardCell};
///
/// let cell = GuardCell::new();
/// let first = cell.get_or_init(|| Arc::new(BasicGuard::new())).unwrap();
/// let again = cell.get_or_init(|| Arc::new(BasicGuard::new())).unwrap();
/// assert!(Arc::ptr_eq(&first, &again));
///
/// cell.detach();
/// assert!(cell.get_or_init(|| Arc::new(BasicGuard::new())).is_none());
/// ```
#[derive(Default)]
pub struct GuardCell {
    slot: RwLock<Slot>,
}

impl GuardCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell already holding `guard`.
    pub fn attached(guard: Arc<dyn Guard>) -> Self {
        Self {
            slot: RwLock::new(Slot::Attached(guard)),
        }
    }

    /// The current guard, building it with `init` if the slot is empty.
    ///
    /// Returns `None` when the guard was detached.
    pub fn get_or_init<F>(&self, init: F) -> Option<Arc<dyn Guard>>
    where
        F: FnOnce() -> Arc<dyn Guard>,
    {
        match &*self.slot.read() {
            Slot::Attached(guard) => return Some(guard.clone()),
            Slot::Detached => return None,
            Slot::Empty => {}
        }

        let mut slot = self.slot.write();
        match &*slot {
            Slot::Attached(guard) => Some(guard.clone()),
            Slot::Detached => None,
            Slot::Empty => {
                let guard = init();
                *slot = Slot::Attached(guard.clone());
                Some(guard)
            }
        }
    }

    /// The current guard without initializing.
    pub fn get(&self) -> Option<Arc<dyn Guard>> {
        match &*self.slot.read() {
            Slot::Attached(guard) => Some(guard.clone()),
            _ => None,
        }
    }

    /// Replace the guard, returning the previous one.
    pub fn set(&self, guard: Arc<dyn Guard>) -> Option<Arc<dyn Guard>> {
        match std::mem::replace(&mut *self.slot.write(), Slot::Attached(guard)) {
            Slot::Attached(previous) => Some(previous),
            _ => None,
        }
    }

    /// Mark the object as unguarded.
    pub fn detach(&self) -> Option<Arc<dyn Guard>> {
        match std::mem::replace(&mut *self.slot.write(), Slot::Detached) {
            Slot::Attached(previous) => Some(previous),
            _ => None,
        }
    }

    /// Empty the slot so the next access builds a new guard.
    pub fn reset(&self) {
        *self.slot.write() = Slot::Empty;
    }

    pub fn is_detached(&self) -> bool {
        matches!(&*self.slot.read(), Slot::Detached)
    }
}

impl fmt::Debug for GuardCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.read() {
            Slot::Empty => "empty",
            Slot::Detached => "detached",
            Slot::Attached(_) => "attached",
        };
        f.debug_struct("GuardCell").field("state", &state).finish()
    }
}
