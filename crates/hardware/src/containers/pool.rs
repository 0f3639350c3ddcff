//! Object pool with generation-tagged handles.
//!
//! Spec §9: "represent instances by indices into an arena ... plus an
//! integer tag; every queue stores (index, tag-snapshot) so that a
//! flushed+recycled index is detected and skipped." `Pool<T>` is the arena;
//! `Handle<T>` is the (index, generation) pair every other structure stores
//! instead of a raw pointer or owned copy.

use std::marker::PhantomData;

/// A handle into a `Pool<T>`. Stale handles (referring to a freed-and-reused
/// slot) are detected because the generation no longer matches.
pub struct Handle<T> {
    index: usize,
    generation: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for Handle<T> {}
impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({}, gen={})", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

/// A growable arena of reusable slots, each guarded by a generation counter.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Inserts a value, reusing a freed slot if one exists. Returns a handle
    /// that becomes stale the moment this slot is freed again.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.value = Some(value);
            Handle {
                index,
                generation: slot.generation,
                _marker: PhantomData,
            }
        } else {
            let index = self.slots.len();
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle {
                index,
                generation: 0,
                _marker: PhantomData,
            }
        }
    }

    /// Removes and returns the value for `handle`, bumping the slot's
    /// generation so any other outstanding handle to it becomes stale.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        value
    }

    /// Borrows the value for `handle`, or `None` if stale/freed.
    #[must_use]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutably borrows the value for `handle`, or `None` if stale/freed.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// True if `handle` still refers to a live value in this pool.
    #[must_use]
    pub fn is_live(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::Pool;

    #[test]
    fn stale_handle_detected_after_reuse() {
        let mut pool: Pool<u32> = Pool::new();
        let h1 = pool.insert(10);
        assert_eq!(pool.get(h1), Some(&10));

        let _ = pool.remove(h1);
        assert_eq!(pool.get(h1), None);

        let h2 = pool.insert(20);
        // h1's generation no longer matches even though the slot index was reused.
        assert_eq!(pool.get(h1), None);
        assert_eq!(pool.get(h2), Some(&20));
    }
}
