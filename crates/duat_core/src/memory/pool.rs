//! # Pool Allocator
//!
//! Fixed-capacity arena for objects that are frequently acquired and released.
//!
//! Storage is one contiguous slice of slots plus a free-list of indices.
//! Every slot carries a generation counter that is bumped on release, so a
//! stale [`PoolHandle`] can never reach the object that reused its slot.

/// One slot of the arena.
#[derive(Debug)]
struct Slot<T> {
    /// The stored object, `None` while the slot is on the free list.
    value: Option<T>,
    /// Bumped every time the slot is released.
    generation: u32,
}

/// A pool allocator for fixed-size objects.
///
/// Every slot is in exactly one of two states: on the free list, or holding a
/// value. `allocated_count() + free_count() == capacity()` always holds.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by one subsystem on the main loop.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: PoolAllocator<Particle> = PoolAllocator::new(10_000);
///
/// // Allocate - O(1), no heap allocation
/// let handle = pool.allocate(Particle::default())?;
///
/// // Free - O(1), the handle is now stale
/// pool.free(handle);
/// assert!(pool.get(handle).is_none());
/// ```
#[derive(Debug)]
pub struct PoolAllocator<T> {
    /// The storage array.
    storage: Box<[Slot<T>]>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Number of allocated objects.
    allocated_count: usize,
}

/// Generation-checked handle to an object in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle {
    /// Index into the pool.
    index: u32,
    /// Generation of the slot when the handle was issued.
    generation: u32,
}

impl PoolHandle {
    /// Slot index (stable while the handle is live).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Slot generation at issue time.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> PoolAllocator<T> {
    /// Creates a new pool with the specified capacity.
    ///
    /// All memory is pre-allocated upfront.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit in `u32`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(u32::try_from(capacity).is_ok(), "Capacity must fit in u32");
        #[allow(clippy::cast_possible_truncation)]
        let capacity = capacity as u32;

        let storage: Vec<Slot<T>> = (0..capacity)
            .map(|_| Slot {
                value: None,
                generation: 0,
            })
            .collect();

        // Lowest index is handed out first
        let free_list: Vec<u32> = (0..capacity).rev().collect();

        Self {
            storage: storage.into_boxed_slice(),
            free_list,
            allocated_count: 0,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the number of currently allocated objects.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Allocates a slot and stores the object.
    ///
    /// This is a **O(1)** operation with **zero heap allocations**.
    ///
    /// # Returns
    ///
    /// A handle to the allocated object, or None if pool is full.
    pub fn allocate(&mut self, value: T) -> Option<PoolHandle> {
        let index = self.free_list.pop()?;
        let slot = &mut self.storage[index as usize];

        slot.value = Some(value);
        self.allocated_count += 1;

        Some(PoolHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Frees an allocated object.
    ///
    /// This is a **O(1)** operation with **zero heap deallocations**.
    ///
    /// # Returns
    ///
    /// The freed object, or None if the handle was stale or invalid.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.storage.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.allocated_count -= 1;

        Some(value)
    }

    /// Does `handle` still refer to a live object?
    #[inline]
    #[must_use]
    pub fn is_live(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to an allocated object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.storage.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to an allocated object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.storage.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Frees every object for which `keep` returns false.
    ///
    /// Single pass over the storage; freed slots go straight back on the
    /// free list. Returns the number of objects freed.
    pub fn retain_mut<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(PoolHandle, &mut T) -> bool,
    {
        let mut freed = 0;
        for (index, slot) in self.storage.iter_mut().enumerate() {
            let Some(value) = slot.value.as_mut() else {
                continue;
            };
            // Index always fits: capacity was checked against u32 in new()
            #[allow(clippy::cast_possible_truncation)]
            let handle = PoolHandle {
                index: index as u32,
                generation: slot.generation,
            };
            if !keep(handle, value) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(handle.index);
                freed += 1;
            }
        }
        self.allocated_count -= freed;
        freed
    }

    /// Clears all allocations, resetting the pool.
    ///
    /// Every outstanding handle becomes stale. Memory is not freed.
    pub fn clear(&mut self) {
        for slot in self.storage.iter_mut() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free_list.clear();
        // Capacity fits in u32, checked in new()
        #[allow(clippy::cast_possible_truncation)]
        let capacity = self.storage.len() as u32;
        self.free_list.extend((0..capacity).rev());
        self.allocated_count = 0;
    }

    /// Iterates over all allocated objects.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.storage.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let handle = PoolHandle {
                index: index as u32,
                generation: slot.generation,
            };
            slot.value.as_ref().map(|v| (handle, v))
        })
    }

    /// Iterates mutably over all allocated objects.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.storage.iter_mut().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let handle = PoolHandle {
                index: index as u32,
                generation: slot.generation,
            };
            slot.value.as_mut().map(|v| (handle, v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_allocate_free() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(10);

        let h1 = pool.allocate(42).unwrap();
        assert_eq!(*pool.get(h1).unwrap(), 42);
        assert_eq!(pool.allocated_count(), 1);

        let freed = pool.free(h1).unwrap();
        assert_eq!(freed, 42);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn test_pool_full() {
        let mut pool: PoolAllocator<u8> = PoolAllocator::new(2);

        let _ = pool.allocate(1).unwrap();
        let _ = pool.allocate(2).unwrap();
        assert!(pool.allocate(3).is_none());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_pool_reuse_invalidates_stale_handle() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(1);

        let h1 = pool.allocate(1).unwrap();
        pool.free(h1);

        let h2 = pool.allocate(2).unwrap();
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1.generation(), h2.generation());
        assert!(pool.get(h1).is_none());
        assert!(pool.free(h1).is_none());
        assert_eq!(*pool.get(h2).unwrap(), 2);
    }

    #[test]
    fn test_retain_conserves_slots() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(8);
        for i in 0..8 {
            pool.allocate(i).unwrap();
        }

        let freed = pool.retain_mut(|_, v| *v % 2 == 0);
        assert_eq!(freed, 4);
        assert_eq!(pool.allocated_count(), 4);
        assert_eq!(pool.allocated_count() + pool.free_count(), pool.capacity());
        assert!(pool.iter().all(|(_, v)| v % 2 == 0));
    }

    #[test]
    fn test_clear_stales_every_handle() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(4);
        let handles: Vec<_> = (0..4).map(|i| pool.allocate(i).unwrap()).collect();
        pool.clear();
        assert_eq!(pool.free_count(), 4);
        assert!(handles.iter().all(|h| !pool.is_live(*h)));
    }
}
