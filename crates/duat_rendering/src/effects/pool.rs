//! Fixed-capacity particle store.
//!
//! Thin wrapper over [`PoolAllocator`] that counts acquisitions, releases and
//! exhaustion. Every slot is either available or in use, never both, so
//! `available() + in_use() == capacity()` holds at every observation.

use duat_core::{PoolAllocator, PoolHandle};

use super::particle::Particle;

/// Lifetime counters of a [`ParticlePool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful acquisitions.
    pub acquired: u64,
    /// Releases (expiry, clear, cap).
    pub released: u64,
    /// Acquisitions refused because every slot was in use.
    pub exhausted: u64,
}

/// Pool of particles.
pub struct ParticlePool {
    slots: PoolAllocator<Particle>,
    stats: PoolStats,
}

impl ParticlePool {
    /// Creates a pool of `capacity` slots. All allocation happens here.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: PoolAllocator::new(capacity),
            stats: PoolStats::default(),
        }
    }

    /// Total slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Slots holding a live particle.
    #[inline]
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.slots.allocated_count()
    }

    /// Free slots.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.free_count()
    }

    /// Stores `particle`, or returns `None` when the pool is exhausted.
    pub fn acquire(&mut self, particle: Particle) -> Option<PoolHandle> {
        if let Some(handle) = self.slots.allocate(particle) {
            self.stats.acquired += 1;
            Some(handle)
        } else {
            self.stats.exhausted += 1;
            None
        }
    }

    /// Returns a slot to the pool. Stale handles are ignored.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        let released = self.slots.free(handle).is_some();
        if released {
            self.stats.released += 1;
        }
        released
    }

    /// Live particle behind `handle`.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&Particle> {
        self.slots.get(handle)
    }

    /// Mutable live particle behind `handle`.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut Particle> {
        self.slots.get_mut(handle)
    }

    /// Visits every live particle, releasing those for which `keep` is false.
    ///
    /// Returns the number released.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(PoolHandle, &mut Particle) -> bool,
    {
        let released = self.slots.retain_mut(keep);
        self.stats.released += released as u64;
        released
    }

    /// Releases every particle.
    pub fn release_all(&mut self) -> usize {
        let released = self.in_use();
        self.slots.clear();
        self.stats.released += released as u64;
        released
    }

    /// Live particles.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &Particle)> {
        self.slots.iter()
    }

    /// Lifetime counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl std::fmt::Debug for ParticlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticlePool")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use())
            .field("stats", &self.stats)
            .finish()
    }
}
