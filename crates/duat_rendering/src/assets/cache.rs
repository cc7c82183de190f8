//! # LRU Asset Cache
//!
//! Decoded surfaces keyed by [`AssetKey`], ordered by recency.
//!
//! ```text
//!  head (MRU) ◄──► ... ◄──► tail (LRU)
//!                              │
//!               eviction walks from here, skipping protected entries
//! ```
//!
//! Nodes live in a slab (`Vec<Option<Node>>` plus a free list) linked by
//! index, with a `HashMap` from key to slot for O(1) lookup. A new entry
//! always enters at the head, so among entries never touched again the
//! oldest insertion is evicted first.
//!
//! The byte budget is soft: an insert that cannot make room still goes in.

use std::collections::HashMap;
use std::time::Duration;

use duat_core::SharedClock;

use super::asset_type::AssetType;
use super::key::AssetKey;
use super::surface::Surface;

/// Usage fraction above which [`AssetCache::maintain`] trims.
pub const GC_THRESHOLD: f64 = 0.80;
/// Usage fraction [`AssetCache::maintain`] trims down to.
pub const GC_TARGET: f64 = 0.70;

/// Caller-supplied facts about an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Kind of asset.
    pub asset_type: AssetType,
    /// Exempt from LRU eviction.
    pub protected: bool,
    /// Screen the asset belongs to, if any.
    pub screen: Option<String>,
}

impl EntryMetadata {
    /// Defaults for `asset_type`.
    #[must_use]
    pub fn for_type(asset_type: AssetType) -> Self {
        Self {
            asset_type,
            protected: asset_type.protected_by_default(),
            screen: None,
        }
    }

    /// Overrides protection.
    #[must_use]
    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Tags the entry with a screen.
    #[must_use]
    pub fn on_screen(mut self, screen: impl Into<String>) -> Self {
        self.screen = Some(screen.into());
        self
    }
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self::for_type(AssetType::Texture)
    }
}

/// A cached surface and its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key.
    pub key: AssetKey,
    /// Decoded surface.
    pub surface: Surface,
    /// Bytes charged against the budget.
    pub size: u64,
    /// Kind, protection, screen.
    pub metadata: EntryMetadata,
    /// When the entry was inserted.
    pub inserted_at: Duration,
    /// Last `get` (or insertion).
    pub last_access: Duration,
    /// Number of `get` hits plus the insertion.
    pub access_count: u64,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` hits.
    pub hits: u64,
    /// `get` misses.
    pub misses: u64,
    /// Entries inserted.
    pub insertions: u64,
    /// Entries evicted by budget pressure.
    pub evictions: u64,
    /// Bytes evicted by budget pressure.
    pub evicted_bytes: u64,
    /// Inserts that left the cache over budget.
    pub over_budget_inserts: u64,
}

impl CacheStats {
    /// Hits over lookups, 0 when nothing was looked up.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = self.hits as f64 / lookups as f64;
            rate
        }
    }
}

#[derive(Debug)]
struct Node {
    entry: CacheEntry,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Byte-budgeted LRU cache of decoded surfaces.
pub struct AssetCache {
    budget: u64,
    current: u64,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<AssetKey, usize>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
    clock: SharedClock,
    stats: CacheStats,
}

impl AssetCache {
    /// Creates an empty cache with a byte budget.
    #[must_use]
    pub fn new(budget_bytes: u64, clock: SharedClock) -> Self {
        Self {
            budget: budget_bytes,
            current: 0,
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            clock,
            stats: CacheStats::default(),
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Returns the surface for `key` and marks it most recently used.
    pub fn get(&mut self, key: &AssetKey) -> Option<Surface> {
        let Some(&slot) = self.index.get(key) else {
            self.stats.misses += 1;
            return None;
        };
        self.stats.hits += 1;
        self.move_to_front(slot);

        let now = self.clock.now();
        let node = self.nodes[slot].as_mut()?;
        node.entry.last_access = now;
        node.entry.access_count += 1;
        Some(node.entry.surface.clone())
    }

    /// Returns the surface without touching recency or statistics.
    #[must_use]
    pub fn peek(&self, key: &AssetKey) -> Option<&Surface> {
        self.entry(key).map(|entry| &entry.surface)
    }

    /// Full entry without touching recency.
    #[must_use]
    pub fn entry(&self, key: &AssetKey) -> Option<&CacheEntry> {
        let slot = *self.index.get(key)?;
        self.nodes[slot].as_ref().map(|node| &node.entry)
    }

    /// Is `key` cached?
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &AssetKey) -> bool {
        self.index.contains_key(key)
    }

    // =========================================================================
    // INSERTION & REMOVAL
    // =========================================================================

    /// Inserts (or replaces) `key`. Returns the number of entries evicted.
    ///
    /// Evicts from the LRU end, skipping protected entries, until the new
    /// entry fits. If it still does not fit, it is inserted anyway.
    pub fn put(&mut self, key: AssetKey, surface: Surface, metadata: EntryMetadata) -> usize {
        let size = surface.byte_size();
        if let Some(&slot) = self.index.get(&key) {
            self.remove_slot(slot);
        }

        let evicted = if self.current + size > self.budget {
            self.evict_until(self.budget.saturating_sub(size))
        } else {
            0
        };

        let now = self.clock.now();
        let node = Node {
            entry: CacheEntry {
                key: key.clone(),
                surface,
                size,
                metadata,
                inserted_at: now,
                last_access: now,
                access_count: 1,
            },
            prev: None,
            next: None,
        };
        let slot = if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(node);
            slot
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        };
        self.index.insert(key, slot);
        self.push_front(slot);
        self.current += size;
        self.stats.insertions += 1;

        if self.current > self.budget {
            self.stats.over_budget_inserts += 1;
            tracing::debug!(
                current = self.current,
                budget = self.budget,
                "Asset cache over budget, only protected entries left"
            );
        }
        evicted
    }

    /// Removes `key` regardless of protection.
    pub fn remove(&mut self, key: &AssetKey) -> Option<CacheEntry> {
        let slot = *self.index.get(key)?;
        self.remove_slot(slot)
    }

    /// Marks `key` protected. Returns `false` if absent.
    pub fn protect(&mut self, key: &AssetKey) -> bool {
        self.set_protected(key, true)
    }

    /// Clears protection on `key`. Returns `false` if absent.
    pub fn unprotect(&mut self, key: &AssetKey) -> bool {
        self.set_protected(key, false)
    }

    fn set_protected(&mut self, key: &AssetKey, protected: bool) -> bool {
        let Some(&slot) = self.index.get(key) else {
            return false;
        };
        match self.nodes[slot].as_mut() {
            Some(node) => {
                node.entry.metadata.protected = protected;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // BUDGET
    // =========================================================================

    /// Changes the budget and evicts immediately to meet it.
    pub fn set_budget(&mut self, budget_bytes: u64) -> usize {
        self.budget = budget_bytes;
        self.evict_until(budget_bytes)
    }

    /// Evicts unprotected entries until usage is at most `fraction` of the
    /// budget.
    pub fn trim_to(&mut self, fraction: f64) -> usize {
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let target = (self.budget as f64 * fraction.clamp(0.0, 1.0)) as u64;
        self.evict_until(target)
    }

    /// Periodic housekeeping: above 80 % of budget, trim to 70 %.
    pub fn maintain(&mut self) -> usize {
        #[allow(clippy::cast_precision_loss)]
        let usage = self.current as f64 / self.budget.max(1) as f64;
        if usage > GC_THRESHOLD {
            let evicted = self.trim_to(GC_TARGET);
            tracing::debug!(evicted, usage, "Asset cache trimmed");
            evicted
        } else {
            0
        }
    }

    /// Removes every entry, or every unprotected entry.
    pub fn clear(&mut self, preserve_protected: bool) -> usize {
        self.remove_where(|entry| !(preserve_protected && entry.metadata.protected))
    }

    /// Removes unprotected entries tagged with `screen`.
    pub fn remove_screen(&mut self, screen: &str) -> usize {
        self.remove_where(|entry| {
            !entry.metadata.protected && entry.metadata.screen.as_deref() == Some(screen)
        })
    }

    fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&CacheEntry) -> bool,
    {
        let doomed: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| {
                node.as_ref()
                    .filter(|node| predicate(&node.entry))
                    .map(|_| slot)
            })
            .collect();
        for &slot in &doomed {
            self.remove_slot(slot);
        }
        doomed.len()
    }

    /// Walks from the LRU end evicting unprotected entries until usage is
    /// at most `target` or nothing evictable remains.
    fn evict_until(&mut self, target: u64) -> usize {
        let mut evicted = 0;
        let mut cursor = self.tail;
        while self.current > target {
            let Some(slot) = cursor else {
                break;
            };
            let Some(node) = self.nodes[slot].as_ref() else {
                break;
            };
            cursor = node.prev;
            if node.entry.metadata.protected {
                continue;
            }
            if let Some(entry) = self.remove_slot(slot) {
                tracing::debug!(key = %entry.key, bytes = entry.size, "Evicted asset");
                self.stats.evictions += 1;
                self.stats.evicted_bytes += entry.size;
                evicted += 1;
            }
        }
        evicted
    }

    // =========================================================================
    // LIST PLUMBING
    // =========================================================================

    fn remove_slot(&mut self, slot: usize) -> Option<CacheEntry> {
        self.unlink(slot);
        let node = self.nodes.get_mut(slot)?.take()?;
        self.free.push(slot);
        self.index.remove(&node.entry.key);
        self.current -= node.entry.size;
        Some(node.entry)
    }

    fn unlink(&mut self, slot: usize) {
        let Some((prev, next)) = self.nodes[slot].as_ref().map(|n| (n.prev, n.next)) else {
            return;
        };
        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(node) = self.nodes[slot].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[slot].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.nodes[h].as_mut() {
                node.prev = Some(slot);
            }
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.head != Some(slot) {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Entries from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        std::iter::successors(self.tail, move |&slot| {
            self.nodes[slot].as_ref().and_then(|node| node.prev)
        })
        .filter_map(move |slot| self.nodes[slot].as_ref().map(|node| &node.entry))
    }

    /// Entry count.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// No entries?
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes held.
    #[inline]
    #[must_use]
    pub const fn current_bytes(&self) -> u64 {
        self.current
    }

    /// Byte budget.
    #[inline]
    #[must_use]
    pub const fn budget_bytes(&self) -> u64 {
        self.budget
    }

    /// Protected entries.
    #[must_use]
    pub fn protected_count(&self) -> usize {
        self.iter_lru().filter(|entry| entry.metadata.protected).count()
    }

    /// Counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("entries", &self.len())
            .field("current", &self.current)
            .field("budget", &self.budget)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
