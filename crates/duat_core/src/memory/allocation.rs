//! Allocation records tracked by the memory manager.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// What kind of memory an allocation holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MemoryType {
    /// Decoded texture
    Texture = 0,
    /// Offscreen drawing surface
    Surface = 1,
    /// Particle pool storage
    Particle = 2,
    /// Audio buffer
    Audio = 3,
    /// Glyph atlas
    Font = 4,
    /// Any other cached data
    CachedData = 5,
    /// Short-lived scratch data
    Temporary = 6,
}

impl MemoryType {
    /// Number of memory types.
    pub const COUNT: usize = 7;

    /// All memory types.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Texture,
        Self::Surface,
        Self::Particle,
        Self::Audio,
        Self::Font,
        Self::CachedData,
        Self::Temporary,
    ];

    /// Name used in allocation ids and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Surface => "surface",
            Self::Particle => "particle",
            Self::Audio => "audio",
            Self::Font => "font",
            Self::CachedData => "cached_data",
            Self::Temporary => "temporary",
        }
    }

    /// Dense index for per-type tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// How hard the manager tries to keep an allocation.
///
/// Lower number = more important.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MemoryPriority {
    /// Never evicted
    Critical = 1,
    /// Evicted only under critical pressure
    High = 2,
    /// Kept under critical pressure if recently accessed
    Medium = 3,
    /// First to go under any pressure
    Low = 4,
    /// Scratch data, also expires by age
    Temporary = 5,
}

impl MemoryPriority {
    /// Number of priority classes.
    pub const COUNT: usize = 5;

    /// All priorities, most important first.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Temporary,
    ];

    /// Dense index for per-priority tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize - 1
    }
}

/// Collector generation of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Generation {
    /// Newly tracked
    Young = 0,
    /// Survived one sweep
    Middle = 1,
    /// Survived two sweeps
    Old = 2,
}

impl Generation {
    /// Number of generations.
    pub const COUNT: usize = 3;

    /// The generation a survivor is promoted to.
    #[inline]
    #[must_use]
    pub const fn promoted(self) -> Self {
        match self {
            Self::Young => Self::Middle,
            Self::Middle | Self::Old => Self::Old,
        }
    }
}

/// Identifier of a tracked allocation. Displays as `"{type}_{serial}"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocationId {
    serial: u64,
    kind: MemoryType,
}

impl AllocationId {
    pub(crate) const fn new(serial: u64, kind: MemoryType) -> Self {
        Self { serial, kind }
    }

    /// Monotonic serial number.
    #[inline]
    #[must_use]
    pub const fn serial(self) -> u64 {
        self.serial
    }

    /// Memory type the id was issued for.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> MemoryType {
        self.kind
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.serial)
    }
}

/// Returns true while the tracked object is still alive elsewhere.
pub(crate) type LivenessProbe = Box<dyn Fn() -> bool + Send>;

/// Runs when the manager evicts a record.
pub(crate) type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Internal record. Holds no strong reference to the tracked object.
pub(crate) struct AllocationRecord {
    pub(crate) id: AllocationId,
    pub(crate) size: u64,
    pub(crate) priority: MemoryPriority,
    pub(crate) created: Duration,
    pub(crate) last_access: Duration,
    pub(crate) access_count: u64,
    pub(crate) generation: Generation,
    /// Last collector pass that swept this record.
    pub(crate) swept_pass: u64,
    /// `None` means the record lives until explicitly untracked or evicted.
    pub(crate) probe: Option<LivenessProbe>,
    pub(crate) release: Option<ReleaseHook>,
    pub(crate) metadata: BTreeMap<String, String>,
}

impl AllocationRecord {
    /// Is the tracked object still alive?
    #[inline]
    pub(crate) fn is_alive(&self) -> bool {
        self.probe.as_ref().map_or(true, |probe| probe())
    }

    /// Snapshot without the closures.
    pub(crate) fn info(&self) -> AllocationInfo {
        AllocationInfo {
            id: self.id,
            size: self.size,
            priority: self.priority,
            created: self.created,
            last_access: self.last_access,
            access_count: self.access_count,
            generation: self.generation,
            metadata: self.metadata.clone(),
        }
    }
}

impl fmt::Debug for AllocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationRecord")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("priority", &self.priority)
            .field("generation", &self.generation)
            .field("has_probe", &self.probe.is_some())
            .field("has_release", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// Public snapshot of a tracked allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationInfo {
    /// Identifier
    pub id: AllocationId,
    /// Size in bytes
    pub size: u64,
    /// Priority class
    pub priority: MemoryPriority,
    /// When it was tracked
    pub created: Duration,
    /// Last `touch`
    pub last_access: Duration,
    /// Number of `touch` calls plus one
    pub access_count: u64,
    /// Collector generation
    pub generation: Generation,
    /// Free-form metadata (`screen` is understood by the manager)
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_id_display() {
        let id = AllocationId::new(12, MemoryType::CachedData);
        assert_eq!(id.to_string(), "cached_data_12");
    }

    #[test]
    fn test_priority_indices_are_dense() {
        for (i, priority) in MemoryPriority::ALL.iter().enumerate() {
            assert_eq!(priority.index(), i);
        }
    }

    #[test]
    fn test_generation_promotion_saturates() {
        assert_eq!(Generation::Young.promoted(), Generation::Middle);
        assert_eq!(Generation::Old.promoted(), Generation::Old);
    }
}
