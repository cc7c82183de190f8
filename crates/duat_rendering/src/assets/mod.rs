//! # Asset Streaming
//!
//! This module provides:
//! - `AssetCache` - byte-budgeted LRU of decoded surfaces with protection
//! - `BackgroundLoader` - priority worker pool with request coalescing
//! - `AssetType` - the closed set of asset kinds and their processing rules
//! - `AssetSource` / `PreloadPlan` - where pixels come from and when
//!
//! The frame loop never waits on a load: it either hits the cache or drains
//! finished loads at the start of a later frame.

mod asset_type;
mod cache;
mod error;
mod key;
mod loader;
mod preload;
mod source;
mod surface;

pub use asset_type::{AssetType, LoadPriority};
pub use cache::{AssetCache, CacheEntry, CacheStats, EntryMetadata, GC_TARGET, GC_THRESHOLD};
pub use error::{LoadError, LoadResult};
pub use key::AssetKey;
pub use loader::{
    BackgroundLoader, CompletedLoad, LoadCallback, LoadFn, LoadRequest, LoaderStats, Submission,
};
pub use preload::{PreloadPlan, PreloadRule};
pub use source::{
    decode_rgba, encode_rgba, processed_load, AssetSource, DirectorySource, GeneratedSource,
    RGBA_HEADER_LEN,
};
pub use surface::Surface;
