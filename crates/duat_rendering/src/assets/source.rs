//! Asset sources: where decoded surfaces come from.
//!
//! The resource manager does not decode image formats. A source resolves a
//! logical key to pixels; the game layer plugs in its own, and two simple
//! ones live here.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use duat_shared::QualityLevel;

use super::asset_type::AssetType;
use super::error::{LoadError, LoadResult};
use super::key::AssetKey;
use super::surface::Surface;

/// Header of a raw RGBA file: width and height, little-endian `u32`.
pub const RGBA_HEADER_LEN: usize = 8;

/// Resolves a key to a decoded surface. Called on loader threads.
pub trait AssetSource: Send + Sync + 'static {
    /// Loads `key`.
    ///
    /// # Errors
    ///
    /// [`LoadError::NotFound`] or [`LoadError::Decode`].
    fn load(&self, key: &AssetKey) -> LoadResult<Surface>;
}

/// Builds the load function for one request: fetch from `source`, then apply
/// the per-kind processing for `level`.
pub fn processed_load(
    source: Arc<dyn AssetSource>,
    key: AssetKey,
    asset_type: AssetType,
    level: QualityLevel,
) -> impl FnOnce() -> LoadResult<Surface> + Send + 'static {
    move || source.load(&key).map(|surface| asset_type.process(surface, level))
}

// =============================================================================
// DIRECTORY SOURCE
// =============================================================================

/// Reads `<root>/<path>.rgba`: an 8-byte header followed by RGBA pixels.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `key`.
    #[must_use]
    pub fn file_for(&self, key: &AssetKey) -> PathBuf {
        self.root.join(format!("{}.rgba", key.path()))
    }
}

impl AssetSource for DirectorySource {
    fn load(&self, key: &AssetKey) -> LoadResult<Surface> {
        let path = self.file_for(key);
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound(path.display().to_string()),
            _ => LoadError::Decode(format!("{}: {e}", path.display())),
        })?;
        decode_rgba(&bytes)
    }
}

/// Parses the raw RGBA layout read by [`DirectorySource`].
///
/// # Errors
///
/// [`LoadError::Decode`] on a short header or a pixel count that does not
/// match it.
pub fn decode_rgba(bytes: &[u8]) -> LoadResult<Surface> {
    if bytes.len() < RGBA_HEADER_LEN {
        return Err(LoadError::Decode(format!(
            "header needs {RGBA_HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let (header, pixels) = bytes.split_at(RGBA_HEADER_LEN);
    let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    Surface::new(width, height, 4, pixels.to_vec())
}

/// Inverse of [`decode_rgba`] for 4-byte surfaces.
#[must_use]
pub fn encode_rgba(surface: &Surface) -> Option<Vec<u8>> {
    if surface.bytes_per_pixel() != 4 {
        return None;
    }
    let mut bytes = Vec::with_capacity(RGBA_HEADER_LEN + surface.pixels().len());
    bytes.extend_from_slice(&surface.width().to_le_bytes());
    bytes.extend_from_slice(&surface.height().to_le_bytes());
    bytes.extend_from_slice(surface.pixels());
    Some(bytes)
}

// =============================================================================
// GENERATED SOURCE
// =============================================================================

/// Produces a solid surface per key, colored from the key's hash. Used for
/// headless runs and tests.
#[derive(Debug, Clone)]
pub struct GeneratedSource {
    width: u32,
    height: u32,
    latency: Duration,
    missing_prefix: Option<String>,
}

impl GeneratedSource {
    /// Surfaces of `width × height`.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            latency: Duration::ZERO,
            missing_prefix: None,
        }
    }

    /// Sleeps this long per load, to simulate disk I/O.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Keys starting with `prefix` report [`LoadError::NotFound`].
    #[must_use]
    pub fn with_missing_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.missing_prefix = Some(prefix.into());
        self
    }
}

impl AssetSource for GeneratedSource {
    fn load(&self, key: &AssetKey) -> LoadResult<Surface> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if let Some(prefix) = &self.missing_prefix {
            if key.path().starts_with(prefix.as_str()) {
                return Err(LoadError::NotFound(key.to_string()));
            }
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let [r, g, b, ..] = hasher.finish().to_le_bytes();
        Ok(Surface::solid(self.width, self.height, [r, g, b, 255]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_layout() {
        let surface = Surface::solid(3, 2, [10, 20, 30, 40]);
        let bytes = encode_rgba(&surface).expect("rgba");
        assert_eq!(bytes.len(), RGBA_HEADER_LEN + 24);
        assert_eq!(&bytes[..4], &3u32.to_le_bytes());
        assert_eq!(decode_rgba(&bytes).expect("decode"), surface);
    }

    #[test]
    fn test_decode_rejects_short_input() {
        assert!(matches!(decode_rgba(&[1, 2, 3]), Err(LoadError::Decode(_))));
        let mut bytes = encode_rgba(&Surface::solid(2, 2, [0; 4])).expect("rgba");
        bytes.pop();
        assert!(matches!(decode_rgba(&bytes), Err(LoadError::Decode(_))));
    }

    #[test]
    fn test_directory_source_reads_files() {
        let dir = std::env::temp_dir().join(format!("duat-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let source = DirectorySource::new(&dir);
        let key = AssetKey::new("portrait");
        let surface = Surface::solid(4, 4, [1, 2, 3, 4]);
        std::fs::write(source.file_for(&key), encode_rgba(&surface).expect("rgba")).expect("write");

        assert_eq!(source.load(&key).expect("load"), surface);
        assert!(matches!(
            source.load(&AssetKey::new("absent")),
            Err(LoadError::NotFound(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_processed_load_scales_for_tier() {
        let source: Arc<dyn AssetSource> = Arc::new(GeneratedSource::new(100, 100));
        let load = processed_load(source, "bg".into(), AssetType::Background, QualityLevel::Minimal);
        let surface = load().expect("load");
        assert_eq!(surface.width(), 50);
    }

    #[test]
    fn test_generated_source_is_stable() {
        let source = GeneratedSource::new(2, 2).with_missing_prefix("missing/");
        let a = source.load(&"card".into()).expect("load");
        let b = source.load(&"card".into()).expect("load");
        assert_eq!(a, b);
        assert!(source.load(&"missing/x".into()).is_err());
    }
}
