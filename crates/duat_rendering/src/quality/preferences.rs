//! Quality preference record.
//!
//! A small TOML document holding the last tier and the auto-adjust flag. It
//! is a convenience cache: a missing file means "detect", a broken one is
//! reported and ignored by the caller.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use duat_shared::{DuatError, DuatResult, QualityLevel};
use serde::{Deserialize, Serialize};

use super::hardware::HardwareTier;

/// Persisted quality choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPreferences {
    /// Last tier in force.
    pub quality_level: QualityLevel,
    /// Was automatic adjustment on?
    pub auto_adjust: bool,
    /// Detected machine class, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_tier: Option<HardwareTier>,
    /// Seconds since the Unix epoch at save time.
    #[serde(default)]
    pub saved_at_unix: u64,
}

impl QualityPreferences {
    /// Record for the given state, stamped now.
    #[must_use]
    pub fn new(quality_level: QualityLevel, auto_adjust: bool, hardware_tier: Option<HardwareTier>) -> Self {
        let saved_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            quality_level,
            auto_adjust,
            hardware_tier,
            saved_at_unix,
        }
    }

    /// Reads the record at `path`. `Ok(None)` if there is no file.
    ///
    /// # Errors
    ///
    /// [`DuatError::Io`] if the file exists but cannot be read,
    /// [`DuatError::Parse`] if it is not a valid record.
    pub fn load(path: impl AsRef<Path>) -> DuatResult<Option<Self>> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let prefs = toml::from_str(&text)?;
        tracing::info!(path = %path.display(), "Loaded quality preferences");
        Ok(Some(prefs))
    }

    /// Writes the record to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// [`DuatError::Serialize`] or [`DuatError::Io`].
    pub fn save(&self, path: impl AsRef<Path>) -> DuatResult<()> {
        let path = path.as_ref();
        let text = toml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DuatError::Io(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(path, text).map_err(|e| DuatError::Io(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), level = %self.quality_level, "Saved quality preferences");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("duat-prefs-{}-{name}", std::process::id()))
            .join("quality_settings.toml")
    }

    #[test]
    fn test_missing_file_is_none() {
        assert_eq!(QualityPreferences::load(temp_path("absent")).expect("ok"), None);
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("saved");
        let prefs = QualityPreferences::new(QualityLevel::Low, false, Some(HardwareTier::Budget));
        prefs.save(&path).expect("save");
        let loaded = QualityPreferences::load(&path).expect("load").expect("present");
        assert_eq!(loaded, prefs);
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_document_format() {
        let prefs = QualityPreferences {
            quality_level: QualityLevel::Medium,
            auto_adjust: true,
            hardware_tier: None,
            saved_at_unix: 0,
        };
        let text = toml::to_string(&prefs).expect("serialize");
        assert!(text.contains("quality_level = \"medium\""));
        let parsed: QualityPreferences =
            toml::from_str("quality_level = \"ultra\"\nauto_adjust = false\n").expect("parse");
        assert_eq!(parsed.quality_level, QualityLevel::Ultra);
        assert_eq!(parsed.saved_at_unix, 0);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let path = temp_path("garbage");
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).expect("mkdir");
        }
        std::fs::write(&path, "quality_level = 7").expect("write");
        assert!(matches!(QualityPreferences::load(&path), Err(DuatError::Parse(_))));
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }
}
