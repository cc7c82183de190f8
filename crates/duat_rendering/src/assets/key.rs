//! Cache keys.

use std::fmt;
use std::sync::Arc;

/// Logical asset path plus a variant (size, quality).
///
/// Paths are opaque strings such as `card_art:anubis:full` or
/// `background:combat`; nothing here interprets their syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    path: Arc<str>,
    variant: Option<Arc<str>>,
}

impl AssetKey {
    /// Key for the default variant of `path`.
    #[must_use]
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: Arc::from(path.as_ref()),
            variant: None,
        }
    }

    /// Key for a named variant of `path`.
    #[must_use]
    pub fn with_variant(path: impl AsRef<str>, variant: impl AsRef<str>) -> Self {
        Self {
            path: Arc::from(path.as_ref()),
            variant: Some(Arc::from(variant.as_ref())),
        }
    }

    /// Logical path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Variant, if any.
    #[inline]
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}#{variant}", self.path),
            None => f.write_str(&self.path),
        }
    }
}

impl From<&str> for AssetKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for AssetKey {
    fn from(path: String) -> Self {
        Self {
            path: Arc::from(path),
            variant: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_and_borrowed_paths_agree() {
        let owned = AssetKey::from(format!("cards/{}", 7));
        assert_eq!(owned, AssetKey::from("cards/7"));
        assert_eq!(owned.variant(), None);
    }

    #[test]
    fn test_variant_display() {
        let key = AssetKey::with_variant("background:combat", "half");
        assert_eq!(key.to_string(), "background:combat#half");
        assert_eq!(AssetKey::new("ui/hand").to_string(), "ui/hand");
    }
}
