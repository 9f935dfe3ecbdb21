//! Export configuration
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! no file at all) works. A few settings can be overridden from the
//! environment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::export::MarkdownOptions;
use crate::history::BranchPolicy;
use crate::overlay::MemoryOverlayStore;
use crate::pdf::PdfOptions;
use crate::shared::errors::OverlayError;

pub const ENV_BRANCH_POLICY: &str = "CHAT_EXPORT_BRANCH_POLICY";
pub const ENV_OVERLAY_PATH: &str = "CHAT_EXPORT_OVERLAY_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub markdown: MarkdownOptions,
    pub pdf: PdfOptions,
    /// Which child continues the main branch at a branch point
    pub branch_policy: BranchPolicy,
    /// Where marks, stars and renames are persisted
    pub overlay_path: Option<PathBuf>,
}

impl ExportConfig {
    /// Read a config file, then apply environment overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.with_env_overrides()
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (usually the process environment)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(policy) = lookup(ENV_BRANCH_POLICY) {
            self.branch_policy = policy
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid {}", ENV_BRANCH_POLICY))?;
        }
        if let Some(path) = lookup(ENV_OVERLAY_PATH).filter(|p| !p.trim().is_empty()) {
            self.overlay_path = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    /// Overlay store backed by `overlay_path`; in-memory only when unset
    pub fn open_overlay_store(&self) -> Result<MemoryOverlayStore, OverlayError> {
        match &self.overlay_path {
            Some(path) => MemoryOverlayStore::load(path),
            None => Ok(MemoryOverlayStore::new()),
        }
    }

    /// Persist `store` to `overlay_path`. Returns false when no path is configured.
    pub fn save_overlay_store(&self, store: &MemoryOverlayStore) -> Result<bool, OverlayError> {
        match &self.overlay_path {
            Some(path) => {
                store.save(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::NumberingStyle;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("chat-export-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{ "pdf": { "numbering": "roman" }, "branch_policy": "most_recent" }"#).unwrap();

        let config = ExportConfig::load(&path).unwrap();
        assert_eq!(config.pdf.numbering, NumberingStyle::Roman);
        assert_eq!(config.pdf.font_size, PdfOptions::default().font_size);
        assert_eq!(config.branch_policy, BranchPolicy::MostRecent);
        assert_eq!(config.markdown, MarkdownOptions::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = ExportConfig::load(Path::new("/nonexistent/chat-export.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_overrides() {
        let config = ExportConfig::default()
            .with_overrides(|key| match key {
                ENV_BRANCH_POLICY => Some("most_recent".into()),
                ENV_OVERLAY_PATH => Some("/tmp/overlay.json".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.branch_policy, BranchPolicy::MostRecent);
        assert_eq!(config.overlay_path, Some(PathBuf::from("/tmp/overlay.json")));

        let bad = ExportConfig::default().with_overrides(|key| (key == ENV_BRANCH_POLICY).then(|| "sideways".into()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_overlay_store_follows_overlay_path() {
        use crate::overlay::{is_starred, toggle_star};

        let dir = std::env::temp_dir().join(format!("chat-export-overlay-{}", uuid::Uuid::new_v4()));
        let path = dir.join("overlay.json");
        let config = ExportConfig::default()
            .with_overrides(|key| (key == ENV_OVERLAY_PATH).then(|| path.display().to_string()))
            .unwrap();

        let store = config.open_overlay_store().unwrap();
        assert!(store.is_empty());
        toggle_star(&store, "conv-1");
        assert!(config.save_overlay_store(&store).unwrap());

        let reopened = config.open_overlay_store().unwrap();
        assert!(is_starred(&reopened, "conv-1"));

        let in_memory = ExportConfig::default();
        assert!(in_memory.open_overlay_store().unwrap().is_empty());
        assert!(!in_memory.save_overlay_store(&store).unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }
}
