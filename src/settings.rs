use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub default_locale: String,
    pub community_room_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            default_locale: "en".to_string(),
            community_room_prefix: "community".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .context("Failed to parse settings JSON")?;
        Ok(settings)
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings dir: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;
        Ok(())
    }

    /// Room name for a community's presence channel.
    pub fn room_for_community(&self, community_id: &str) -> String {
        format!("{}:{}", self.community_room_prefix, community_id)
    }
}
