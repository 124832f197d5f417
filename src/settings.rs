use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Custom,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Dark, Theme::Light, Theme::Custom];
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Theme::Dark => "Dark",
            Theme::Light => "Light",
            Theme::Custom => "Custom",
        };
        f.write_str(label)
    }
}

/// Everything the settings dialog persists. Written wholesale on save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub custom_bg_color: String,
    pub custom_fg_color: String,
    pub custom_accent_color: String,
    pub custom_baud_rates: Vec<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            custom_bg_color: "black".to_string(),
            custom_fg_color: "cyan".to_string(),
            custom_accent_color: "teal".to_string(),
            custom_baud_rates: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("parse settings in {}", path.display()))?;
        tracing::info!(path = %path.display(), theme = ?settings.theme, "settings loaded");
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("write settings to {}", path.display()))?;
        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }
}
