use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};

use crate::document::{DocumentError, Selector};
use crate::resolver::DEFAULT_MIN_MATCH_LENGTH;

/// Label of the selected game in the library header.
pub const DEFAULT_NAME_SELECTOR: &str = "._3rpUkswF6xc_ste4Ros_xM";
/// Tooltip row holding "Cloud Status", "Play Time", "Achievements", ...
pub const DEFAULT_CONTAINER_SELECTOR: &str = "._1mDAVT4sTzFRwJtlKCw2Ws";
/// The "Play Time" block; the widget goes right after it.
pub const DEFAULT_ANCHOR_SELECTOR: &str = "._1kiZKVbDe-9Ikootk57kpA._1aKegVl9_lSdNAyWYZQlr9";

/// Source that produced the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Engine tuning. Every field has a default so partial files work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiescence window (ms) after the last mutation before a pass runs.
    pub debounce_window_ms: u64,
    /// Minimum length of a backend key that may prefix-match a longer
    /// display name.
    pub min_match_length: usize,
    pub name_selector: String,
    /// Candidate tooltip containers; the last match is used.
    pub container_selector: String,
    pub anchor_selector: String,
    /// Case-insensitive substrings of the acquisition source that make a
    /// record worth showing.
    pub qualifying_markers: Vec<String>,
    pub widget_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 100,
            min_match_length: DEFAULT_MIN_MATCH_LENGTH,
            name_selector: DEFAULT_NAME_SELECTOR.to_string(),
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            anchor_selector: DEFAULT_ANCHOR_SELECTOR.to_string(),
            qualifying_markers: vec![
                "gift".to_string(),
                "guest pass".to_string(),
                "complimentary".to_string(),
            ],
            widget_label: "Gift?".to_string(),
        }
    }
}

/// Selectors parsed once from an [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct Selectors {
    pub name: Selector,
    pub container: Selector,
    pub anchor: Selector,
}

impl EngineConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms.max(1))
    }

    pub fn selectors(&self) -> Result<Selectors, DocumentError> {
        Ok(Selectors {
            name: Selector::parse(&self.name_selector)?,
            container: Selector::parse(&self.container_selector)?,
            anchor: Selector::parse(&self.anchor_selector)?,
        })
    }

    /// Load configuration overrides using environment variables.
    /// Evaluation order:
    /// 1) `$GRATITUDE_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$GRATITUDE_CONFIG_JSON` (inline JSON),
    /// 3) defaults if neither is set.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        if let Ok(path_str) = env::var("GRATITUDE_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("GRATITUDE_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed =
                Self::parse_json(&raw).context("failed to parse GRATITUDE_CONFIG_JSON")?;
            return Ok((parsed, ConfigSource::EnvInline));
        }

        Ok((Self::default(), ConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents)
                .with_context(|| format!("invalid engine config {}", path.display()))?,
            Some("toml") | Some("tml") => toml::from_str(&contents)
                .map_err(|err| anyhow!("invalid engine config {}: {}", path.display(), err))?,
            _ => Self::parse_from_str(&contents, &path.display().to_string())?,
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_json(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Unknown extension: try JSON first, then TOML.
    fn parse_from_str(raw: &str, origin: &str) -> anyhow::Result<Self> {
        if let Ok(config) = serde_json::from_str::<Self>(raw) {
            return Ok(config);
        }
        toml::from_str(raw).map_err(|err| anyhow!("invalid engine config {origin}: {err}"))
    }

    /// Reject selectors the engine could never match with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.selectors()
            .map(|_| ())
            .map_err(|err| anyhow!("invalid engine config: {err}"))
    }
}
