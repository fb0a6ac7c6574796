use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TimelineError;

/// Hard cap on a published scene, in seconds.
pub const MAX_SCENE_DURATION: f64 = 10.0;
/// Scenes shorter than this are folded into their predecessor.
pub const MIN_SCENE_DURATION: f64 = 0.5;
/// Length of the pieces an over-long scene or a long gap is cut into.
pub const CHUNK_DURATION: f64 = 8.0;
/// Boundary discrepancies within this band are neither filled nor clamped.
pub const GAP_TOLERANCE: f64 = 0.1;

pub const FILLER_QUERY_SUFFIX: &str = " (Atmospheric)";

/// Appended to the visual query of successive chunks of one long scene,
/// cycling by chunk index, so generated media differs from chunk to chunk.
pub const VARIATION_SUFFIXES: &[&str] = &[
    "",
    ", different angle",
    ", close-up shot",
    ", wide shot",
    ", cinematic lighting",
    ", detailed view",
];

pub const DEFAULT_MEDIA_SOURCE: &str = "pollinations";
pub const KNOWN_MEDIA_SOURCES: &[&str] = &["pexels", "duckduckgo", "pollinations"];

/// Minimum Jaro-Winkler similarity for mapping a misspelled media source
/// onto an enabled one.
const MEDIA_SOURCE_SIMILARITY: f64 = 0.85;

const DEFAULT_PLANNER_ENDPOINT: &str = "https://text.pollinations.ai/openai";
const DEFAULT_PLANNER_MODEL: &str = "openai";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Only what the proposals and their gap fills cover.
    #[default]
    BestEffort,
    /// Extend the head and tail of the timeline to the full narration span.
    NarrationSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Keep the text each proposal supplied (split chunks are always re-derived).
    #[default]
    Proposal,
    /// Re-derive every narrated scene's text from the word timings.
    Narration,
}

/// Tunables for the timeline engine. Passed explicitly into every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    pub max_duration: f64,
    pub min_duration: f64,
    pub chunk_duration: f64,
    pub gap_tolerance: f64,
    pub filler_suffix: String,
    pub variation_suffixes: Vec<String>,
    pub default_media_source: String,
    /// Enabled media sources. Empty means any value passes through.
    pub media_sources: Vec<String>,
    pub coverage: Coverage,
    pub text_source: TextSource,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_duration: MAX_SCENE_DURATION,
            min_duration: MIN_SCENE_DURATION,
            chunk_duration: CHUNK_DURATION,
            gap_tolerance: GAP_TOLERANCE,
            filler_suffix: FILLER_QUERY_SUFFIX.to_string(),
            variation_suffixes: VARIATION_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            default_media_source: DEFAULT_MEDIA_SOURCE.to_string(),
            media_sources: KNOWN_MEDIA_SOURCES.iter().map(|s| s.to_string()).collect(),
            coverage: Coverage::default(),
            text_source: TextSource::default(),
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<(), TimelineError> {
        let durations = [
            ("max_duration", self.max_duration),
            ("min_duration", self.min_duration),
            ("chunk_duration", self.chunk_duration),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(TimelineError::invalid_config(format!(
                    "{name} must be a positive number of seconds, got {value}"
                )));
            }
        }
        if self.chunk_duration > self.max_duration {
            return Err(TimelineError::invalid_config(format!(
                "chunk_duration ({}) exceeds max_duration ({})",
                self.chunk_duration, self.max_duration
            )));
        }
        if self.min_duration >= self.chunk_duration {
            return Err(TimelineError::invalid_config(format!(
                "min_duration ({}) must be below chunk_duration ({})",
                self.min_duration, self.chunk_duration
            )));
        }
        // A chunk plus an absorbed remainder must still fit under the cap.
        if self.chunk_duration + self.min_duration > self.max_duration {
            return Err(TimelineError::invalid_config(format!(
                "chunk_duration + min_duration ({}) exceeds max_duration ({})",
                self.chunk_duration + self.min_duration,
                self.max_duration
            )));
        }
        if !self.gap_tolerance.is_finite() || self.gap_tolerance < 0.0 {
            return Err(TimelineError::invalid_config(format!(
                "gap_tolerance must be non-negative, got {}",
                self.gap_tolerance
            )));
        }
        if self.variation_suffixes.is_empty() {
            return Err(TimelineError::invalid_config(
                "variation_suffixes must hold at least one entry",
            ));
        }
        Ok(())
    }

    pub fn variation_suffix(&self, chunk_index: usize) -> &str {
        if self.variation_suffixes.is_empty() {
            return "";
        }
        &self.variation_suffixes[chunk_index % self.variation_suffixes.len()]
    }

    /// Map a proposal's media source onto an enabled one, falling back to the default.
    pub fn resolve_media_source(&self, raw: Option<&str>) -> String {
        let requested = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        if requested.is_empty() {
            return self.default_media_source.clone();
        }
        if self.media_sources.is_empty() || self.media_sources.iter().any(|s| *s == requested) {
            return requested;
        }

        let closest = self
            .media_sources
            .iter()
            .map(|source| (source, strsim::jaro_winkler(&requested, source)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match closest {
            Some((source, score)) if score >= MEDIA_SOURCE_SIMILARITY => {
                debug!(requested = %requested, resolved = %source, score, "mapped media source");
                source.clone()
            }
            _ => {
                debug!(requested = %requested, fallback = %self.default_media_source, "unknown media source");
                self.default_media_source.clone()
            }
        }
    }
}

/// User-level settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub planner_endpoint: String,
    pub planner_model: String,
    #[serde(skip_serializing)]
    pub pollinations_api_key: Option<String>,
    pub default_media_source: String,
    pub enabled_media_sources: Vec<String>,
    pub coverage: Coverage,
    pub text_source: TextSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            planner_endpoint: DEFAULT_PLANNER_ENDPOINT.to_string(),
            planner_model: DEFAULT_PLANNER_MODEL.to_string(),
            pollinations_api_key: None,
            default_media_source: DEFAULT_MEDIA_SOURCE.to_string(),
            enabled_media_sources: KNOWN_MEDIA_SOURCES.iter().map(|s| s.to_string()).collect(),
            coverage: Coverage::default(),
            text_source: TextSource::default(),
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scene-timeline").join("settings.json"))
    }

    /// Load settings from `path`. A missing file yields the defaults; keys
    /// absent from the file keep their default values.
    pub fn load(path: &Path) -> Result<Self, TimelineError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| TimelineError::io(format!("reading {}", path.display()), e))?;
        serde_json::from_str(&data)
            .map_err(|e| TimelineError::json(format!("parsing {}", path.display()), e))
    }

    /// Load from the explicit path, else the per-user default, then apply
    /// environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, TimelineError> {
        let mut settings = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), TimelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TimelineError::io(format!("creating {}", parent.display()), e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TimelineError::json("serializing settings", e))?;
        std::fs::write(path, json)
            .map_err(|e| TimelineError::io(format!("writing {}", path.display()), e))
    }

    pub fn apply_env(&mut self) {
        if let Some(key) = env_value("POLLINATIONS_API_KEY") {
            self.pollinations_api_key = Some(key);
        }
        if let Some(model) = env_value("POLLINATIONS_TEXT_MODEL") {
            self.planner_model = model;
        }
        if let Some(sources) = env_value("ENABLED_MEDIA_SOURCES") {
            let sources: Vec<String> = sources
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if sources.is_empty() {
                warn!("ENABLED_MEDIA_SOURCES is set but lists no sources, ignoring");
            } else {
                self.enabled_media_sources = sources;
            }
        }
    }

    pub fn timeline_config(&self) -> TimelineConfig {
        TimelineConfig {
            default_media_source: self.default_media_source.clone(),
            media_sources: self.enabled_media_sources.clone(),
            coverage: self.coverage,
            text_source: self.text_source,
            ..TimelineConfig::default()
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    // Remove quotes if present
    let value = value.trim().trim_matches('"').to_string();
    (!value.is_empty()).then_some(value)
}
