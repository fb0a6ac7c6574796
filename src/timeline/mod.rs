//! Scene timeline synthesis.
//!
//! Word timings plus loosely-specified scene proposals go in; a gapless,
//! non-overlapping, duration-capped scene list comes out. The work is split
//! into passes that each take and return an ordered scene list:
//!
//! 1. [`normalize_proposals`] drops unusable proposals and splits long ones.
//! 2. [`reconcile`] fills gaps, clamps overlaps and folds short scenes into
//!    their predecessor.
//! 3. [`resplit_overlong`] re-applies the duration cap.
//! 4. [`assign_ids`] numbers the scenes.
//!
//! The engine never fails: malformed proposals are dropped, and missing word
//! timings or an empty or fully invalid proposal list yield an empty timeline.

mod normalize;
mod proposal;
mod reconcile;
mod resplit;
mod sequence;
pub mod verify;


use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Coverage, TextSource, TimelineConfig};
use crate::transcription::WordTiming;

pub use normalize::{chunk_bounds, normalize_proposals, split_scene};
pub use proposal::{load_proposals, parse_proposals, proposals_from_value, RawSceneProposal};
pub use reconcile::{extend_to_narration, reconcile};
pub use resplit::resplit_overlong;
pub use sequence::assign_ids;

/// Slack for float comparisons on values already rounded to centiseconds.
pub(crate) const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    /// Backed by narration (a proposal, a chunk of one, or a coverage extension).
    Narration,
    /// Synthesized to close a hole; carries no narration text.
    Filler,
}

/// A scene while it moves through the passes.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub visual_query: String,
    pub media_source: String,
    pub kind: SceneKind,
}

impl Scene {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_filler(&self) -> bool {
        self.kind == SceneKind::Filler
    }

    /// Append narration text, space-joined.
    pub(crate) fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
        self.kind = SceneKind::Narration;
    }
}

/// A published scene. Serializes with `start_time` / `end_time` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedScene {
    pub id: usize,
    #[serde(rename = "start_time")]
    pub start: f64,
    #[serde(rename = "end_time")]
    pub end: f64,
    pub text: String,
    pub visual_query: String,
    pub media_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
}

impl ValidatedScene {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn has_media(&self) -> bool {
        self.media_url.is_some() || self.media_path.is_some()
    }
}

/// Media the downstream fetch stage found for a scene.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaAttachment {
    Url(String),
    Path(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub scenes: Vec<ValidatedScene>,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn total_duration(&self) -> f64 {
        match (self.scenes.first(), self.scenes.last()) {
            (Some(first), Some(last)) => last.end - first.start,
            _ => 0.0,
        }
    }

    pub fn scene(&self, id: usize) -> Option<&ValidatedScene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    /// Attach fetched media to the scene with `id`. Returns false for an unknown id.
    pub fn attach_media(&mut self, id: usize, attachment: MediaAttachment) -> bool {
        let Some(scene) = self.scenes.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        match attachment {
            MediaAttachment::Url(url) => scene.media_url = Some(url),
            MediaAttachment::Path(path) => scene.media_path = Some(path.to_string_lossy().into_owned()),
        }
        true
    }

    pub fn to_json_pretty(&self) -> Result<String, crate::error::TimelineError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::TimelineError::json("serializing timeline", e))
    }
}

pub(crate) fn round2(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Words that *begin* inside `[start, end)`, space-joined in time order.
/// A word straddling a boundary belongs to the scene it starts in.
pub fn text_for_range(words: &[WordTiming], start: f64, end: f64) -> String {
    let mut selected: Vec<&WordTiming> = words
        .iter()
        .filter(|w| w.start >= start && w.start < end)
        .collect();
    selected.sort_by(|a, b| a.start.total_cmp(&b.start));
    selected
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replace every narrated scene's text with the words actually spoken in it.
pub fn rederive_text(scenes: Vec<Scene>, words: &[WordTiming]) -> Vec<Scene> {
    scenes
        .into_iter()
        .map(|mut scene| {
            if !scene.is_filler() {
                scene.text = text_for_range(words, scene.start, scene.end);
            }
            scene
        })
        .collect()
}

/// Run every pass over private copies of the inputs.
pub fn build_timeline(
    words: &[WordTiming],
    proposals: &[RawSceneProposal],
    config: &TimelineConfig,
) -> Timeline {
    if words.is_empty() {
        info!(proposals = proposals.len(), "no word timings, timeline is empty");
        return Timeline::default();
    }
    let mut words = words.to_vec();
    words.sort_by(|a, b| a.start.total_cmp(&b.start));

    let normalized = normalize_proposals(proposals, &words, config);
    if normalized.is_empty() {
        info!(proposals = proposals.len(), "no usable scene proposals, timeline is empty");
        return Timeline::default();
    }

    let mut scenes = reconcile(normalized, config);
    if config.coverage == Coverage::NarrationSpan {
        scenes = extend_to_narration(scenes, &words, config);
    }
    if config.text_source == TextSource::Narration {
        scenes = rederive_text(scenes, &words);
    }
    let scenes = resplit_overlong(scenes, &words, config);
    let timeline = Timeline {
        scenes: assign_ids(scenes),
    };

    let violations = verify::check_timeline(&timeline, config);
    for violation in &violations {
        warn!(%violation, "timeline invariant violated");
    }

    info!(
        proposals = proposals.len(),
        scenes = timeline.len(),
        duration = timeline.total_duration(),
        "timeline built"
    );
    timeline
}
