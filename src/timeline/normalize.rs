use tracing::{debug, warn};

use super::{round2, text_for_range, RawSceneProposal, Scene, SceneKind, EPSILON};
use crate::config::TimelineConfig;
use crate::transcription::{narration_span, WordTiming};

/// Cut `[start, end)` into consecutive pieces of `chunk_duration`. The last
/// piece takes the remainder; a remainder shorter than `min_duration` is
/// folded into the piece before it instead of standing alone. When a chunk
/// cannot advance (float spacing at huge magnitudes) the rest is one piece.
pub fn chunk_bounds(start: f64, end: f64, config: &TimelineConfig) -> Vec<(f64, f64)> {
    if end - start <= EPSILON {
        return Vec::new();
    }
    if config.chunk_duration <= 0.0 {
        return vec![(start, end)];
    }

    let mut bounds = Vec::new();
    let mut chunk_start = start;
    while end - chunk_start > EPSILON {
        let mut chunk_end = round2((chunk_start + config.chunk_duration).min(end));
        if chunk_end <= chunk_start || end - chunk_end < config.min_duration - EPSILON {
            chunk_end = end;
        }
        bounds.push((chunk_start, chunk_end));
        chunk_start = chunk_end;
    }
    bounds
}

/// Split an over-long scene into bounded chunks. Chunk text is re-derived
/// from the word timings; chunk visual queries get a per-index variation.
pub fn split_scene(scene: &Scene, words: &[WordTiming], config: &TimelineConfig) -> Vec<Scene> {
    chunk_bounds(scene.start, scene.end, config)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Scene {
            start,
            end,
            text: match scene.kind {
                SceneKind::Filler => String::new(),
                SceneKind::Narration => text_for_range(words, start, end),
            },
            visual_query: format!("{}{}", scene.visual_query, config.variation_suffix(index)),
            media_source: scene.media_source.clone(),
            kind: scene.kind,
        })
        .collect()
}

/// Window proposals are clamped into: the narration span widened by one
/// maximum scene on each side. `None` without words.
fn narration_window(words: &[WordTiming], config: &TimelineConfig) -> Option<(f64, f64)> {
    let (start, end) = narration_span(words)?;
    Some((
        round2(start - config.max_duration),
        round2(end + config.max_duration),
    ))
}

/// First pass: coerce timings, drop degenerate proposals, clamp them to the
/// narration window, split anything over the cap, and sort by start.
pub fn normalize_proposals(
    proposals: &[RawSceneProposal],
    words: &[WordTiming],
    config: &TimelineConfig,
) -> Vec<Scene> {
    let window = narration_window(words, config);
    let mut scenes = Vec::with_capacity(proposals.len());

    for (index, proposal) in proposals.iter().enumerate() {
        let Some((start, end)) = proposal.bounds() else {
            warn!(index, "dropping scene proposal without numeric start/end");
            continue;
        };
        let (mut start, mut end) = (round2(start), round2(end));
        if !start.is_finite() || !end.is_finite() || end - start <= EPSILON {
            warn!(index, start, end, "dropping scene proposal with unusable duration");
            continue;
        }
        if let Some((lo, hi)) = window {
            if end <= lo || start >= hi {
                warn!(index, start, end, "dropping scene proposal outside the narration");
                continue;
            }
            if start < lo || end > hi {
                debug!(index, start, end, lo, hi, "clamping scene proposal to the narration");
                start = start.max(lo);
                end = end.min(hi);
            }
        }

        let scene = Scene {
            start,
            end,
            text: proposal.text.clone().unwrap_or_default(),
            visual_query: proposal.visual_query.clone().unwrap_or_default(),
            media_source: config.resolve_media_source(proposal.media_source.as_deref()),
            kind: SceneKind::Narration,
        };

        if scene.duration() <= config.max_duration + EPSILON {
            scenes.push(scene);
        } else {
            let chunks = split_scene(&scene, words, config);
            debug!(
                index,
                duration = scene.duration(),
                chunks = chunks.len(),
                "split over-long scene proposal"
            );
            scenes.extend(chunks);
        }
    }

    scenes.sort_by(|a, b| a.start.total_cmp(&b.start));
    scenes
}
