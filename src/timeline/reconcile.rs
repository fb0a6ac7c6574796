use tracing::debug;

use super::{chunk_bounds, round2, text_for_range, Scene, SceneKind, EPSILON};
use crate::config::TimelineConfig;
use crate::transcription::{narration_span, WordTiming};

/// Second pass: walk the time-sorted scenes and make them contiguous.
///
/// - A hole wider than the tolerance is closed with filler scenes.
/// - An overlap wider than the tolerance is clamped to the previous end.
/// - Anything inside the tolerance band is snapped onto the previous end.
/// - A scene left shorter than the minimum is folded into its predecessor.
pub fn reconcile(scenes: Vec<Scene>, config: &TimelineConfig) -> Vec<Scene> {
    let mut scenes = scenes.into_iter();
    let Some(first) = scenes.next() else {
        return Vec::new();
    };
    let mut out = vec![first];

    for mut curr in scenes {
        let prev_end = out.last().map(|s| s.end).unwrap_or(curr.start);
        let gap = curr.start - prev_end;

        if gap > config.gap_tolerance {
            fill_gap(&mut out, curr.start, config);
        } else if gap < -config.gap_tolerance {
            debug!(
                start = curr.start,
                clamped_to = prev_end,
                "clamping overlapping scene"
            );
            curr.start = prev_end;
            if curr.end <= curr.start {
                curr.end = round2(curr.start + config.min_duration);
            }
        } else {
            curr.start = prev_end;
        }

        absorb_or_push(&mut out, curr, config);
    }

    out
}

/// Close `[prev.end, until)` with filler scenes of at most one chunk each.
/// A hole too short to be a scene of its own stretches the previous scene.
fn fill_gap(out: &mut Vec<Scene>, until: f64, config: &TimelineConfig) {
    let Some(prev) = out.last_mut() else {
        return;
    };
    let from = prev.end;
    if until - from < config.min_duration - EPSILON {
        debug!(from, until, "stretching scene over short gap");
        prev.end = until;
        return;
    }

    let visual_query = filler_query(prev, config);
    let media_source = prev.media_source.clone();
    let fillers: Vec<Scene> = chunk_bounds(from, until, config)
        .into_iter()
        .map(|(start, end)| Scene {
            start,
            end,
            text: String::new(),
            visual_query: visual_query.clone(),
            media_source: media_source.clone(),
            kind: SceneKind::Filler,
        })
        .collect();
    debug!(from, until, fillers = fillers.len(), "filled gap");
    out.extend(fillers);
}

fn filler_query(neighbour: &Scene, config: &TimelineConfig) -> String {
    if neighbour.is_filler() {
        neighbour.visual_query.clone()
    } else {
        format!("{}{}", neighbour.visual_query, config.filler_suffix)
    }
}

fn absorb_or_push(out: &mut Vec<Scene>, curr: Scene, config: &TimelineConfig) {
    match out.last_mut() {
        Some(prev) if curr.duration() < config.min_duration - EPSILON => {
            debug!(
                start = curr.start,
                end = curr.end,
                "merging short scene into predecessor"
            );
            prev.end = prev.end.max(curr.end);
            prev.append_text(&curr.text);
        }
        _ => out.push(curr),
    }
}

/// Stretch the timeline over the whole narration span: the head before the
/// first scene and the tail after the last become coverage scenes (or are
/// absorbed when shorter than the minimum). Does nothing when no scene
/// overlaps the narration.
pub fn extend_to_narration(
    mut scenes: Vec<Scene>,
    words: &[WordTiming],
    config: &TimelineConfig,
) -> Vec<Scene> {
    let Some((span_start, span_end)) = narration_span(words) else {
        return scenes;
    };
    let (span_start, span_end) = (round2(span_start), round2(span_end));
    if !scenes.iter().any(|s| s.start < span_end && s.end > span_start) {
        return scenes;
    }

    // Head
    if let Some(first) = scenes.first_mut() {
        let head = first.start - span_start;
        if head > config.gap_tolerance {
            if head < config.min_duration - EPSILON {
                let spoken = text_for_range(words, span_start, first.start);
                first.text = join_text(&spoken, &first.text);
                first.start = span_start;
                if !first.text.is_empty() {
                    first.kind = SceneKind::Narration;
                }
            } else {
                let lead = coverage_scenes(span_start, first.start, first, words, config);
                debug!(from = span_start, until = first.start, scenes = lead.len(), "covered narration head");
                // The old first scene may be under the minimum; it now has a
                // predecessor to fold into.
                let mut covered = lead;
                for scene in std::mem::take(&mut scenes) {
                    absorb_or_push(&mut covered, scene, config);
                }
                scenes = covered;
            }
        }
    }

    // Tail
    if let Some(last) = scenes.last_mut() {
        let tail = span_end - last.end;
        if tail > config.gap_tolerance {
            if tail < config.min_duration - EPSILON {
                let spoken = text_for_range(words, last.end, span_end);
                last.append_text(&spoken);
                last.end = span_end;
            } else {
                let trail = coverage_scenes(last.end, span_end, last, words, config);
                debug!(from = last.end, until = span_end, scenes = trail.len(), "covered narration tail");
                scenes.extend(trail);
            }
        }
    }

    scenes
}

fn coverage_scenes(
    from: f64,
    until: f64,
    neighbour: &Scene,
    words: &[WordTiming],
    config: &TimelineConfig,
) -> Vec<Scene> {
    let visual_query = filler_query(neighbour, config);
    chunk_bounds(from, until, config)
        .into_iter()
        .map(|(start, end)| {
            let text = text_for_range(words, start, end);
            let kind = if text.is_empty() {
                SceneKind::Filler
            } else {
                SceneKind::Narration
            };
            Scene {
                start,
                end,
                text,
                visual_query: visual_query.clone(),
                media_source: neighbour.media_source.clone(),
                kind,
            }
        })
        .collect()
}

fn join_text(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}
