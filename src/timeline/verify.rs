//! Invariant checks over a published timeline.
//!
//! The engine runs these on its own output and logs anything found; the
//! command line exposes them for timelines produced elsewhere.

use thiserror::Error;

use super::Timeline;
use crate::config::TimelineConfig;

/// Allowed drift between one scene's end and the next one's start.
pub const CONTIGUITY_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("scene {id} has non-positive duration ({start:.2}s - {end:.2}s)")]
    Degenerate { id: usize, start: f64, end: f64 },
    #[error("scene {id} starts before the scene preceding it")]
    OutOfOrder { id: usize },
    #[error("scene {id} starts {gap:+.2}s away from the previous scene's end")]
    Discontinuity { id: usize, gap: f64 },
    #[error("scene {id} lasts {duration:.2}s, above the {max:.2}s cap")]
    TooLong { id: usize, duration: f64, max: f64 },
    #[error("scene at position {position} has id {id}")]
    IdMismatch { position: usize, id: usize },
}

pub fn check_timeline(timeline: &Timeline, config: &TimelineConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (position, scene) in timeline.scenes.iter().enumerate() {
        if scene.id != position + 1 {
            violations.push(Violation::IdMismatch {
                position: position + 1,
                id: scene.id,
            });
        }
        if scene.end <= scene.start {
            violations.push(Violation::Degenerate {
                id: scene.id,
                start: scene.start,
                end: scene.end,
            });
        }
        if scene.duration() > config.max_duration + CONTIGUITY_EPSILON {
            violations.push(Violation::TooLong {
                id: scene.id,
                duration: scene.duration(),
                max: config.max_duration,
            });
        }
    }

    for pair in timeline.scenes.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start < prev.start {
            violations.push(Violation::OutOfOrder { id: next.id });
        }
        let gap = next.start - prev.end;
        if gap.abs() > CONTIGUITY_EPSILON {
            violations.push(Violation::Discontinuity { id: next.id, gap });
        }
    }

    violations
}

/// Ids of scenes shorter than the configured minimum. Advisory only: the
/// first scene and whole timelines shorter than the minimum can be legitimately short.
pub fn short_scenes(timeline: &Timeline, config: &TimelineConfig) -> Vec<usize> {
    timeline
        .scenes
        .iter()
        .filter(|s| s.duration() < config.min_duration - CONTIGUITY_EPSILON)
        .map(|s| s.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::ValidatedScene;

    fn scene(id: usize, start: f64, end: f64) -> ValidatedScene {
        ValidatedScene {
            id,
            start,
            end,
            text: String::new(),
            visual_query: String::new(),
            media_source: "pexels".to_string(),
            media_url: None,
            media_path: None,
        }
    }

    #[test]
    fn clean_timeline_has_no_violations() {
        let timeline = Timeline {
            scenes: vec![scene(1, 0.0, 4.0), scene(2, 4.0, 12.0), scene(3, 12.0, 22.0)],
        };
        assert!(check_timeline(&timeline, &TimelineConfig::default()).is_empty());
    }

    #[test]
    fn empty_timeline_is_valid() {
        assert!(check_timeline(&Timeline::default(), &TimelineConfig::default()).is_empty());
    }

    #[test]
    fn every_kind_of_violation_is_reported() {
        let timeline = Timeline {
            scenes: vec![
                scene(1, 0.0, 11.0),
                scene(3, 11.5, 11.5),
                scene(4, 9.0, 10.0),
            ],
        };
        let violations = check_timeline(&timeline, &TimelineConfig::default());
        assert!(violations.contains(&Violation::TooLong { id: 1, duration: 11.0, max: 10.0 }));
        assert!(violations.contains(&Violation::IdMismatch { position: 2, id: 3 }));
        assert!(violations.contains(&Violation::Degenerate { id: 3, start: 11.5, end: 11.5 }));
        assert!(violations.contains(&Violation::OutOfOrder { id: 4 }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::Discontinuity { id: 3, .. })));
    }

    #[test]
    fn drift_within_epsilon_is_accepted() {
        let timeline = Timeline {
            scenes: vec![scene(1, 0.0, 4.0), scene(2, 4.005, 8.0)],
        };
        assert!(check_timeline(&timeline, &TimelineConfig::default()).is_empty());
    }

    #[test]
    fn short_scene_report() {
        let timeline = Timeline {
            scenes: vec![scene(1, 0.0, 0.3), scene(2, 0.3, 5.0)],
        };
        assert_eq!(short_scenes(&timeline, &TimelineConfig::default()), vec![1]);
    }

    #[test]
    fn violation_messages_are_readable() {
        let v = Violation::Discontinuity { id: 4, gap: 1.5 };
        assert_eq!(v.to_string(), "scene 4 starts +1.50s away from the previous scene's end");
    }
}
