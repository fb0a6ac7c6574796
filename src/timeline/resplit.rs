use tracing::debug;

use super::{split_scene, Scene, EPSILON};
use crate::config::TimelineConfig;
use crate::transcription::WordTiming;

/// Third pass: merges and clamps in reconciliation can push a scene back over
/// the cap, so anything still too long is split again with the same chunking.
pub fn resplit_overlong(scenes: Vec<Scene>, words: &[WordTiming], config: &TimelineConfig) -> Vec<Scene> {
    let mut out = Vec::with_capacity(scenes.len());
    for scene in scenes {
        if scene.duration() > config.max_duration + EPSILON {
            let chunks = split_scene(&scene, words, config);
            debug!(
                start = scene.start,
                end = scene.end,
                chunks = chunks.len(),
                "re-split scene that grew past the cap"
            );
            out.extend(chunks);
        } else {
            out.push(scene);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::SceneKind;

    #[test]
    fn scenes_under_cap_pass_through() {
        let config = TimelineConfig::default();
        let scene = Scene {
            start: 0.0,
            end: 10.0,
            text: "keep me".to_string(),
            visual_query: "q".to_string(),
            media_source: "pexels".to_string(),
            kind: SceneKind::Narration,
        };
        let out = resplit_overlong(vec![scene.clone()], &[], &config);
        assert_eq!(out, vec![scene]);
    }

    #[test]
    fn grown_scene_is_split_again() {
        let config = TimelineConfig::default();
        let words = vec![
            WordTiming::new("early", 1.0, 1.5),
            WordTiming::new("late", 9.0, 9.5),
        ];
        let scene = Scene {
            start: 0.0,
            end: 10.4,
            text: "early late".to_string(),
            visual_query: "q".to_string(),
            media_source: "pexels".to_string(),
            kind: SceneKind::Narration,
        };
        let out = resplit_overlong(vec![scene], &words, &config);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].start, out[0].end), (0.0, 8.0));
        assert_eq!((out[1].start, out[1].end), (8.0, 10.4));
        assert_eq!(out[0].text, "early");
        assert_eq!(out[1].text, "late");
        assert_eq!(out[1].visual_query, "q, different angle");
    }

    #[test]
    fn grown_filler_stays_silent() {
        let config = TimelineConfig::default();
        let words = vec![WordTiming::new("stray", 9.0, 9.5)];
        let scene = Scene {
            start: 0.0,
            end: 12.0,
            text: String::new(),
            visual_query: "q (Atmospheric)".to_string(),
            media_source: "pexels".to_string(),
            kind: SceneKind::Filler,
        };
        let out = resplit_overlong(vec![scene], &words, &config);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.text.is_empty() && s.is_filler()));
    }
}
