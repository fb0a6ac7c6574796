use super::{round2, Scene, ValidatedScene};

/// Last pass: number the (already time-ordered) scenes `1..=N`. Identifiers
/// a proposal may have carried are never reused.
pub fn assign_ids(scenes: Vec<Scene>) -> Vec<ValidatedScene> {
    scenes
        .into_iter()
        .enumerate()
        .map(|(index, scene)| ValidatedScene {
            id: index + 1,
            start: round2(scene.start),
            end: round2(scene.end),
            text: scene.text,
            visual_query: scene.visual_query,
            media_source: scene.media_source,
            media_url: None,
            media_path: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::SceneKind;

    #[test]
    fn ids_are_sequential_from_one() {
        let scenes: Vec<Scene> = (0..4)
            .map(|i| Scene {
                start: i as f64 * 2.0,
                end: i as f64 * 2.0 + 2.0,
                text: String::new(),
                visual_query: String::new(),
                media_source: "pexels".to_string(),
                kind: SceneKind::Narration,
            })
            .collect();
        let ids: Vec<usize> = assign_ids(scenes).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn boundaries_are_rounded() {
        let scene = Scene {
            start: 0.1 + 0.2,
            end: 1.0049,
            text: "t".to_string(),
            visual_query: "q".to_string(),
            media_source: "pexels".to_string(),
            kind: SceneKind::Narration,
        };
        let out = assign_ids(vec![scene]);
        assert_eq!(out[0].start, 0.3);
        assert_eq!(out[0].end, 1.0);
        assert!(out[0].media_url.is_none() && out[0].media_path.is_none());
    }
}
