use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::TimelineError;

/// A scene as the reasoning service proposed it. Nothing here is trusted:
/// timings may be missing, strings, inverted or zero-length, and the text
/// fields may hold any JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSceneProposal {
    pub id: Option<Value>,
    #[serde(deserialize_with = "lenient_text")]
    pub text: Option<String>,
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
    #[serde(deserialize_with = "lenient_text")]
    pub visual_query: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub media_source: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub image_prompt: Option<String>,
}

/// Strings pass through, scalars are rendered, anything else counts as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

impl RawSceneProposal {
    pub fn new(start: f64, end: f64, text: &str, visual_query: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            start_time: Some(Value::from(start)),
            end_time: Some(Value::from(end)),
            visual_query: Some(visual_query.to_string()),
            ..Self::default()
        }
    }

    pub fn with_media_source(mut self, source: &str) -> Self {
        self.media_source = Some(source.to_string());
        self
    }

    /// Numeric `(start, end)`, or `None` when either side cannot be coerced.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let start = self.start_time.as_ref().and_then(coerce_seconds)?;
        let end = self.end_time.as_ref().and_then(coerce_seconds)?;
        Some((start, end))
    }
}

fn coerce_seconds(value: &Value) -> Option<f64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    seconds.is_finite().then_some(seconds)
}

/// `{ "scenes": [...] }` as returned by the reasoning service.
#[derive(Debug, Clone, Default, Deserialize)]
struct ProposalSet {
    #[serde(default)]
    scenes: Vec<Value>,
}

/// Decode each proposal independently, dropping entries that are not
/// proposal-shaped instead of failing the whole set.
pub fn proposals_from_value(value: Value) -> Result<Vec<RawSceneProposal>, TimelineError> {
    let set: ProposalSet = serde_json::from_value(value)
        .map_err(|e| TimelineError::json("decoding scene proposal set", e))?;

    let mut proposals = Vec::with_capacity(set.scenes.len());
    for (index, entry) in set.scenes.into_iter().enumerate() {
        match serde_json::from_value::<RawSceneProposal>(entry) {
            Ok(proposal) => proposals.push(proposal),
            Err(e) => warn!(index, error = %e, "dropping malformed scene proposal"),
        }
    }
    Ok(proposals)
}

pub fn parse_proposals(json: &str) -> Result<Vec<RawSceneProposal>, TimelineError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| TimelineError::json("parsing scene proposals", e))?;
    proposals_from_value(value)
}

pub fn load_proposals(path: &std::path::Path) -> Result<Vec<RawSceneProposal>, TimelineError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| TimelineError::io(format!("reading {}", path.display()), e))?;
    parse_proposals(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bounds_accept_numbers_and_numeric_strings() {
        let proposal: RawSceneProposal =
            serde_json::from_value(json!({"start_time": 1, "end_time": " 2.5 "})).expect("decode");
        assert_eq!(proposal.bounds(), Some((1.0, 2.5)));
    }

    #[test]
    fn bounds_reject_missing_or_garbage() {
        let missing: RawSceneProposal =
            serde_json::from_value(json!({"start_time": 1.0})).expect("decode");
        assert_eq!(missing.bounds(), None);

        let garbage: RawSceneProposal =
            serde_json::from_value(json!({"start_time": "soon", "end_time": 3.0})).expect("decode");
        assert_eq!(garbage.bounds(), None);

        let nested: RawSceneProposal =
            serde_json::from_value(json!({"start_time": [1], "end_time": 3.0})).expect("decode");
        assert_eq!(nested.bounds(), None);
    }

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let proposals = parse_proposals(
            r#"{"scenes": [
                {"id": 1, "text": "ok", "start_time": 0, "end_time": 2, "visual_query": "q"},
                "not a scene",
                {"id": "7", "start_time": 4, "end_time": 6, "image_prompt": "p"}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].text.as_deref(), Some("ok"));
        assert_eq!(proposals[1].image_prompt.as_deref(), Some("p"));
    }

    #[test]
    fn odd_text_fields_keep_the_scene() {
        let proposals = parse_proposals(
            r#"{"scenes": [
                {"text": 42, "start_time": 2, "end_time": 4, "visual_query": ["a", "b"]},
                {"text": null, "start_time": 4, "end_time": 6, "media_source": {"name": "pexels"}},
                {"text": true, "start_time": 6, "end_time": 8, "visual_query": "ok"}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(proposals.len(), 3);
        assert_eq!(proposals[0].text.as_deref(), Some("42"));
        assert_eq!(proposals[0].visual_query, None);
        assert_eq!(proposals[0].bounds(), Some((2.0, 4.0)));
        assert_eq!(proposals[1].text, None);
        assert_eq!(proposals[1].media_source, None);
        assert_eq!(proposals[2].text.as_deref(), Some("true"));
        assert_eq!(proposals[2].visual_query.as_deref(), Some("ok"));
    }

    #[test]
    fn missing_scenes_key_is_empty() {
        assert!(parse_proposals("{}").expect("parse").is_empty());
        assert!(parse_proposals(r#"{"scenes": []}"#).expect("parse").is_empty());
    }

    #[test]
    fn non_object_document_is_an_error() {
        assert!(parse_proposals("[1, 2]").is_err());
        assert!(parse_proposals("{oops").is_err());
    }
}
