//! End-to-end runs through the JSON boundary: word timings and proposal
//! documents in, timeline document out.

use serde_json::{json, Value};

use scene_timeline::timeline::{build_timeline, parse_proposals, verify};
use scene_timeline::transcription::parse_word_timings;
use scene_timeline::{Coverage, Settings, Timeline, TimelineConfig};

fn words_json(until: f64) -> String {
    let words: Vec<Value> = (0..)
        .map(|i| i as f64 * 0.5)
        .take_while(|t| *t < until)
        .enumerate()
        .map(|(i, t)| json!({"word": format!("w{i}"), "start": t, "end": t + 0.4}))
        .collect();
    json!({ "words": words }).to_string()
}

fn run(words: &str, proposals: &str, config: &TimelineConfig) -> Value {
    let words = parse_word_timings(words).expect("words");
    let proposals = parse_proposals(proposals).expect("proposals");
    let timeline = build_timeline(&words, &proposals, config);
    assert!(verify::check_timeline(&timeline, config).is_empty());
    serde_json::from_str(&timeline.to_json_pretty().expect("serialize")).expect("reparse")
}

fn spans(doc: &Value) -> Vec<(f64, f64)> {
    doc["scenes"]
        .as_array()
        .expect("scenes array")
        .iter()
        .map(|s| {
            (
                s["start_time"].as_f64().expect("start_time"),
                s["end_time"].as_f64().expect("end_time"),
            )
        })
        .collect()
}

#[test]
fn fifteen_second_proposal_becomes_two_scenes() {
    let proposals = r#"{"scenes": [{"start_time": 0, "end_time": 15, "text": "everything", "visual_query": "q"}]}"#;
    let doc = run(&words_json(15.0), proposals, &TimelineConfig::default());

    assert_eq!(spans(&doc), vec![(0.0, 8.0), (8.0, 15.0)]);
    assert_eq!(doc["scenes"][0]["visual_query"], "q");
    assert_eq!(doc["scenes"][1]["visual_query"], "q, different angle");
    assert_eq!(doc["scenes"][0]["id"], 1);
    assert_eq!(doc["scenes"][1]["id"], 2);
}

#[test]
fn gap_gets_atmospheric_filler() {
    let proposals = r#"{"scenes": [
        {"start_time": 0, "end_time": 3, "text": "a", "visual_query": "harbor", "media_source": "pexels"},
        {"start_time": 5, "end_time": 8, "text": "b", "visual_query": "lighthouse", "media_source": "pexels"}
    ]}"#;
    let doc = run(&words_json(8.0), proposals, &TimelineConfig::default());

    assert_eq!(spans(&doc), vec![(0.0, 3.0), (3.0, 5.0), (5.0, 8.0)]);
    let filler = &doc["scenes"][1];
    assert_eq!(filler["text"], "");
    assert_eq!(filler["visual_query"], "harbor (Atmospheric)");
    assert_eq!(filler["media_source"], "pexels");
}

#[test]
fn overlap_is_clamped_to_previous_end() {
    let proposals = r#"{"scenes": [
        {"start_time": 0, "end_time": 5, "text": "a", "visual_query": "q"},
        {"start_time": 4, "end_time": 9, "text": "b", "visual_query": "q"}
    ]}"#;
    let doc = run(&words_json(9.0), proposals, &TimelineConfig::default());
    assert_eq!(spans(&doc), vec![(0.0, 5.0), (5.0, 9.0)]);
}

#[test]
fn short_scene_is_merged_with_text() {
    let proposals = r#"{"scenes": [
        {"start_time": 0, "end_time": 5, "text": "the long part", "visual_query": "q"},
        {"start_time": 5, "end_time": 5.3, "text": "tail", "visual_query": "q"}
    ]}"#;
    let doc = run(&words_json(5.3), proposals, &TimelineConfig::default());
    assert_eq!(spans(&doc), vec![(0.0, 5.3)]);
    assert_eq!(doc["scenes"][0]["text"], "the long part tail");
}

#[test]
fn empty_proposals_give_empty_document() {
    let doc = run(&words_json(4.0), r#"{"scenes": []}"#, &TimelineConfig::default());
    assert_eq!(doc, json!({"scenes": []}));
}

#[test]
fn missing_word_timings_give_empty_document() {
    let proposals = r#"{"scenes": [{"start_time": 0, "end_time": 5, "text": "a", "visual_query": "q"}]}"#;
    let doc = run(r#"{"words": []}"#, proposals, &TimelineConfig::default());
    assert_eq!(doc, json!({"scenes": []}));
}

#[test]
fn numeric_text_keeps_the_scene() {
    let proposals = r#"{"scenes": [{"start_time": 0, "end_time": 4, "text": 42, "visual_query": ["x"]}]}"#;
    let doc = run(&words_json(4.0), proposals, &TimelineConfig::default());
    assert_eq!(spans(&doc), vec![(0.0, 4.0)]);
    assert_eq!(doc["scenes"][0]["text"], "42");
    assert_eq!(doc["scenes"][0]["visual_query"], "");
}

#[test]
fn malformed_entries_are_dropped_not_fatal() {
    let proposals = r#"{"scenes": [
        "not a scene",
        {"start_time": "oops", "end_time": 2, "text": "x"},
        {"start_time": "1.0", "end_time": "4.5", "text": "kept", "visual_query": "q", "id": "seven"},
        {"end_time": 9}
    ]}"#;
    let doc = run(&words_json(5.0), proposals, &TimelineConfig::default());
    assert_eq!(spans(&doc), vec![(1.0, 4.5)]);
    assert_eq!(doc["scenes"][0]["id"], 1);
    assert_eq!(doc["scenes"][0]["text"], "kept");
}

#[test]
fn segmented_transcript_is_accepted() {
    let words = json!({
        "segments": [
            {"text": "one two", "words": [
                {"word": " one", "start": 0.0, "end": 0.4},
                {"word": " two", "start": 0.5, "end": 0.9}
            ]},
            {"text": "three", "words": [{"word": " three", "start": 4.0, "end": 4.6}]}
        ]
    })
    .to_string();
    let proposals = r#"{"scenes": [{"start_time": 2, "end_time": 3, "text": "", "visual_query": "dawn"}]}"#;
    let config = TimelineConfig {
        coverage: Coverage::NarrationSpan,
        ..TimelineConfig::default()
    };
    let doc = run(&words, proposals, &config);

    assert_eq!(spans(&doc), vec![(0.0, 2.0), (2.0, 3.0), (3.0, 4.6)]);
    assert_eq!(doc["scenes"][0]["text"], "one two");
    assert_eq!(doc["scenes"][2]["text"], "three");
}

#[test]
fn settings_flow_into_engine_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"default_media_source": "pexels", "enabled_media_sources": ["pexels", "duckduckgo"]}"#,
    )
    .expect("write settings");
    let config = Settings::load(&path).expect("load").timeline_config();

    let proposals = r#"{"scenes": [
        {"start_time": 0, "end_time": 3, "visual_query": "a"},
        {"start_time": 3, "end_time": 6, "visual_query": "b", "media_source": "duckduckgo"},
        {"start_time": 6, "end_time": 9, "visual_query": "c", "media_source": "pollinations"}
    ]}"#;
    let doc = run(&words_json(9.0), proposals, &config);
    let sources: Vec<&str> = doc["scenes"]
        .as_array()
        .expect("scenes")
        .iter()
        .map(|s| s["media_source"].as_str().expect("media_source"))
        .collect();
    assert_eq!(sources, vec!["pexels", "duckduckgo", "pexels"]);
}

#[test]
fn published_document_reads_back_as_timeline() {
    let proposals = r#"{"scenes": [{"start_time": 0, "end_time": 22, "text": "x", "visual_query": "city"}]}"#;
    let doc = run(&words_json(22.0), proposals, &TimelineConfig::default());
    let timeline: Timeline = serde_json::from_value(doc).expect("timeline");
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline.total_duration(), 22.0);
    assert!(timeline.scenes.iter().all(|s| s.duration() <= 10.0));
}
