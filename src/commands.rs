use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Settings, TimelineConfig};
use crate::planner::PollinationsPlanner;
use crate::processor::{self, GenerationRequest};
use crate::timeline::verify::{self, Violation};
use crate::timeline::{build_timeline, load_proposals, Timeline};
use crate::transcription::load_word_timings;

/// Upper bound on a planned generation, planner round trip included.
const PLAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Run the engine over word timings and proposals read from disk.
pub fn build(words_path: &Path, proposals_path: &Path, config: &TimelineConfig) -> Result<Timeline> {
    config.validate()?;
    let words = load_word_timings(words_path)?;
    let proposals = load_proposals(proposals_path)?;
    info!(
        words = words.len(),
        proposals = proposals.len(),
        "loaded timeline inputs"
    );
    Ok(build_timeline(&words, &proposals, config))
}

/// Ask the planner for proposals, then build the timeline through the
/// background pipeline.
pub async fn plan(script_path: &Path, words_path: &Path, settings: &Settings) -> Result<Timeline> {
    let script = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {}", script_path.display()))?;
    let words = load_word_timings(words_path)?;
    if settings.pollinations_api_key.is_none() {
        warn!("POLLINATIONS_API_KEY not set, calling the planner anonymously");
    }

    let planner = PollinationsPlanner::from_settings(settings)?;
    let request = GenerationRequest {
        script,
        words,
        proposals: None,
        config: settings.timeline_config(),
    };
    let job_id = processor::start_generation(request, Arc::new(planner), None);
    info!(job_id = %job_id, "generation started");

    processor::wait_for_result(&job_id, PLAN_TIMEOUT).await
}

/// Re-check a timeline produced earlier.
pub fn check(timeline_path: &Path, config: &TimelineConfig) -> Result<Vec<Violation>> {
    let data = std::fs::read_to_string(timeline_path)
        .with_context(|| format!("Failed to read timeline {}", timeline_path.display()))?;
    let timeline: Timeline = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse timeline {}", timeline_path.display()))?;

    let violations = verify::check_timeline(&timeline, config);
    let short = verify::short_scenes(&timeline, config);
    if !short.is_empty() {
        info!(scenes = ?short, "scenes shorter than the minimum duration");
    }
    info!(
        scenes = timeline.len(),
        duration = timeline.total_duration(),
        violations = violations.len(),
        "timeline checked"
    );
    Ok(violations)
}

/// Write the timeline as pretty JSON to `output`, or to stdout without one.
pub fn write_timeline(timeline: &Timeline, output: Option<&Path>) -> Result<()> {
    let json = timeline.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), scenes = timeline.len(), "timeline written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
