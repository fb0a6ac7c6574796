//! Background timeline generation.
//!
//! Jobs are registered under a uuid and executed one at a time, in
//! submission order, by a single worker thread that owns its own tokio
//! runtime. Callers poll progress or wait for the result. A finished job
//! stays registered until its outcome is collected with [`take_result`]
//! or [`wait_for_result`].

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TimelineConfig;
use crate::planner::ScenePlanner;
use crate::timeline::{build_timeline, MediaAttachment, RawSceneProposal, Timeline, ValidatedScene};
use crate::transcription::WordTiming;

/// Tries per scene before media attachment gives up on it.
pub const MEDIA_ATTEMPTS: usize = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Looks up footage or imagery for a finished scene.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, scene: &ValidatedScene) -> Result<Option<MediaAttachment>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Planning,
    Validating,
    AttachingMedia,
    Complete,
    Error,
    Canceled,
}

impl Stage {
    pub fn is_finished(self) -> bool {
        matches!(self, Stage::Complete | Stage::Error | Stage::Canceled)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Queued => "queued",
            Stage::Planning => "planning",
            Stage::Validating => "validating",
            Stage::AttachingMedia => "attaching_media",
            Stage::Complete => "complete",
            Stage::Error => "error",
            Stage::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub stage: Stage,
    /// Percent, 0 to 100.
    pub progress: f64,
}

/// Everything one generation needs. When `proposals` is present the
/// planner is not consulted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub script: String,
    pub words: Vec<WordTiming>,
    pub proposals: Option<Vec<RawSceneProposal>>,
    pub config: TimelineConfig,
}

#[derive(Debug)]
struct GenerationJob {
    progress: Progress,
    result: Option<Timeline>,
    error: Option<String>,
    canceled: bool,
}

struct QueuedJob {
    id: String,
    request: GenerationRequest,
    planner: Arc<dyn ScenePlanner>,
    resolver: Option<Arc<dyn MediaResolver>>,
}

static JOBS: Lazy<Mutex<HashMap<String, GenerationJob>>> = Lazy::new(|| Mutex::new(HashMap::new()));

static QUEUE: Lazy<Mutex<Sender<QueuedJob>>> = Lazy::new(|| {
    let (tx, rx) = mpsc::channel::<QueuedJob>();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();
        let runtime = match runtime {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "failed to start generation runtime");
                for job in rx {
                    finish_with_error(&job.id, format!("generation runtime unavailable: {e}"));
                }
                return;
            }
        };
        for job in rx {
            runtime.block_on(run_job(job));
        }
    });
    Mutex::new(tx)
});

fn jobs() -> MutexGuard<'static, HashMap<String, GenerationJob>> {
    JOBS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register a job and queue it behind any job already submitted.
pub fn start_generation(
    request: GenerationRequest,
    planner: Arc<dyn ScenePlanner>,
    resolver: Option<Arc<dyn MediaResolver>>,
) -> String {
    let job_id = Uuid::new_v4().to_string();

    let job = GenerationJob {
        progress: Progress {
            stage: Stage::Queued,
            progress: 0.0,
        },
        result: None,
        error: None,
        canceled: false,
    };
    jobs().insert(job_id.clone(), job);

    let queued = QueuedJob {
        id: job_id.clone(),
        request,
        planner,
        resolver,
    };
    let sent = QUEUE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .send(queued);
    if sent.is_err() {
        finish_with_error(&job_id, "generation worker is not running".to_string());
    } else {
        debug!(job_id = %job_id, "generation job queued");
    }

    job_id
}

async fn run_job(job: QueuedJob) {
    let job_id = job.id.clone();
    match generate(job).await {
        Ok(Some(timeline)) => {
            info!(job_id = %job_id, scenes = timeline.len(), "generation complete");
            if let Some(job) = jobs().get_mut(&job_id) {
                job.result = Some(timeline);
                job.progress = Progress {
                    stage: Stage::Complete,
                    progress: 100.0,
                };
            }
        }
        Ok(None) => {
            info!(job_id = %job_id, "generation canceled");
            if let Some(job) = jobs().get_mut(&job_id) {
                job.progress.stage = Stage::Canceled;
            }
        }
        Err(e) => {
            error!(job_id = %job_id, error = %format!("{e:#}"), "generation failed");
            finish_with_error(&job_id, format!("{e:#}"));
        }
    }
}

/// `Ok(None)` when the job was canceled along the way.
async fn generate(job: QueuedJob) -> Result<Option<Timeline>> {
    let QueuedJob {
        id,
        request,
        planner,
        resolver,
    } = job;

    if is_canceled(&id) {
        return Ok(None);
    }
    request
        .config
        .validate()
        .context("refusing to generate with an invalid config")?;

    let proposals = match request.proposals {
        Some(proposals) => proposals,
        None => {
            update_progress(&id, Stage::Planning, 10.0);
            planner
                .propose_scenes(&request.script, &request.words)
                .await
                .context("planning scenes")?
        }
    };
    if is_canceled(&id) {
        return Ok(None);
    }

    update_progress(&id, Stage::Validating, 50.0);
    let mut timeline = build_timeline(&request.words, &proposals, &request.config);
    if timeline.is_empty() {
        bail!("no scenes");
    }

    if let Some(resolver) = resolver {
        update_progress(&id, Stage::AttachingMedia, 60.0);
        if !attach_media(&id, &mut timeline, resolver.as_ref()).await {
            return Ok(None);
        }
    }

    Ok(Some(timeline))
}

/// Best-effort: a scene whose lookups all fail stays without media.
/// Returns `false` when the job was canceled between scenes.
async fn attach_media(job_id: &str, timeline: &mut Timeline, resolver: &dyn MediaResolver) -> bool {
    let total = timeline.len();
    let mut attached = 0;

    for index in 0..total {
        if is_canceled(job_id) {
            return false;
        }
        let scene = timeline.scenes[index].clone();

        for attempt in 1..=MEDIA_ATTEMPTS {
            match resolver.resolve(&scene).await {
                Ok(Some(attachment)) => {
                    timeline.attach_media(scene.id, attachment);
                    attached += 1;
                    break;
                }
                Ok(None) => {
                    debug!(scene = scene.id, query = %scene.visual_query, "no media found");
                    break;
                }
                Err(e) => {
                    warn!(scene = scene.id, attempt, error = %e, "media lookup failed");
                }
            }
        }

        let done = (index + 1) as f64 / total as f64;
        update_progress(job_id, Stage::AttachingMedia, 60.0 + 40.0 * done);
    }

    info!(job_id, attached, scenes = total, "media attachment finished");
    true
}

fn finish_with_error(job_id: &str, message: String) {
    if let Some(job) = jobs().get_mut(job_id) {
        job.progress.stage = Stage::Error;
        job.error = Some(message);
    }
}

fn is_canceled(job_id: &str) -> bool {
    jobs().get(job_id).map_or(true, |job| job.canceled)
}

fn update_progress(job_id: &str, stage: Stage, progress: f64) {
    if let Some(job) = jobs().get_mut(job_id) {
        if job.canceled {
            return;
        }
        job.progress = Progress { stage, progress };
    }
}

pub fn get_progress(job_id: &str) -> Option<Progress> {
    jobs().get(job_id).map(|job| job.progress.clone())
}

pub fn get_result(job_id: &str) -> Option<Timeline> {
    jobs().get(job_id).and_then(|job| job.result.clone())
}

pub fn get_error(job_id: &str) -> Option<String> {
    jobs().get(job_id).and_then(|job| job.error.clone())
}

/// Remove a completed job from the registry and hand back its timeline.
/// Jobs still running, or that failed, are left in place.
pub fn take_result(job_id: &str) -> Option<Timeline> {
    let mut jobs = jobs();
    let complete = jobs
        .get(job_id)
        .is_some_and(|job| job.progress.stage == Stage::Complete);
    if !complete {
        return None;
    }
    jobs.remove(job_id).and_then(|job| job.result)
}

/// Drop a finished job, whatever its outcome. Returns false for unknown or
/// still running jobs.
pub fn release_job(job_id: &str) -> bool {
    let mut jobs = jobs();
    let finished = jobs
        .get(job_id)
        .is_some_and(|job| job.progress.stage.is_finished());
    finished && jobs.remove(job_id).is_some()
}

/// Take a finished job out of the registry, leaving running jobs alone.
fn take_finished(job_id: &str) -> Result<Option<GenerationJob>> {
    let mut jobs = jobs();
    let stage = jobs
        .get(job_id)
        .map(|job| job.progress.stage)
        .ok_or_else(|| anyhow!("unknown job {job_id}"))?;
    Ok(if stage.is_finished() {
        jobs.remove(job_id)
    } else {
        None
    })
}

/// Ask a job to stop. Takes effect at the next stage boundary, or before
/// the next scene while attaching media.
pub fn cancel_processing(job_id: &str) {
    if let Some(job) = jobs().get_mut(job_id) {
        job.canceled = true;
    }
}

/// Poll until the job finishes or `timeout` elapses. The finished job is
/// removed from the registry.
pub async fn wait_for_result(job_id: &str, timeout: Duration) -> Result<Timeline> {
    let started = Instant::now();
    loop {
        if let Some(job) = take_finished(job_id)? {
            return match job.progress.stage {
                Stage::Complete => job.result.ok_or_else(|| anyhow!("job {job_id} has no result")),
                Stage::Canceled => Err(anyhow!("job {job_id} was canceled")),
                _ => {
                    let message = job.error.unwrap_or_else(|| "unknown error".to_string());
                    Err(anyhow!("job {job_id} failed: {message}"))
                }
            };
        }
        if started.elapsed() >= timeout {
            let stage = get_progress(job_id).map(|p| p.stage.to_string()).unwrap_or_default();
            bail!("timed out waiting for job {job_id} (stage {stage})");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
