//! Scene timeline synthesis for narrated video.
//!
//! See [`timeline::build_timeline`] for the engine entry point and
//! [`processor`] for running generations in the background.

pub mod commands;
pub mod config;
pub mod error;
pub mod planner;
pub mod processor;
pub mod timeline;
pub mod transcription;

pub use config::{Coverage, Settings, TextSource, TimelineConfig};
pub use error::TimelineError;
pub use planner::{PollinationsPlanner, ScenePlanner};
pub use processor::{GenerationRequest, MediaResolver, Progress, Stage};
pub use timeline::{build_timeline, MediaAttachment, RawSceneProposal, Timeline, ValidatedScene};
pub use transcription::WordTiming;
