//! Event-triggered thumbnail and MP4 normalization worker.
//!
//! Receives object-finalize events, derives a thumbnail and a normalized
//! MP4 from each uploaded video, publishes both to the object store and
//! finalizes the source.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod paths;
pub mod pipeline;
pub mod trigger;
pub mod work_item;

pub use config::{PipelineConfig, ServerConfig, VideoPlacement};
pub use error::{Artifact, PipelineError, PipelineResult};
pub use logging::InvocationLogger;
pub use paths::{derive, directory_matches, DerivedPaths};
pub use pipeline::{Outcome, Pipeline, PublishReport, SkipReason};
pub use trigger::{router, TriggerState};
pub use work_item::WorkItem;
