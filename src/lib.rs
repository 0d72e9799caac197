//! Karajan - Karaoke Lyric-Video Pipeline
//!
//! Hexagonal Architecture:
//! - domain/: Job records, lyric parsing, animation catalogs, session state
//! - ports/: Trait seams to the external rendering engine
//! - adapters/: ffmpeg process adapter (engine, filter graphs, duration probe)
//! - application/: Pipeline services (compiler, dispatcher, relay, scratch)
//! - config: Persisted process-wide settings
//! - project: Versioned project documents
//!
//! The pipeline runs one job at a time on a background task and streams
//! status, progress and a single terminal outcome back through a channel.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod project;

// Re-exports for convenience
pub use application::{DispatchError, JobDispatcher, JobHandle, ScratchDir, ValidationError};
pub use config::Config;
pub use domain::jobs::{Job, JobEvent, JobOutcome, JobParameters, PreviewJob, RenderJob};
pub use domain::session::SessionState;
