use crate::domain::jobs::{PreviewJob, RenderJob};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

/// Two-callback interface the rendering engine reports through while a job
/// runs. `status` is an append-only log sink; `progress` carries a percent
/// in `0..=100`.
pub trait ProgressSink: Send + Sync {
    fn status(&self, message: &str);
    fn progress(&self, percent: u8);
}

/// The external rendering engine. On return from `render`, a completed
/// video exists at the job's output path or an error is signaled; on return
/// from `preview`, a still image exists at the output path or an error is
/// signaled. Callers verify output non-emptiness independently.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait RenderEngine: Send + Sync {
    async fn render(
        &self,
        job: &RenderJob,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn preview(
        &self,
        job: &PreviewJob,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}
