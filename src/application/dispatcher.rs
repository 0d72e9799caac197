//! Job dispatcher: compiles parameters, runs exactly one job at a time on a
//! background task, and streams relayed events plus a single terminal
//! outcome back to the caller.
//!
//! Per job the state machine is Idle -> Compiling -> Running ->
//! Completed(success|failure). Compilation happens on the caller's task and
//! fails fast; everything after `start_*` returns runs on the spawned task.
//! Overlap is refused defensively through a one-permit semaphore even
//! though callers are expected to disable their triggers while a job runs.

use crate::application::compiler::{compile_parameters, ValidationError};
use crate::application::relay::ProgressRelay;
use crate::application::scratch::ScratchDir;
use crate::domain::jobs::{JobEvent, JobOutcome, PreviewJob, RenderJob};
use crate::domain::session::SessionState;
use crate::ports::engine::RenderEngine;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub enum DispatchError {
    /// A job is already running; the start was refused.
    Busy,
    Validation(ValidationError),
    /// The scratch directory could not provide an artifact path.
    Scratch(io::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Busy => write!(f, "a job is already running"),
            DispatchError::Validation(e) => write!(f, "{}", e),
            DispatchError::Scratch(e) => {
                write!(f, "could not allocate a preview artifact: {}", e)
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Validation(e) => Some(e),
            DispatchError::Scratch(e) => Some(e),
            DispatchError::Busy => None,
        }
    }
}

impl From<ValidationError> for DispatchError {
    fn from(err: ValidationError) -> Self {
        DispatchError::Validation(err)
    }
}

/// Caller-side handle to a started job: an ordered stream of status,
/// progress and frame events terminated by exactly one `Finished`.
pub struct JobHandle {
    events: UnboundedReceiver<JobEvent>,
}

impl JobHandle {
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Drain events until the terminal outcome arrives.
    pub async fn wait(mut self) -> JobOutcome {
        while let Some(event) = self.events.recv().await {
            if let JobEvent::Finished(outcome) = event {
                return outcome;
            }
        }
        // The job task cannot drop the sender before the terminal send, so
        // this only happens if the task itself was torn down.
        JobOutcome::Failed(String::from("job ended without reporting an outcome"))
    }
}

pub struct JobDispatcher<E> {
    engine: Arc<E>,
    scratch: Arc<ScratchDir>,
    slot: Arc<Semaphore>,
}

impl<E: RenderEngine + 'static> JobDispatcher<E> {
    pub fn new(engine: Arc<E>, scratch: Arc<ScratchDir>) -> Self {
        Self {
            engine,
            scratch,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Compile the session state and start a full render to `output_path`.
    pub fn start_render(
        &self,
        state: &SessionState,
        output_path: PathBuf,
    ) -> Result<JobHandle, DispatchError> {
        let permit = self.acquire_slot()?;
        let params = compile_parameters(state)?;
        let job = RenderJob {
            params,
            output_path,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.engine.clone();
        tokio::spawn(run_render(engine, job, tx, permit));
        Ok(JobHandle { events: rx })
    }

    /// Compile the session state and start a preview job for one frame at
    /// `timestamp`. The scratch artifact is cleaned up whatever happens.
    pub async fn start_preview(
        &self,
        state: &SessionState,
        timestamp: f64,
    ) -> Result<JobHandle, DispatchError> {
        let permit = self.acquire_slot()?;
        let params = compile_parameters(state)?;
        if timestamp < 0.0 || (state.audio_duration > 0.0 && timestamp > state.audio_duration) {
            return Err(DispatchError::Validation(
                ValidationError::TimestampOutOfRange {
                    timestamp,
                    duration: state.audio_duration,
                },
            ));
        }

        let output_path = self
            .scratch
            .allocate("png")
            .await
            .map_err(DispatchError::Scratch)?;
        let job = PreviewJob {
            params,
            output_path,
            timestamp,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.engine.clone();
        let scratch = self.scratch.clone();
        tokio::spawn(run_preview(engine, scratch, job, tx, permit));
        Ok(JobHandle { events: rx })
    }

    fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, DispatchError> {
        self.slot
            .clone()
            .try_acquire_owned()
            .map_err(|_| DispatchError::Busy)
    }
}

async fn run_render<E: RenderEngine>(
    engine: Arc<E>,
    job: RenderJob,
    events: UnboundedSender<JobEvent>,
    permit: OwnedSemaphorePermit,
) {
    let relay = Arc::new(ProgressRelay::new(events.clone()));
    let outcome = match engine.render(&job, relay).await {
        Ok(()) => match verify_output(&job.output_path).await {
            Ok(()) => JobOutcome::Succeeded(format!(
                "Video rendered to {}",
                job.output_path.display()
            )),
            Err(problem) => JobOutcome::Failed(problem),
        },
        Err(e) => JobOutcome::Failed(format!("render failed: {}", e)),
    };
    // Free the slot before the terminal event so a caller reacting to
    // `Finished` can immediately start the next job.
    drop(permit);
    let _ = events.send(JobEvent::Finished(outcome));
}

async fn run_preview<E: RenderEngine>(
    engine: Arc<E>,
    scratch: Arc<ScratchDir>,
    job: PreviewJob,
    events: UnboundedSender<JobEvent>,
    permit: OwnedSemaphorePermit,
) {
    let relay = Arc::new(ProgressRelay::new(events.clone()));
    let outcome = match engine.preview(&job, relay).await {
        // The artifact must exist and be non-empty; consume_and_delete
        // enforces both and removes the file either way.
        Ok(()) => match scratch.consume_and_delete(&job.output_path).await {
            Ok(bytes) => {
                let _ = events.send(JobEvent::Frame(bytes));
                JobOutcome::Succeeded(String::from("Preview frame generated"))
            }
            Err(e) => JobOutcome::Failed(format!("preview failed: {}", e)),
        },
        Err(e) => {
            // The engine may have left a partial artifact behind.
            let _ = scratch.consume_and_delete(&job.output_path).await;
            JobOutcome::Failed(format!("preview failed: {}", e))
        }
    };
    drop(permit);
    let _ = events.send(JobEvent::Finished(outcome));
}

async fn verify_output(path: &Path) -> Result<(), String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(format!(
            "engine reported completion but {} is empty",
            path.display()
        )),
        Err(_) => Err(format!(
            "engine reported completion but {} was not created",
            path.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::jobs::JobEvent;
    use crate::ports::engine::{MockRenderEngine, ProgressSink};
    use async_trait::async_trait;
    use std::error::Error;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    fn ready_state(dir: &Path) -> SessionState {
        for name in ["track.mp3", "cover.jpg", "lyrics.lrc"] {
            std::fs::write(dir.join(name), b"data").unwrap();
        }
        let mut state = SessionState::from_config(&Config::default());
        state.assets.audio = dir.join("track.mp3").to_string_lossy().into_owned();
        state.assets.cover = dir.join("cover.jpg").to_string_lossy().into_owned();
        state.assets.lyrics = dir.join("lyrics.lrc").to_string_lossy().into_owned();
        state.primary_style.font = String::from("Main.ttf");
        state.secondary_style.font = String::from("Sub.ttf");
        state.audio_duration = 180.0;
        state
    }

    fn dispatcher_with(
        engine: MockRenderEngine,
        scratch_root: PathBuf,
    ) -> JobDispatcher<MockRenderEngine> {
        JobDispatcher::new(
            Arc::new(engine),
            Arc::new(ScratchDir::with_root(scratch_root)),
        )
    }

    async fn collect(mut handle: JobHandle) -> (Vec<JobEvent>, JobOutcome) {
        let mut events = Vec::new();
        loop {
            match handle.next_event().await {
                Some(JobEvent::Finished(outcome)) => return (events, outcome),
                Some(event) => events.push(event),
                None => panic!("job ended without a terminal outcome"),
            }
        }
    }

    fn progress_values(events: &[JobEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn render_success_delivers_progress_and_outcome() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());
        let output = dir.path().join("out.mp4");

        let mut engine = MockRenderEngine::new();
        engine.expect_render().returning(|job, sink| {
            sink.status("encoding");
            sink.progress(0);
            sink.progress(50);
            sink.progress(100);
            std::fs::write(&job.output_path, b"video").unwrap();
            Box::pin(async move { Ok(()) })
        });
        let dispatcher = dispatcher_with(engine, dir.path().join("scratch"));

        let handle = dispatcher.start_render(&state, output.clone()).unwrap();
        let (events, outcome) = collect(handle).await;

        assert!(outcome.is_success());
        assert_eq!(progress_values(&events), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn engine_error_becomes_terminal_failure() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());

        let mut engine = MockRenderEngine::new();
        engine
            .expect_render()
            .returning(|_, _| Box::pin(async move { Err("filter graph rejected".into()) }));
        let dispatcher = dispatcher_with(engine, dir.path().join("scratch"));

        let handle = dispatcher
            .start_render(&state, dir.path().join("out.mp4"))
            .unwrap();
        let outcome = handle.wait().await;

        assert!(!outcome.is_success());
        assert!(outcome.message().contains("filter graph rejected"));
    }

    #[tokio::test]
    async fn missing_render_output_is_a_failure() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());

        let mut engine = MockRenderEngine::new();
        // Engine claims success but never writes the file.
        engine
            .expect_render()
            .returning(|_, _| Box::pin(async move { Ok(()) }));
        let dispatcher = dispatcher_with(engine, dir.path().join("scratch"));

        let handle = dispatcher
            .start_render(&state, dir.path().join("out.mp4"))
            .unwrap();
        let outcome = handle.wait().await;

        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_the_engine() {
        let dir = tempdir().unwrap();
        let mut state = ready_state(dir.path());
        state.assets.audio = dir.path().join("gone.mp3").to_string_lossy().into_owned();

        // No expectations: any engine call would panic the test.
        let dispatcher = dispatcher_with(MockRenderEngine::new(), dir.path().join("scratch"));

        let result = dispatcher.start_render(&state, dir.path().join("out.mp4"));

        match result {
            Err(DispatchError::Validation(ValidationError::MissingAsset { role })) => {
                assert_eq!(role, "audio");
            }
            _ => panic!("expected a validation failure"),
        }
    }

    #[tokio::test]
    async fn preview_success_delivers_frame_and_deletes_artifact() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());

        let mut engine = MockRenderEngine::new();
        engine.expect_preview().returning(|job, _| {
            std::fs::write(&job.output_path, b"png-bytes").unwrap();
            Box::pin(async move { Ok(()) })
        });
        let scratch_root = dir.path().join("scratch");
        let dispatcher = dispatcher_with(engine, scratch_root.clone());

        let handle = dispatcher.start_preview(&state, 12.5).await.unwrap();
        let (events, outcome) = collect(handle).await;

        assert!(outcome.is_success());
        let frame = events.iter().find_map(|e| match e {
            JobEvent::Frame(bytes) => Some(bytes.clone()),
            _ => None,
        });
        assert_eq!(frame.as_deref(), Some(b"png-bytes".as_slice()));
        // Nothing is left behind in the scratch directory.
        let leftovers: Vec<_> = std::fs::read_dir(&scratch_root)
            .map(|entries| entries.collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn zero_byte_preview_is_a_failure_and_still_deleted() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());

        let mut engine = MockRenderEngine::new();
        engine.expect_preview().returning(|job, _| {
            std::fs::write(&job.output_path, b"").unwrap();
            Box::pin(async move { Ok(()) })
        });
        let scratch_root = dir.path().join("scratch");
        let dispatcher = dispatcher_with(engine, scratch_root.clone());

        let handle = dispatcher.start_preview(&state, 1.0).await.unwrap();
        let outcome = handle.wait().await;

        assert!(!outcome.is_success());
        let leftovers: Vec<_> = std::fs::read_dir(&scratch_root)
            .map(|entries| entries.collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn preview_engine_error_still_cleans_up() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());

        let mut engine = MockRenderEngine::new();
        engine.expect_preview().returning(|job, _| {
            // Partial artifact left behind by the failed engine call.
            std::fs::write(&job.output_path, b"partial").unwrap();
            Box::pin(async move { Err("encoder crashed".into()) })
        });
        let scratch_root = dir.path().join("scratch");
        let dispatcher = dispatcher_with(engine, scratch_root.clone());

        let handle = dispatcher.start_preview(&state, 1.0).await.unwrap();
        let outcome = handle.wait().await;

        assert!(!outcome.is_success());
        assert!(outcome.message().contains("encoder crashed"));
        let leftovers: Vec<_> = std::fs::read_dir(&scratch_root)
            .map(|entries| entries.collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn preview_timestamp_outside_track_is_rejected() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());

        let dispatcher = dispatcher_with(MockRenderEngine::new(), dir.path().join("scratch"));

        let result = dispatcher.start_preview(&state, 500.0).await;
        assert!(matches!(
            result,
            Err(DispatchError::Validation(
                ValidationError::TimestampOutOfRange { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn sequential_jobs_each_start_from_zero() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());

        let mut engine = MockRenderEngine::new();
        engine.expect_render().times(2).returning(|job, sink| {
            sink.progress(0);
            sink.progress(50);
            std::fs::write(&job.output_path, b"video").unwrap();
            Box::pin(async move { Ok(()) })
        });
        let dispatcher = dispatcher_with(engine, dir.path().join("scratch"));

        let first = dispatcher
            .start_render(&state, dir.path().join("a.mp4"))
            .unwrap();
        let (first_events, _) = collect(first).await;

        let second = dispatcher
            .start_render(&state, dir.path().join("b.mp4"))
            .unwrap();
        let (second_events, _) = collect(second).await;

        // A fresh relay per job: the second job's 0% is not swallowed by
        // the first job's final 50%.
        assert_eq!(progress_values(&first_events), vec![0, 50]);
        assert_eq!(progress_values(&second_events), vec![0, 50]);
    }

    /// Engine that parks until released, for exercising the single-job rule.
    struct ParkedEngine {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl RenderEngine for ParkedEngine {
        async fn render(
            &self,
            _job: &RenderJob,
            _sink: Arc<dyn ProgressSink>,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.release.notified().await;
            Err("released".into())
        }

        async fn preview(
            &self,
            _job: &PreviewJob,
            _sink: Arc<dyn ProgressSink>,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            unreachable!("preview is not used in this test")
        }
    }

    #[tokio::test]
    async fn overlapping_start_is_refused_while_a_job_runs() {
        let dir = tempdir().unwrap();
        let state = ready_state(dir.path());
        let release = Arc::new(Notify::new());

        let dispatcher = JobDispatcher::new(
            Arc::new(ParkedEngine {
                release: release.clone(),
            }),
            Arc::new(ScratchDir::with_root(dir.path().join("scratch"))),
        );

        let first = dispatcher
            .start_render(&state, dir.path().join("a.mp4"))
            .unwrap();

        // Second start while the first is parked: refused.
        assert!(matches!(
            dispatcher.start_render(&state, dir.path().join("b.mp4")),
            Err(DispatchError::Busy)
        ));

        release.notify_one();
        let _ = first.wait().await;

        // Slot is free again once the first job completed.
        assert!(dispatcher
            .start_render(&state, dir.path().join("c.mp4"))
            .is_ok());
        release.notify_one();
    }
}
