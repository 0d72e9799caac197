//! The concrete rendering engine: an external ffmpeg-style binary driven
//! over its command line, with progress parsed from its log output.

use crate::adapters::ffmpeg::filters::{self, FilterError, FPS};
use crate::adapters::ffmpeg::probe::{probe_duration, RealProbeRunner};
use crate::domain::jobs::{HwAccel, JobParameters, PreviewJob, RenderJob};
use crate::domain::lyrics::parse_bilingual_lrc;
use crate::ports::engine::{ProgressSink, RenderEngine};
use async_trait::async_trait;
use regex::Regex;
use std::error::Error;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

#[derive(Debug)]
pub enum EngineError {
    Probe(String),
    EmptyLyrics(PathBuf),
    Filter(FilterError),
    Io(std::io::Error),
    Exit(std::process::ExitStatus),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Probe(msg) => write!(f, "duration probe failed: {}", msg),
            EngineError::EmptyLyrics(path) => {
                write!(f, "lyric file {:?} parsed to no timed lines", path)
            }
            EngineError::Filter(e) => write!(f, "{}", e),
            EngineError::Io(e) => write!(f, "engine process error: {}", e),
            EngineError::Exit(status) => write!(f, "engine exited with {}", status),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Filter(e) => Some(e),
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err)
    }
}

impl From<FilterError> for EngineError {
    fn from(err: FilterError) -> Self {
        EngineError::Filter(err)
    }
}

#[derive(Clone, Copy)]
enum MediaMode {
    Render,
    Preview { timestamp: f64 },
}

pub struct FfmpegEngine {
    progress_re: Regex,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self {
            progress_re: Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").unwrap(),
        }
    }

    /// Extract a percent from one engine log line, relative to the track
    /// duration. The raw values are not monotonic; the relay filters them.
    fn parse_progress(&self, line: &str, duration: f64) -> Option<u8> {
        if duration <= 0.0 {
            return None;
        }
        let caps = self.progress_re.captures(line)?;
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        let centis: f64 = caps[4].parse().ok()?;
        let current = hours * 3600.0 + minutes * 60.0 + seconds + centis / 100.0;
        Some(((100.0 * current / duration) as i64).clamp(0, 100) as u8)
    }

    async fn process_media(
        &self,
        params: &JobParameters,
        output_path: &Path,
        mode: MediaMode,
        sink: &Arc<dyn ProgressSink>,
    ) -> Result<(), EngineError> {
        sink.status(&format!("analyzing {}", params.audio_path.display()));
        let (duration, probe_error) =
            probe_duration(&RealProbeRunner, &params.engine_path, &params.audio_path).await;
        if !probe_error.is_empty() {
            return Err(EngineError::Probe(probe_error));
        }
        if duration <= 0.0 {
            return Err(EngineError::Probe(String::from(
                "probe reported a zero-length track",
            )));
        }
        sink.status(&format!("track duration: {:.2}s", duration));

        let lyric_text = tokio::fs::read_to_string(&params.lyrics_path).await?;
        let (lines, _) = parse_bilingual_lrc(&lyric_text);
        if lines.is_empty() {
            return Err(EngineError::EmptyLyrics(params.lyrics_path.clone()));
        }

        sink.status(&format!(
            "building filter graph (background: {}, text: {}, cover: {})",
            params.background_anim, params.text_anim, params.cover_anim
        ));
        let preview_at = match mode {
            MediaMode::Render => None,
            MediaMode::Preview { timestamp } => Some(timestamp),
        };
        let graph = filters::build_filter_graph(params, &lines, duration, preview_at)?;

        // The graph easily exceeds command-line limits, so it goes through
        // a script file. The handle keeps the file alive until the process
        // has finished and removes it on drop.
        let mut filter_file = tempfile::Builder::new()
            .prefix("karajan_filter_")
            .suffix(".txt")
            .tempfile()?;
        filter_file.write_all(graph.as_bytes())?;
        filter_file.flush()?;
        sink.status(&format!(
            "filter script written to {}",
            filter_file.path().display()
        ));

        let mut cmd = TokioCommand::new(&params.engine_path);
        cmd.arg("-y").arg("-i").arg(&params.cover_path);
        if matches!(mode, MediaMode::Render) {
            cmd.arg("-i").arg(&params.audio_path);
        }
        cmd.arg("-filter_complex_script").arg(filter_file.path());
        cmd.arg("-map").arg("[v]");

        match mode {
            MediaMode::Render => {
                cmd.arg("-map").arg("1:a");
                for arg in encoder_args(params.hw_accel) {
                    cmd.arg(arg);
                }
                if params.hw_accel != HwAccel::Software {
                    sink.status(&format!("hardware acceleration: {}", params.hw_accel));
                }
                cmd.arg("-c:a")
                    .arg("aac")
                    .arg("-b:a")
                    .arg("320k")
                    .arg("-pix_fmt")
                    .arg("yuv420p")
                    .arg("-r")
                    .arg(FPS.to_string())
                    .arg("-t")
                    .arg(duration.to_string());
            }
            MediaMode::Preview { .. } => {
                cmd.arg("-frames:v").arg("1");
            }
        }
        cmd.arg(output_path);

        sink.status(&format!("starting engine: {:?}", cmd.as_std()));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn()?;

        // The engine logs to stderr; stream it back and mine progress from
        // it while the render runs.
        let report_progress = matches!(mode, MediaMode::Render);
        if let Some(stderr) = child.stderr.take() {
            let mut log_lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = log_lines.next_line().await {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                sink.status(trimmed);
                if report_progress {
                    if let Some(percent) = self.parse_progress(trimmed, duration) {
                        sink.progress(percent);
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(EngineError::Exit(status));
        }
        sink.status("engine finished");
        Ok(())
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn encoder_args(hw: HwAccel) -> &'static [&'static str] {
    match hw {
        HwAccel::Software => &["-c:v", "libx264", "-preset", "veryfast", "-crf", "20"],
        HwAccel::Nvidia => &[
            "-c:v",
            "h264_nvenc",
            "-preset",
            "fast",
            "-cq",
            "23",
            "-profile:v",
            "high",
        ],
        HwAccel::Amd => &[
            "-c:v",
            "h264_amf",
            "-quality",
            "balanced",
            "-rc",
            "cqp",
            "-qp_p",
            "23",
            "-qp_i",
            "23",
        ],
        HwAccel::Intel => &[
            "-c:v",
            "h264_qsv",
            "-preset",
            "fast",
            "-global_quality",
            "23",
        ],
    }
}

#[async_trait]
impl RenderEngine for FfmpegEngine {
    async fn render(
        &self,
        job: &RenderJob,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.process_media(&job.params, &job.output_path, MediaMode::Render, &sink)
            .await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
    }

    async fn preview(
        &self,
        job: &PreviewJob,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.process_media(
            &job.params,
            &job.output_path,
            MediaMode::Preview {
                timestamp: job.timestamp,
            },
            &sink,
        )
        .await
        .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
    }
}
