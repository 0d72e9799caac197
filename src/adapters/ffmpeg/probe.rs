//! Duration probing through the engine's companion probe tool.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command as TokioCommand;

/// Executes the probe process. Split out as a trait so duration parsing can
/// be tested without a real tool on the machine.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ProbeRunner: Send + Sync {
    async fn run_duration_probe(&self, probe_path: &Path, media_path: &Path)
        -> io::Result<Output>;
}

pub struct RealProbeRunner;

#[async_trait]
impl ProbeRunner for RealProbeRunner {
    async fn run_duration_probe(
        &self,
        probe_path: &Path,
        media_path: &Path,
    ) -> io::Result<Output> {
        TokioCommand::new(probe_path)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(media_path)
            .output()
            .await
    }
}

fn probe_executable_name() -> &'static str {
    if cfg!(windows) {
        "ffprobe.exe"
    } else {
        "ffprobe"
    }
}

/// Resolve the probe tool relative to the configured engine binary. The
/// bare default identifier stays bare (found on PATH); a concrete engine
/// path prefers a sibling executable and falls back to PATH lookup.
pub fn resolve_probe_path(engine_path: &str) -> PathBuf {
    if engine_path == "ffmpeg" {
        return PathBuf::from("ffprobe");
    }
    if let Some(dir) = Path::new(engine_path).parent() {
        let sibling = dir.join(probe_executable_name());
        if sibling.is_file() {
            return sibling;
        }
    }
    PathBuf::from(probe_executable_name())
}

/// Query the audio asset's duration in seconds. Every failure - missing
/// tool, non-zero exit, unparsable output - is folded into
/// `(0.0, message)`; nothing propagates past this boundary.
pub async fn probe_duration(
    runner: &dyn ProbeRunner,
    engine_path: &str,
    audio_path: &Path,
) -> (f64, String) {
    let probe_path = resolve_probe_path(engine_path);

    match runner.run_duration_probe(&probe_path, audio_path).await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            match stdout.trim().parse::<f64>() {
                Ok(seconds) => (seconds, String::new()),
                Err(_) => (
                    0.0,
                    format!(
                        "probe tool produced an unparsable duration: {:?}",
                        stdout.trim()
                    ),
                ),
            }
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            (
                0.0,
                format!(
                    "probe tool exited with {}: {}",
                    output.status,
                    stderr.trim()
                ),
            )
        }
        Err(e) => (
            0.0,
            format!("could not run probe tool {:?}: {}", probe_path, e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bare_engine_identifier_uses_bare_probe_name() {
        assert_eq!(resolve_probe_path("ffmpeg"), PathBuf::from("ffprobe"));
    }

    #[test]
    fn explicit_engine_path_prefers_sibling_probe() {
        let dir = tempdir().unwrap();
        let engine = dir.path().join("ffmpeg");
        let sibling = dir.path().join(probe_executable_name());
        std::fs::write(&engine, b"").unwrap();
        std::fs::write(&sibling, b"").unwrap();

        assert_eq!(resolve_probe_path(engine.to_str().unwrap()), sibling);
    }

    #[test]
    fn missing_sibling_falls_back_to_path_lookup() {
        let dir = tempdir().unwrap();
        let engine = dir.path().join("ffmpeg");

        assert_eq!(
            resolve_probe_path(engine.to_str().unwrap()),
            PathBuf::from(probe_executable_name())
        );
    }

    #[tokio::test]
    async fn nonexistent_engine_and_media_yield_zero_and_a_message() {
        let dir = tempdir().unwrap();
        let engine = dir.path().join("no-such-dir").join("ffmpeg");

        let (seconds, error) = probe_duration(
            &RealProbeRunner,
            engine.to_str().unwrap(),
            &dir.path().join("no-such-audio.mp3"),
        )
        .await;

        assert_eq!(seconds, 0.0);
        assert!(!error.is_empty());
    }

    #[cfg(unix)]
    mod with_mock {
        use super::*;
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        fn fake_output(code: i32, stdout: &str, stderr: &str) -> Output {
            Output {
                status: ExitStatus::from_raw(code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }
        }

        #[tokio::test]
        async fn parses_a_clean_duration() {
            let mut runner = MockProbeRunner::new();
            runner.expect_run_duration_probe().returning(|_, _| {
                let output = fake_output(0, "187.356009\n", "");
                Box::pin(async move { Ok(output) })
            });

            let (seconds, error) =
                probe_duration(&runner, "ffmpeg", Path::new("track.mp3")).await;

            assert!((seconds - 187.356009).abs() < 1e-9);
            assert!(error.is_empty());
        }

        #[tokio::test]
        async fn unparsable_output_reports_zero() {
            let mut runner = MockProbeRunner::new();
            runner.expect_run_duration_probe().returning(|_, _| {
                let output = fake_output(0, "N/A\n", "");
                Box::pin(async move { Ok(output) })
            });

            let (seconds, error) =
                probe_duration(&runner, "ffmpeg", Path::new("track.mp3")).await;

            assert_eq!(seconds, 0.0);
            assert!(error.contains("unparsable"));
        }

        #[tokio::test]
        async fn nonzero_exit_reports_stderr() {
            let mut runner = MockProbeRunner::new();
            runner.expect_run_duration_probe().returning(|_, _| {
                let output = fake_output(256, "", "track.mp3: No such file");
                Box::pin(async move { Ok(output) })
            });

            let (seconds, error) =
                probe_duration(&runner, "ffmpeg", Path::new("track.mp3")).await;

            assert_eq!(seconds, 0.0);
            assert!(error.contains("No such file"));
        }
    }
}
