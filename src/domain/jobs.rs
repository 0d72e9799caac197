use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which lyric line a style applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StyleRole {
    Primary,
    Secondary,
}

/// Resolved font styling for one lyric role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_file: PathBuf,
    pub size: u32,
    /// Hex color string, e.g. "#FFFFFF".
    pub color: String,
}

/// Hardware-accelerated encoder selection for render jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HwAccel {
    #[default]
    Software,
    Nvidia,
    Amd,
    Intel,
}

impl HwAccel {
    pub fn label(&self) -> &'static str {
        match self {
            HwAccel::Software => "software (libx264)",
            HwAccel::Nvidia => "nvidia (h264_nvenc)",
            HwAccel::Amd => "amd (h264_amf)",
            HwAccel::Intel => "intel (h264_qsv)",
        }
    }

    /// Parse a persisted label back into a mode. Unknown labels fall back to
    /// software encoding so a stale settings file never breaks a load.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_ascii_lowercase();
        if lower.contains("nvidia") {
            HwAccel::Nvidia
        } else if lower.contains("amd") {
            HwAccel::Amd
        } else if lower.contains("intel") {
            HwAccel::Intel
        } else {
            HwAccel::Software
        }
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the engine needs to run one job. Compiled once by the
/// parameter compiler and never mutated afterwards; a new job always gets a
/// freshly compiled record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParameters {
    pub audio_path: PathBuf,
    pub cover_path: PathBuf,
    pub lyrics_path: PathBuf,
    pub primary: TextStyle,
    pub secondary: TextStyle,
    pub outline_color: String,
    pub outline_width: u32,
    pub background_anim: String,
    pub text_anim: String,
    pub cover_anim: String,
    pub engine_path: String,
    pub hw_accel: HwAccel,
}

impl JobParameters {
    pub fn style(&self, role: StyleRole) -> &TextStyle {
        match role {
            StyleRole::Primary => &self.primary,
            StyleRole::Secondary => &self.secondary,
        }
    }
}

/// A job producing a complete output video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub params: JobParameters,
    pub output_path: PathBuf,
}

/// A job producing one still frame at a given timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewJob {
    pub params: JobParameters,
    pub output_path: PathBuf,
    /// Seconds into the track, within `[0, audio_duration]`.
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Job {
    Render(RenderJob),
    Preview(PreviewJob),
}

impl Job {
    pub fn params(&self) -> &JobParameters {
        match self {
            Job::Render(job) => &job.params,
            Job::Preview(job) => &job.params,
        }
    }

    pub fn output_path(&self) -> &PathBuf {
        match self {
            Job::Render(job) => &job.output_path,
            Job::Preview(job) => &job.output_path,
        }
    }
}

/// Terminal result of one job. Success and failure are distinguished here,
/// never by inspecting the message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(String),
    Failed(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }

    pub fn message(&self) -> &str {
        match self {
            JobOutcome::Succeeded(m) | JobOutcome::Failed(m) => m,
        }
    }
}

/// Messages streamed from a running job back to the caller, in emission
/// order. Exactly one `Finished` is delivered per job, always last.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Status(String),
    Progress(u8),
    /// Consumed preview-frame bytes; emitted before `Finished` on a
    /// successful preview job.
    Frame(Vec<u8>),
    Finished(JobOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hw_accel_label_roundtrip() {
        for mode in [HwAccel::Software, HwAccel::Nvidia, HwAccel::Amd, HwAccel::Intel] {
            assert_eq!(HwAccel::from_label(mode.label()), mode);
        }
    }

    #[test]
    fn hw_accel_unknown_label_falls_back_to_software() {
        assert_eq!(HwAccel::from_label("something else"), HwAccel::Software);
    }

    #[test]
    fn job_records_serialize_with_a_type_tag() {
        let params = JobParameters {
            audio_path: PathBuf::from("track.mp3"),
            cover_path: PathBuf::from("cover.jpg"),
            lyrics_path: PathBuf::from("track.lrc"),
            primary: TextStyle {
                font_file: PathBuf::from("fonts/Main.ttf"),
                size: 56,
                color: String::from("#FFFFFF"),
            },
            secondary: TextStyle {
                font_file: PathBuf::from("fonts/Sub.ttf"),
                size: 48,
                color: String::from("#DDDDDD"),
            },
            outline_color: String::from("#000000"),
            outline_width: 3,
            background_anim: String::from("static-blur"),
            text_anim: String::from("slide-fade"),
            cover_anim: String::from("static-reflection"),
            engine_path: String::from("ffmpeg"),
            hw_accel: HwAccel::Software,
        };
        let job = Job::Preview(PreviewJob {
            params,
            output_path: PathBuf::from("frame.png"),
            timestamp: 12.5,
        });

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "Preview");
        assert_eq!(value["timestamp"], 12.5);
        assert_eq!(job.params().primary.size, 56);
        assert_eq!(job.output_path(), &PathBuf::from("frame.png"));
        assert_eq!(job.params().style(StyleRole::Secondary).size, 48);
    }

    #[test]
    fn outcome_discriminant_ignores_message_text() {
        // A failure whose message mentions success is still a failure.
        let outcome = JobOutcome::Failed("engine reported: success marker not written".into());
        assert!(!outcome.is_success());
    }
}
