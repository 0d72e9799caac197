//! Parameter compilation: validate the session state and freeze it into an
//! immutable `JobParameters` record. Pure - no side effects, and the first
//! problem found is reported by name.

use crate::domain::jobs::{JobParameters, StyleRole, TextStyle};
use crate::domain::session::SessionState;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ValidationError {
    /// An asset path is empty or does not reference an existing file.
    /// `role` is one of "audio", "cover", "lyrics".
    MissingAsset { role: &'static str },
    /// One of the font selections is empty.
    MissingFont { font_dir: PathBuf },
    /// A preview timestamp outside `[0, audio_duration]`.
    TimestampOutOfRange { timestamp: f64, duration: f64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingAsset { role } => {
                write!(f, "select a valid {} file first", role)
            }
            ValidationError::MissingFont { font_dir } => write!(
                f,
                "place font files in {:?} and select one for each lyric role",
                font_dir
            ),
            ValidationError::TimestampOutOfRange {
                timestamp,
                duration,
            } => write!(
                f,
                "preview timestamp {:.2}s is outside the track (0..{:.2}s)",
                timestamp, duration
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Compile the current state into job parameters, or report exactly one
/// actionable failure. Colors, sizes and animation choices are expected to
/// have been defaulted earlier; no fallback happens here.
pub fn compile_parameters(state: &SessionState) -> Result<JobParameters, ValidationError> {
    let assets = [
        ("audio", state.assets.audio.as_str()),
        ("cover", state.assets.cover.as_str()),
        ("lyrics", state.assets.lyrics.as_str()),
    ];
    for (role, path) in assets {
        if path.is_empty() || !Path::new(path).is_file() {
            return Err(ValidationError::MissingAsset { role });
        }
    }

    if state.primary_style.font.is_empty() || state.secondary_style.font.is_empty() {
        return Err(ValidationError::MissingFont {
            font_dir: state.font_dir.clone(),
        });
    }

    let style_for = |role: StyleRole| {
        let choice = state.style(role);
        TextStyle {
            font_file: state.font_dir.join(&choice.font),
            size: choice.size,
            color: choice.color.clone(),
        }
    };

    Ok(JobParameters {
        audio_path: PathBuf::from(&state.assets.audio),
        cover_path: PathBuf::from(&state.assets.cover),
        lyrics_path: PathBuf::from(&state.assets.lyrics),
        primary: style_for(StyleRole::Primary),
        secondary: style_for(StyleRole::Secondary),
        outline_color: state.outline_color.clone(),
        outline_width: state.outline_width,
        background_anim: state.background_anim.clone(),
        text_anim: state.text_anim.clone(),
        cover_anim: state.cover_anim.clone(),
        engine_path: state.engine_path.clone(),
        hw_accel: state.hw_accel,
    })
}
