//! Process-wide settings: defaults for every persisted field, loaded once at
//! startup and written back at shutdown and after any job starts.

use crate::domain::animations;
use crate::domain::jobs::HwAccel;
use crate::domain::session::{SessionState, StyleChoice};
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::path::PathBuf;

/// Persisted defaults. Every field has a concrete default value, so loading
/// tolerates settings files written by any older or newer build: absent keys
/// keep their defaults and unrecognized keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine_path: String,
    pub font_dir: PathBuf,
    pub hw_accel: HwAccel,
    pub background_anim: String,
    pub text_anim: String,
    pub cover_anim: String,
    pub primary_style: StyleChoice,
    pub secondary_style: StyleChoice,
    pub outline_color: String,
    pub outline_width: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_path: String::from("ffmpeg"),
            font_dir: PathBuf::from("fonts"),
            hw_accel: HwAccel::Software,
            background_anim: animations::BACKGROUND_STATIC_BLUR.to_string(),
            text_anim: animations::TEXT_SLIDE_FADE.to_string(),
            cover_anim: animations::COVER_STATIC_REFLECTION.to_string(),
            primary_style: StyleChoice {
                font: String::new(),
                size: 56,
                color: String::from("#FFFFFF"),
            },
            secondary_style: StyleChoice {
                font: String::new(),
                size: 48,
                color: String::from("#DDDDDD"),
            },
            outline_color: String::from("#000000"),
            outline_width: 3,
        }
    }
}

impl Config {
    /// Where the settings file lives. `KARAJAN_CONFIG` overrides the
    /// platform config directory.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = env::var("KARAJAN_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(env::temp_dir)
            .join("karajan")
            .join("settings.json")
    }

    /// Load settings from disk, falling back to defaults for a missing or
    /// unreadable file. `KARAJAN_ENGINE` overrides the persisted engine
    /// path.
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        let path = Self::config_path();
        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("ignoring malformed settings file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        if let Ok(engine) = env::var("KARAJAN_ENGINE") {
            config.engine_path = engine;
        }
        config
    }

    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(&path, text)
    }

    /// Snapshot the persistable fields out of a live session.
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            engine_path: state.engine_path.clone(),
            font_dir: state.font_dir.clone(),
            hw_accel: state.hw_accel,
            background_anim: state.background_anim.clone(),
            text_anim: state.text_anim.clone(),
            cover_anim: state.cover_anim.clone(),
            primary_style: state.primary_style.clone(),
            secondary_style: state.secondary_style.clone(),
            outline_color: state.outline_color.clone(),
            outline_width: state.outline_width,
        }
    }
}
