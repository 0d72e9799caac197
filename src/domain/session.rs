//! In-memory session state: the mutable configuration a front-end edits,
//! the parameter compiler reads, and the project serializer snapshots.

use crate::config::Config;
use crate::domain::jobs::{HwAccel, StyleRole};
use crate::domain::lyrics::LyricMetadata;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths to the three job assets, empty until the user picks them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPaths {
    pub audio: String,
    pub cover: String,
    pub lyrics: String,
}

/// Font/size/color choice for one lyric role. `font` is a file name inside
/// the configured font directory, not an absolute path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleChoice {
    pub font: String,
    pub size: u32,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub assets: AssetPaths,
    pub primary_style: StyleChoice,
    pub secondary_style: StyleChoice,
    pub outline_color: String,
    pub outline_width: u32,
    pub background_anim: String,
    pub text_anim: String,
    pub cover_anim: String,
    pub engine_path: String,
    pub hw_accel: HwAccel,
    pub font_dir: PathBuf,
    /// Probed duration of the selected audio asset, 0.0 until known.
    pub audio_duration: f64,
    /// Metadata extracted from the selected lyric file.
    pub lyric_metadata: LyricMetadata,
}

impl SessionState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            assets: AssetPaths::default(),
            primary_style: config.primary_style.clone(),
            secondary_style: config.secondary_style.clone(),
            outline_color: config.outline_color.clone(),
            outline_width: config.outline_width,
            background_anim: config.background_anim.clone(),
            text_anim: config.text_anim.clone(),
            cover_anim: config.cover_anim.clone(),
            engine_path: config.engine_path.clone(),
            hw_accel: config.hw_accel,
            font_dir: config.font_dir.clone(),
            audio_duration: 0.0,
            lyric_metadata: LyricMetadata::new(),
        }
    }

    pub fn style(&self, role: StyleRole) -> &StyleChoice {
        match role {
            StyleRole::Primary => &self.primary_style,
            StyleRole::Secondary => &self.secondary_style,
        }
    }
}
