//! Versioned project documents: a JSON snapshot of the asset paths and
//! style settings, reloadable across schema versions.
//!
//! Loading is a field-by-field merge, not a wholesale overwrite: every
//! recognized key present in the document replaces the in-memory value,
//! every absent key leaves the existing default untouched, and unrecognized
//! keys are ignored. Only a structurally unparsable document is an error,
//! and it mutates nothing.

use crate::domain::jobs::HwAccel;
use crate::domain::lyrics::LyricMetadata;
use crate::domain::session::SessionState;
use serde_json::{json, Value};
use std::fmt;
use std::io;
use std::path::Path;

pub const PROJECT_VERSION: f64 = 3.0;
pub const PROJECT_EXTENSION: &str = "kproj";

#[derive(Debug)]
pub enum ProjectError {
    Io(io::Error),
    Malformed(serde_json::Error),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::Io(e) => write!(f, "project file error: {}", e),
            ProjectError::Malformed(e) => write!(f, "project file is not valid JSON: {}", e),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::Io(e) => Some(e),
            ProjectError::Malformed(e) => Some(e),
        }
    }
}

impl From<io::Error> for ProjectError {
    fn from(err: io::Error) -> Self {
        ProjectError::Io(err)
    }
}

/// Snapshot the session into a project document and write it to `path`.
pub fn save_project(state: &SessionState, path: &Path) -> Result<(), ProjectError> {
    let document = json!({
        "version": PROJECT_VERSION,
        "file_paths": {
            "audio": state.assets.audio,
            "cover": state.assets.cover,
            "lyrics": state.assets.lyrics,
        },
        "settings": {
            "font_primary": state.primary_style.font,
            "font_size_primary": state.primary_style.size,
            "color_primary": state.primary_style.color,
            "font_secondary": state.secondary_style.font,
            "font_size_secondary": state.secondary_style.size,
            "color_secondary": state.secondary_style.color,
            "outline_color": state.outline_color,
            "outline_width": state.outline_width,
            "background_anim": state.background_anim,
            "text_anim": state.text_anim,
            "cover_anim": state.cover_anim,
            "engine_path": state.engine_path,
            "hw_accel": state.hw_accel.label(),
        },
    });

    let text = serde_json::to_string_pretty(&document).map_err(ProjectError::Malformed)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Load a project document from `path` and merge it into `state`.
pub fn load_project(path: &Path, state: &mut SessionState) -> Result<(), ProjectError> {
    let text = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&text).map_err(ProjectError::Malformed)?;
    merge_document(&document, state);
    Ok(())
}

fn merge_str(object: &serde_json::Map<String, Value>, key: &str, field: &mut String) {
    if let Some(value) = object.get(key).and_then(Value::as_str) {
        *field = value.to_string();
    }
}

fn merge_u32(object: &serde_json::Map<String, Value>, key: &str, field: &mut u32) {
    if let Some(value) = object.get(key).and_then(Value::as_u64) {
        *field = value as u32;
    }
}

/// Apply every recognized field of a parsed document to the session.
pub fn merge_document(document: &Value, state: &mut SessionState) {
    if let Some(paths) = document.get("file_paths").and_then(Value::as_object) {
        merge_str(paths, "audio", &mut state.assets.audio);
        merge_str(paths, "cover", &mut state.assets.cover);
        merge_str(paths, "lyrics", &mut state.assets.lyrics);
    }

    let Some(settings) = document.get("settings").and_then(Value::as_object) else {
        return;
    };
    merge_str(settings, "font_primary", &mut state.primary_style.font);
    merge_u32(settings, "font_size_primary", &mut state.primary_style.size);
    merge_str(settings, "color_primary", &mut state.primary_style.color);
    merge_str(settings, "font_secondary", &mut state.secondary_style.font);
    merge_u32(
        settings,
        "font_size_secondary",
        &mut state.secondary_style.size,
    );
    merge_str(settings, "color_secondary", &mut state.secondary_style.color);
    merge_str(settings, "outline_color", &mut state.outline_color);
    merge_u32(settings, "outline_width", &mut state.outline_width);
    merge_str(settings, "background_anim", &mut state.background_anim);
    merge_str(settings, "text_anim", &mut state.text_anim);
    merge_str(settings, "cover_anim", &mut state.cover_anim);
    merge_str(settings, "engine_path", &mut state.engine_path);
    if let Some(label) = settings.get("hw_accel").and_then(Value::as_str) {
        state.hw_accel = HwAccel::from_label(label);
    }
}

/// Derive a default output filename from lyric metadata: artist and title
/// when both are known, title alone otherwise, else the fallback stem.
pub fn default_filename(metadata: &LyricMetadata, fallback_stem: &str, extension: &str) -> String {
    match (metadata.get("ti"), metadata.get("ar")) {
        (Some(title), Some(artist)) => format!("{} - {}.{}", artist, title, extension),
        (Some(title), None) => format!("{}.{}", title, extension),
        _ => format!("{}.{}", fallback_stem, extension),
    }
}
