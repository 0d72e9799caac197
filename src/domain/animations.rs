//! Animation catalogs.
//!
//! Each catalog is a fixed set of named identifiers the configuration layer
//! enumerates and the job parameters carry as plain strings. The engine
//! adapter maps identifiers to concrete filter fragments; everything above
//! that layer treats them as opaque names.

/// Background animations. `GRADIENT_WAVE` is generative: it synthesizes its
/// own frames and consumes no image input stream.
pub const BACKGROUND_STATIC_BLUR: &str = "static-blur";
pub const BACKGROUND_GRADIENT_WAVE: &str = "gradient-wave";
pub const BACKGROUND_WAVE_BLUR: &str = "wave-blur";

pub const BACKGROUND_ANIMATIONS: &[&str] = &[
    BACKGROUND_STATIC_BLUR,
    BACKGROUND_GRADIENT_WAVE,
    BACKGROUND_WAVE_BLUR,
];

/// Lyric text animations.
pub const TEXT_SLIDE_FADE: &str = "slide-fade";
pub const TEXT_SCROLL_LIST: &str = "scroll-list";

pub const TEXT_ANIMATIONS: &[&str] = &[TEXT_SLIDE_FADE, TEXT_SCROLL_LIST];

/// Cover-image animations.
pub const COVER_STATIC_REFLECTION: &str = "static-reflection";
pub const COVER_VINYL_SPIN: &str = "vinyl-spin";

pub const COVER_ANIMATIONS: &[&str] = &[COVER_STATIC_REFLECTION, COVER_VINYL_SPIN];

/// Whether a background animation synthesizes its own frames instead of
/// transforming the cover image.
pub fn is_generative_background(name: &str) -> bool {
    name == BACKGROUND_GRADIENT_WAVE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_are_nonempty_and_distinct() {
        for catalog in [BACKGROUND_ANIMATIONS, TEXT_ANIMATIONS, COVER_ANIMATIONS] {
            assert!(!catalog.is_empty());
            let mut names: Vec<&str> = catalog.to_vec();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), catalog.len());
        }
    }

    #[test]
    fn gradient_wave_is_the_only_generative_background() {
        let generative: Vec<&&str> = BACKGROUND_ANIMATIONS
            .iter()
            .filter(|name| is_generative_background(name))
            .collect();
        assert_eq!(generative, vec![&BACKGROUND_GRADIENT_WAVE]);
    }
}
