//! Filter-graph construction for the ffmpeg engine.
//!
//! The animation catalogs name the effects; this module turns them into
//! labeled filter chains. The output frame is always 1920x1080 at 60 fps,
//! with the cover composited left of center and lyrics on the right.

use crate::domain::animations;
use crate::domain::jobs::{JobParameters, StyleRole};
use crate::domain::lyrics::TimedLine;
use std::fmt;
use std::path::Path;

pub const WIDTH: u32 = 1920;
pub const HEIGHT: u32 = 1080;
pub const FPS: u32 = 60;

const FADE_DURATION: f64 = 0.5;
const SLIDE_DISTANCE: u32 = 20;
const SCROLL_TRANSITION: f64 = 0.35;
const SCROLL_WINDOW: usize = 7;

#[derive(Debug)]
pub enum FilterError {
    UnknownAnimation { kind: &'static str, name: String },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::UnknownAnimation { kind, name } => {
                write!(f, "unknown {} animation {:?}", kind, name)
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// A lyric line with its display interval resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricClip {
    pub start: f64,
    pub end: f64,
    pub primary: String,
    pub secondary: String,
}

/// Resolve each line's end time: the next line's start, or the end of the
/// track for the last one.
pub fn lyrics_with_ends(lines: &[TimedLine], track_duration: f64) -> Vec<LyricClip> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| LyricClip {
            start: line.start,
            end: lines
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(track_duration),
            primary: line.primary.clone(),
            secondary: line.secondary.clone(),
        })
        .collect()
}

/// Restrict the clips rendered for a preview frame. Drawing every drawtext
/// for a single frame is wasted work, so only the lines that can appear at
/// the preview timestamp are kept.
pub fn visible_window(clips: &[LyricClip], text_anim: &str, preview_at: f64) -> Vec<LyricClip> {
    let Some(current) = clips
        .iter()
        .position(|c| c.start <= preview_at && preview_at < c.end)
    else {
        return Vec::new();
    };

    match text_anim {
        animations::TEXT_SLIDE_FADE => vec![clips[current].clone()],
        animations::TEXT_SCROLL_LIST => {
            let from = current.saturating_sub(SCROLL_WINDOW);
            let to = (current + SCROLL_WINDOW + 1).min(clips.len());
            clips[from..to].to_vec()
        }
        _ => clips.to_vec(),
    }
}

/// Hex "#RRGGBB" to the engine's "0xRRGGBB" form.
pub fn to_engine_color(hex: &str) -> String {
    format!("0x{}", hex.trim_start_matches('#'))
}

/// Neutralize characters drawtext treats specially.
fn clean_text(text: &str) -> String {
    text.replace('\'', "\u{2019}")
        .replace(':', "\u{FF1A}")
        .replace('%', "\u{FF05}")
        .replace(',', "\\,")
}

fn escape_font_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace(':', "\\:")
}

fn total_frames(duration: f64) -> i64 {
    if duration > 0.0 {
        (duration * FPS as f64) as i64
    } else {
        1
    }
}

fn background_chain(
    name: &str,
    duration: f64,
    input: &str,
    out: &str,
) -> Result<String, FilterError> {
    match name {
        animations::BACKGROUND_STATIC_BLUR => Ok(format!(
            "[{input}]scale={w}:-1,crop={w}:{h},boxblur=20:5,\
             zoompan=z=1:d={frames}:s={w}x{h}:fps={fps}[{out}]",
            w = WIDTH,
            h = HEIGHT,
            frames = total_frames(duration),
            fps = FPS,
        )),
        animations::BACKGROUND_GRADIENT_WAVE => {
            // Generated at quarter resolution, then upscaled with spline
            // interpolation; the geq expressions are too slow at full size.
            let down = 4;
            let (low_w, low_h) = (WIDTH / down, HEIGHT / down);
            let d = down as f64;
            let r = format!(
                "'128 + 64*sin(X/{} + T*2) + 64*cos(Y/{} + T*2.5)'",
                150.0 / d,
                150.0 / d
            );
            let g = format!(
                "'128 + 64*sin(X/{} + T*1.5) + 64*cos(Y/{} + T*2)'",
                180.0 / d,
                120.0 / d
            );
            let b = format!(
                "'128 + 64*sin(X/{} + T*2.5) + 64*cos(Y/{} + T*1.5)'",
                120.0 / d,
                180.0 / d
            );
            Ok(format!(
                "nullsrc=s={low_w}x{low_h}:r={fps}:d={duration},format=yuv420p,\
                 geq=r={r}:g={g}:b={b},scale=w={w}:h={h}:flags=spline[{out}]",
                fps = FPS,
                w = WIDTH,
                h = HEIGHT,
            ))
        }
        animations::BACKGROUND_WAVE_BLUR => {
            let down = 2;
            let (low_w, low_h) = ((WIDTH / down).max(1), (HEIGHT / down).max(1));
            let d = down as f64;
            let wave_strength = 3.0 / d;
            let wave_density = 50.0 / d;
            let wave_speed = 2.0;
            let geq = format!(
                "p(X,Y+{wave_strength}*sin(X/{wave_density}+T*{wave_speed}))"
            );
            Ok(format!(
                "[{input}]scale={low_w}:-1,crop={low_w}:{low_h},\
                 zoompan=z=1:d={frames}:s={low_w}x{low_h}:fps={fps},\
                 geq='{geq}',boxblur={luma}:{chroma},scale={w}:{h}:flags=spline[{out}]",
                frames = total_frames(duration),
                fps = FPS,
                luma = 20.0 / d,
                chroma = 5.0 / d,
                w = WIDTH,
                h = HEIGHT,
            ))
        }
        _ => Err(FilterError::UnknownAnimation {
            kind: "background",
            name: name.to_string(),
        }),
    }
}

fn cover_chain(name: &str, duration: f64, input: &str, out: &str) -> Result<String, FilterError> {
    match name {
        animations::COVER_STATIC_REFLECTION => {
            let (img_w, img_h) = (600u32, 600u32);
            let refl_h = (img_h as f64 * 0.4) as u32;
            let canvas_h = img_h + refl_h;
            let frames = if duration > 1.0 {
                (duration * FPS as f64) as i64
            } else {
                1
            };
            Ok([
                format!("[{input}]scale={img_w}:{img_h},setsar=1,split=2[cov_main][cov_refl_src]"),
                format!(
                    "color=c=black@0.0:s={img_w}x{canvas_h}:r={fps}:d={duration}[cov_canvas]",
                    fps = FPS
                ),
                format!(
                    "[cov_refl_src]vflip,crop=w={img_w}:h={refl_h}:x=0:y=0,format=yuva444p,\
                     geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='128*(1-Y/H)',boxblur=3:1[cov_refl]"
                ),
                String::from("[cov_canvas][cov_main]overlay=x=0:y=0[cov_tmp]"),
                format!("[cov_tmp][cov_refl]overlay=x=0:y={img_h}[cov_with_refl]"),
                format!(
                    "[cov_with_refl]zoompan=z=1:d={frames}:s={img_w}x{canvas_h}:fps={fps}[{out}]",
                    fps = FPS
                ),
            ]
            .join(";"))
        }
        animations::COVER_VINYL_SPIN => {
            let record_size = 640u32;
            let label_size = 400u32;
            // Supersample for the circular mask's edge quality.
            let ss = 8u32;
            let (w, h) = (record_size * ss, record_size * ss);
            let radius = (w / 2) as f64;
            let label_radius2 = ((label_size / 2 * ss) as f64).powi(2);

            let d2 = format!("(pow((X-{cx}),2)+pow((Y-{cy}),2))", cx = w / 2, cy = h / 2);
            let dist = format!("sqrt({d2})");
            let smooth_width = ss as f64 * 1.5;
            let alpha = format!("'255 * clip(({radius} - {dist}) / {smooth_width}, 0, 1)'");

            let highlight_d2 = format!(
                "(pow(X-{hx},2)+pow(Y-{hy},2))",
                hx = (w as f64 * 0.3) as i64,
                hy = (h as f64 * 0.3) as i64
            );
            let highlight_radius = w as f64 * 0.7;
            let highlight =
                format!("60*pow(max(0,1-sqrt({highlight_d2})/{highlight_radius}),3)");

            let lead_outer = radius * 0.99;
            let lead_inner = radius * 0.93;
            let groove = format!("15 + 10*sin({dist}*3.5*{ss})");
            let lead_in = format!(
                "if(gte({dist},{lead_inner})*lte({dist},{lead_outer}), \
                 30 + 30*st(0,sin({dist}*{freq}-PI/2)), 0)",
                freq = 45 * ss
            );

            let color_for = |channel: &str| {
                format!(
                    "if(lt({d2},{label_radius2}),{channel}(X,Y),\
                     min(255, {groove} + {highlight} + {lead_in}))"
                )
            };

            // One full turn every ten seconds.
            let rotation_per_sec = 2.0 * std::f64::consts::PI / 10.0;

            Ok([
                format!("[{input}]split[rec_label_src][rec_canvas_src]"),
                format!(
                    "[rec_label_src]scale={label_size}:{label_size}:flags=lanczos,setsar=1[rec_label]"
                ),
                format!(
                    "[rec_canvas_src]scale={record_size}:{record_size},format=yuva444p,\
                     lutrgb=r=0:g=0:b=0:a=255[rec_black]"
                ),
                String::from(
                    "[rec_black][rec_label]overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2[rec_static]",
                ),
                format!(
                    "[rec_static]scale=w={w}:h={h},setsar=1,format=yuva444p,\
                     geq=r='{r}':g='{g}':b='{b}':a={alpha},\
                     scale=w={record_size}:h={record_size}:flags=lanczos,\
                     zoompan=z=1:d={frames}:s={record_size}x{record_size}:fps={fps},\
                     rotate=a=t*{rotation_per_sec}:c=none:ow={record_size}:oh={record_size}[{out}]",
                    r = color_for("r"),
                    g = color_for("g"),
                    b = color_for("b"),
                    frames = total_frames(duration).max(1),
                    fps = FPS,
                ),
            ]
            .join(";"))
        }
        _ => Err(FilterError::UnknownAnimation {
            kind: "cover",
            name: name.to_string(),
        }),
    }
}

/// Styling inputs shared by the text animations.
struct TextLayout {
    primary_font: String,
    primary_size: u32,
    primary_color: String,
    secondary_font: String,
    secondary_size: u32,
    secondary_color: String,
    outline_color: String,
    outline_width: u32,
}

impl TextLayout {
    fn from_params(params: &JobParameters) -> Self {
        let primary = params.style(StyleRole::Primary);
        let secondary = params.style(StyleRole::Secondary);
        Self {
            primary_font: escape_font_path(&primary.font_file),
            primary_size: primary.size,
            primary_color: to_engine_color(&primary.color),
            secondary_font: escape_font_path(&secondary.font_file),
            secondary_size: secondary.size,
            secondary_color: to_engine_color(&secondary.color),
            outline_color: to_engine_color(&params.outline_color),
            outline_width: params.outline_width,
        }
    }
}

/// Golden-ratio x position: text centered in the area right of the cover.
fn lyric_x_pos() -> String {
    String::from("'(W/2.618) + (W*1.618/2.618 - text_w)/2'")
}

fn slide_fade_text(clips: &[LyricClip], layout: &TextLayout) -> String {
    let mut filters = Vec::new();
    for clip in clips {
        let enable = format!("'between(t,{},{})'", clip.start, clip.end);
        let alpha = format!(
            "'if(lt(t,{s}+{f}),(t-{s})/{f},if(gt(t,{e}-{f}),({e}-t)/{f},1))'",
            s = clip.start,
            e = clip.end,
            f = FADE_DURATION
        );
        let y_slide = format!(
            "if(lt(t,{s}+{f}),({f}-(t-{s}))/{f}*{d},0)",
            s = clip.start,
            f = FADE_DURATION,
            d = SLIDE_DISTANCE
        );

        if !clip.primary.is_empty() {
            filters.push(format!(
                "drawtext=fontfile='{font}':text='{text}':fontsize={size}:\
                 fontcolor={color}:bordercolor={outline}:borderw={bw}:\
                 x={x}:y='H/2 - ({size}*1.5) - ({y_slide})':alpha={alpha}:enable={enable}",
                font = layout.primary_font,
                text = clean_text(&clip.primary),
                size = layout.primary_size,
                color = layout.primary_color,
                outline = layout.outline_color,
                bw = layout.outline_width,
                x = lyric_x_pos(),
            ));
        }
        if !clip.secondary.is_empty() {
            filters.push(format!(
                "drawtext=fontfile='{font}':text='{text}':fontsize={size}:\
                 fontcolor={color}:bordercolor={outline}:borderw={bw}:\
                 x={x}:y='H/2 + ({size}*0.5) - ({y_slide})':alpha={alpha}:enable={enable}",
                font = layout.secondary_font,
                text = clean_text(&clip.secondary),
                size = layout.secondary_size,
                color = layout.secondary_color,
                outline = layout.outline_color,
                bw = layout.outline_width,
                x = lyric_x_pos(),
            ));
        }
    }
    filters.join(",")
}

fn scroll_list_text(clips: &[LyricClip], layout: &TextLayout) -> String {
    if clips.is_empty() {
        return String::new();
    }

    let line_height = (layout.primary_size + layout.secondary_size + 45) as f64;
    let fade_distance = (HEIGHT as f64 * 6.0 / 8.0 / 2.0) / line_height * 1.5;
    let highlight_size = (layout.primary_size as f64 * 1.1) as u32;

    // Nested-if expression selecting the highlighted line index at time t.
    let mut highlight_idx = format!("{}", clips.len() - 1);
    for j in (0..clips.len() - 1).rev() {
        highlight_idx = format!("if(lt(t,{}),{},{})", clips[j + 1].start, j, highlight_idx);
    }

    let target_y = |j: isize| -> f64 {
        HEIGHT as f64 / 2.0 - line_height / 2.0 - (j.max(0) as f64) * line_height
    };

    // Scroll offset: ease between line positions over each transition.
    let mut scroll_y = format!("{}", target_y(0));
    for (j, clip) in clips.iter().enumerate() {
        let progress = format!(
            "clip((t - {s}) / {t}, 0, 1)",
            s = clip.start,
            t = SCROLL_TRANSITION
        );
        let smoothed = format!("(1-cos({progress}*3.14159265))/2");
        let prev_y = target_y(j as isize - 1);
        let this_y = target_y(j as isize);
        let transition = format!("({prev_y} + ({this_y} - {prev_y}) * {smoothed})");
        scroll_y = format!(
            "if(gte(t,{s}),if(lt(t,{s}+{t}),{transition},{this_y}),{scroll_y})",
            s = clip.start,
            t = SCROLL_TRANSITION
        );
    }

    let mut filters = Vec::new();
    for (i, clip) in clips.iter().enumerate() {
        let y_primary = format!("({scroll_y}) + ({i} * {line_height})");
        let y_secondary = format!(
            "({scroll_y}) + {} + ({i} * {line_height})",
            layout.primary_size
        );
        let is_highlighted = format!("eq({i},({highlight_idx}))");
        let alpha_fade = format!("clip(1-(abs({i}-({highlight_idx})))/{fade_distance},0,1)");

        if !clip.primary.is_empty() {
            let text = clean_text(&clip.primary);
            filters.push(format!(
                "drawtext=fontfile='{font}':text='{text}':fontsize={highlight_size}:\
                 fontcolor={color}:bordercolor={outline}:borderw=2:x={x}:\
                 y='{y_primary}':alpha='{alpha_fade}':enable='{is_highlighted}'",
                font = layout.primary_font,
                color = layout.primary_color,
                outline = layout.outline_color,
                x = lyric_x_pos(),
            ));
            filters.push(format!(
                "drawtext=fontfile='{font}':text='{text}':fontsize={size}:\
                 fontcolor={color}:bordercolor={outline}:borderw=2:x={x}:\
                 y='{y_primary}':alpha='(0.7 * {alpha_fade})':enable='not({is_highlighted})'",
                font = layout.primary_font,
                size = layout.primary_size,
                color = layout.secondary_color,
                outline = layout.outline_color,
                x = lyric_x_pos(),
            ));
        }
        if !clip.secondary.is_empty() {
            filters.push(format!(
                "drawtext=fontfile='{font}':text='{text}':fontsize={size}:\
                 fontcolor={color}:bordercolor={outline}:borderw=1:x={x}:\
                 y='{y_secondary}':alpha='(if({is_highlighted},0.9,0.7) * {alpha_fade})'",
                font = layout.secondary_font,
                text = clean_text(&clip.secondary),
                size = layout.secondary_size,
                color = layout.secondary_color,
                outline = layout.outline_color,
                x = lyric_x_pos(),
            ));
        }
    }
    filters.join(",")
}

fn text_chain(
    name: &str,
    clips: &[LyricClip],
    layout: &TextLayout,
) -> Result<String, FilterError> {
    match name {
        animations::TEXT_SLIDE_FADE => Ok(slide_fade_text(clips, layout)),
        animations::TEXT_SCROLL_LIST => Ok(scroll_list_text(clips, layout)),
        _ => Err(FilterError::UnknownAnimation {
            kind: "text",
            name: name.to_string(),
        }),
    }
}

/// Assemble the full filter graph. `preview_at` switches the graph into
/// single-frame mode: only the lyric window around the timestamp is drawn
/// and the matching frame is selected at the end of the chain.
pub fn build_filter_graph(
    params: &JobParameters,
    lines: &[TimedLine],
    track_duration: f64,
    preview_at: Option<f64>,
) -> Result<String, FilterError> {
    let clips = lyrics_with_ends(lines, track_duration);
    let visible = match preview_at {
        Some(t) => visible_window(&clips, &params.text_anim, t),
        None => clips,
    };

    let mut chains = Vec::new();

    if animations::is_generative_background(&params.background_anim) {
        chains.push(background_chain(
            &params.background_anim,
            track_duration,
            "",
            "base_bg",
        )?);
    } else {
        chains.push(background_chain(
            &params.background_anim,
            track_duration,
            "0:v",
            "base_bg",
        )?);
    }

    chains.push(cover_chain(
        &params.cover_anim,
        track_duration,
        "0:v",
        "fg_cover",
    )?);
    chains.push(String::from(
        "[base_bg][fg_cover]overlay=x='(W/2.618-w)/2':y='(H-h)/2'[final_bg]",
    ));

    let text = text_chain(&params.text_anim, &visible, &TextLayout::from_params(params))?;

    let mut tail = Vec::new();
    if !text.is_empty() {
        tail.push(text);
    }
    tail.push(String::from("format=yuv420p"));
    if let Some(t) = preview_at {
        let frame = (t * FPS as f64) as i64;
        tail.push(format!("select='eq(n\\,{frame})'"));
    }
    chains.push(format!("[final_bg]{}[v]", tail.join(",")));

    Ok(chains.join(";"))
}
