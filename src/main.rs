//! Karajan CLI - headless front-end for the render pipeline.
//!
//! Loads a project document, dispatches a render or preview job, and prints
//! relayed status and progress until the terminal outcome arrives.

use dotenv::dotenv;
use karajan::adapters::ffmpeg::{probe_duration, FfmpegEngine, RealProbeRunner};
use karajan::application::{JobDispatcher, JobHandle, ScratchDir};
use karajan::config::Config;
use karajan::domain::jobs::JobEvent;
use karajan::domain::lyrics::parse_bilingual_lrc;
use karajan::domain::session::SessionState;
use karajan::project;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let code = run(&args).await;
    std::process::exit(code);
}

fn usage(program: &str) -> i32 {
    eprintln!("Usage:");
    eprintln!("  {} render <project.kproj> [output.mp4]", program);
    eprintln!("  {} preview <project.kproj> <seconds> <frame.png>", program);
    2
}

async fn run(args: &[String]) -> i32 {
    let program = args.first().map(String::as_str).unwrap_or("karajan");
    let (Some(mode), Some(project_path)) = (args.get(1), args.get(2)) else {
        return usage(program);
    };

    let config = Config::load();
    let mut state = SessionState::from_config(&config);

    if let Err(e) = project::load_project(Path::new(project_path), &mut state) {
        eprintln!("{}", e);
        return 1;
    }
    println!("loaded project {}", project_path);

    refresh_track_info(&mut state).await;

    let scratch = Arc::new(ScratchDir::new());
    let dispatcher = JobDispatcher::new(Arc::new(FfmpegEngine::new()), scratch.clone());

    let code = match mode.as_str() {
        "render" => {
            let output = args.get(3).cloned().unwrap_or_else(|| {
                project::default_filename(&state.lyric_metadata, "lyric_video", "mp4")
            });
            match dispatcher.start_render(&state, PathBuf::from(&output)) {
                Ok(handle) => {
                    persist_settings(&state);
                    drive(handle, None).await
                }
                Err(e) => {
                    eprintln!("{}", e);
                    1
                }
            }
        }
        "preview" => {
            let (Some(seconds), Some(frame_path)) = (args.get(3), args.get(4)) else {
                return usage(program);
            };
            let Ok(timestamp) = seconds.parse::<f64>() else {
                eprintln!("invalid timestamp {:?}", seconds);
                return 2;
            };
            match dispatcher.start_preview(&state, timestamp).await {
                Ok(handle) => {
                    persist_settings(&state);
                    drive(handle, Some(Path::new(frame_path))).await
                }
                Err(e) => {
                    eprintln!("{}", e);
                    1
                }
            }
        }
        _ => usage(program),
    };

    scratch.purge_all().await;
    persist_settings(&state);
    code
}

/// Refresh the lyric metadata and probed duration for the loaded assets,
/// the way a front-end does when files are picked.
async fn refresh_track_info(state: &mut SessionState) {
    if !state.assets.lyrics.is_empty() {
        match std::fs::read_to_string(&state.assets.lyrics) {
            Ok(text) => {
                let (_, metadata) = parse_bilingual_lrc(&text);
                state.lyric_metadata = metadata;
            }
            Err(e) => eprintln!("could not read lyric file: {}", e),
        }
    }
    if !state.assets.audio.is_empty() {
        let (duration, error) = probe_duration(
            &RealProbeRunner,
            &state.engine_path,
            Path::new(&state.assets.audio),
        )
        .await;
        if error.is_empty() {
            println!("track duration: {:.2}s", duration);
            state.audio_duration = duration;
        } else {
            eprintln!("{}", error);
        }
    }
}

/// Settings are written after any job starts and again at shutdown; a
/// failure to persist them never affects the job.
fn persist_settings(state: &SessionState) {
    if let Err(e) = Config::from_state(state).save() {
        tracing::warn!("could not persist settings: {}", e);
    }
}

async fn drive(mut handle: JobHandle, frame_path: Option<&Path>) -> i32 {
    let mut frame_write_failed = false;
    while let Some(event) = handle.next_event().await {
        match event {
            JobEvent::Status(line) => println!("{}", line),
            JobEvent::Progress(percent) => println!("progress: {}%", percent),
            JobEvent::Frame(bytes) => {
                if let Some(path) = frame_path {
                    match std::fs::write(path, &bytes) {
                        Ok(()) => println!("preview frame written to {}", path.display()),
                        Err(e) => {
                            eprintln!("could not write preview frame: {}", e);
                            frame_write_failed = true;
                        }
                    }
                }
            }
            JobEvent::Finished(outcome) => {
                println!("{}", outcome.message());
                return if outcome.is_success() && !frame_write_failed {
                    0
                } else {
                    1
                };
            }
        }
    }
    eprintln!("job ended without reporting an outcome");
    1
}
