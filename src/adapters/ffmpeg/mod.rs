pub mod engine;
pub mod filters;
pub mod probe;

pub use engine::{EngineError, FfmpegEngine};
pub use probe::{probe_duration, resolve_probe_path, ProbeRunner, RealProbeRunner};
