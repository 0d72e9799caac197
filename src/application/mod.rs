//! Application layer - the render-job pipeline services.

pub mod compiler;
pub mod dispatcher;
pub mod relay;
pub mod scratch;

pub use compiler::{compile_parameters, ValidationError};
pub use dispatcher::{DispatchError, JobDispatcher, JobHandle};
pub use relay::ProgressRelay;
pub use scratch::{ScratchDir, ScratchError};
