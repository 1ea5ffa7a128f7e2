pub mod action;
pub mod controller;

pub use action::{Action, Phase, PipelineError, PipelineSnapshot, Transition};
pub use controller::Pipeline;
