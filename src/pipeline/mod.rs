//! Pipeline composition and execution for SIP analyses.

mod config;
mod runner;

pub use config::{InputConfig, OutputConfig, SipConfig};
pub use runner::{Pipeline, PipelineOutput, PipelineStep};
