//! Drives a fixed four-stage GStreamer chain
//! (`videotestsrc ! vertigotv ! videoconvert ! autovideosink` by default)
//! until it reaches end-of-stream or posts an error.

pub mod backend;
mod config;
mod driver;
mod gst_backend;
#[cfg(test)]
mod mock;
mod runtime;

use thiserror::Error;

pub use config::{PipelineConfig, StageKind, StageSpec, WaitConfig};
pub use driver::{CancelToken, Driver, Outcome};
pub use gst_backend::GstBackend;
pub use runtime::Runtime;

/// Exit code reported for every setup failure.
pub const FAILURE_EXIT_CODE: i32 = -1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Glib(#[from] glib::Error),
    #[error("{0}")]
    Bool(#[from] glib::BoolError),
    #[error("Not all elements could be created (missing: {})", .0.join(", "))]
    MissingStages(Vec<String>),
    #[error("Elements {upstream}<>{downstream} could not be linked.")]
    Link {
        upstream: String,
        downstream: String,
    },
    #[error("no stage named `{0}` in the pipeline")]
    UnknownStage(String),
    #[error("stage `{stage}` has no property `{key}`")]
    Property { stage: String, key: String },
    #[error("invalid value `{value}` for property `{key}` of stage `{stage}`")]
    PropertyValue {
        stage: String,
        key: String,
        value: String,
    },
    #[error("Unable to set the pipeline to the {0} state.")]
    StateChange(backend::PipelineState),
    #[error("failed to get the gstreamer bus")]
    Bus,
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        FAILURE_EXIT_CODE
    }
}
