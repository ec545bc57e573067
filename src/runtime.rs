use crate::Error;
use gstreamer as gst;

/// Proof that GStreamer has been initialized in this process.
///
/// A [`GstBackend`](crate::GstBackend) can only be built from a reference to
/// one, so no element or pipeline is ever created before `gst::init`.
#[derive(Debug, Clone, Copy)]
pub struct Runtime {
    _private: (),
}

impl Runtime {
    /// Initializes GStreamer. Repeated calls are cheap and return a new token.
    pub fn init() -> Result<Self, Error> {
        gst::init()?;
        log::debug!("gstreamer {} initialized", gst::version_string());
        Ok(Runtime { _private: () })
    }
}
