use crate::backend::{self, BusEvent, MessageKind, PipelineState, StateChange};
use crate::{Error, Runtime, StageSpec};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::time::Duration;

/// [`backend::Backend`] on top of GStreamer.
#[derive(Debug, Clone, Copy)]
pub struct GstBackend<'rt> {
    _runtime: &'rt Runtime,
}

impl<'rt> GstBackend<'rt> {
    pub fn new(runtime: &'rt Runtime) -> Self {
        GstBackend { _runtime: runtime }
    }
}

impl backend::Backend for GstBackend<'_> {
    type Stage = gst::Element;
    type Container = GstContainer;

    fn make_stage(&self, spec: &StageSpec) -> Result<gst::Element, Error> {
        Ok(gst::ElementFactory::make(&spec.factory)
            .name(spec.name.as_str())
            .build()?)
    }

    fn new_container(&self, name: &str) -> GstContainer {
        GstContainer {
            pipeline: gst::Pipeline::builder().name(name).build(),
        }
    }
}

pub struct GstContainer {
    pipeline: gst::Pipeline,
}

impl GstContainer {
    fn element(&self, name: &str) -> Result<gst::Element, Error> {
        self.pipeline
            .by_name(name)
            .ok_or_else(|| Error::UnknownStage(name.to_owned()))
    }
}

impl Drop for GstContainer {
    fn drop(&mut self) {
        // elements must not be disposed outside the null state
        if self.pipeline.current_state() != gst::State::Null
            && self.pipeline.set_state(gst::State::Null).is_err()
        {
            log::warn!("failed to stop pipeline {} on release", self.pipeline.name());
        }
    }
}

impl backend::Container for GstContainer {
    type Stage = gst::Element;
    type Bus = GstBus;

    fn attach(&mut self, stages: Vec<gst::Element>) -> Result<(), Error> {
        self.pipeline.add_many(stages.iter())?;
        Ok(())
    }

    fn link(&self, upstream: &str, downstream: &str) -> Result<(), Error> {
        let src = self.element(upstream)?;
        let dst = self.element(downstream)?;
        src.link(&dst).map_err(|_| Error::Link {
            upstream: upstream.to_owned(),
            downstream: downstream.to_owned(),
        })
    }

    fn set_property(&self, stage: &str, key: &str, value: &str) -> Result<(), Error> {
        let element = self.element(stage)?;
        let pspec = element
            .find_property(key)
            .filter(|pspec| {
                let flags = pspec.flags();
                flags.contains(glib::ParamFlags::WRITABLE)
                    && !flags.contains(glib::ParamFlags::CONSTRUCT_ONLY)
            })
            .ok_or_else(|| Error::Property {
                stage: stage.to_owned(),
                key: key.to_owned(),
            })?;
        let invalid = || Error::PropertyValue {
            stage: stage.to_owned(),
            key: key.to_owned(),
            value: value.to_owned(),
        };
        // enum properties accept either the nick or the numeric value
        let parsed = glib::Value::deserialize(value, pspec.value_type()).map_err(|_| invalid())?;
        // out-of-range values fail validation here instead of panicking
        element
            .try_set_property_from_value(key, &parsed)
            .map_err(|_| invalid())
    }

    fn set_state(&self, target: PipelineState) -> Result<StateChange, Error> {
        let state = match target {
            PipelineState::Null => gst::State::Null,
            PipelineState::Ready => gst::State::Ready,
            PipelineState::Paused => gst::State::Paused,
            PipelineState::Playing => gst::State::Playing,
        };
        match self.pipeline.set_state(state) {
            Ok(gst::StateChangeSuccess::Success) => Ok(StateChange::Success),
            Ok(gst::StateChangeSuccess::Async) => Ok(StateChange::Async),
            Ok(gst::StateChangeSuccess::NoPreroll) => Ok(StateChange::NoPreroll),
            Err(_) => Err(Error::StateChange(target)),
        }
    }

    fn bus(&self) -> Option<GstBus> {
        self.pipeline.bus().map(GstBus)
    }
}

pub struct GstBus(gst::Bus);

impl backend::Bus for GstBus {
    type Message = GstMessage;

    fn pop_filtered(&self, timeout: Option<Duration>, kinds: &[MessageKind]) -> Option<GstMessage> {
        let types: Vec<gst::MessageType> = kinds
            .iter()
            .map(|kind| match kind {
                MessageKind::Error => gst::MessageType::Error,
                MessageKind::Eos => gst::MessageType::Eos,
                MessageKind::StateChanged => gst::MessageType::StateChanged,
            })
            .collect();
        let timeout = timeout.map(clock_time);
        self.0.timed_pop_filtered(timeout, &types).map(GstMessage)
    }
}

pub struct GstMessage(gst::Message);

impl backend::BusMessage for GstMessage {
    fn view(&self) -> BusEvent {
        let source = || {
            self.0
                .src()
                .map(|src| src.name().to_string())
                .unwrap_or_else(|| "unknown".to_owned())
        };

        match self.0.view() {
            gst::MessageView::Error(err) => BusEvent::Error {
                source: source(),
                message: err.error().message().to_owned(),
                debug: err.debug().map(|debug| debug.to_string()),
            },
            gst::MessageView::Eos(_) => BusEvent::Eos,
            gst::MessageView::StateChanged(change) => {
                match (pipeline_state(change.old()), pipeline_state(change.current())) {
                    (Some(old), Some(current)) => BusEvent::StateChanged {
                        source: source(),
                        old,
                        current,
                    },
                    _ => BusEvent::Other("state-changed".to_owned()),
                }
            }
            _ => BusEvent::Other(format!("{:?}", self.0.type_())),
        }
    }
}

fn pipeline_state(state: gst::State) -> Option<PipelineState> {
    match state {
        gst::State::Null => Some(PipelineState::Null),
        gst::State::Ready => Some(PipelineState::Ready),
        gst::State::Paused => Some(PipelineState::Paused),
        gst::State::Playing => Some(PipelineState::Playing),
        _ => None,
    }
}

/// Converts a timeout, saturating below `ClockTime::NONE` which would mean "forever".
fn clock_time(timeout: Duration) -> gst::ClockTime {
    let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
    gst::ClockTime::from_nseconds(nanos.min(u64::MAX - 1))
}
