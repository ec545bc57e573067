//! The narrow slice of a media framework the driver needs.
//!
//! Every handle releases its framework resources on `Drop`; the driver
//! controls release order by dropping handles explicitly.

use crate::{Error, StageSpec};
use std::fmt;
use std::time::Duration;

/// Playback states of a pipeline container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Null => "null",
            PipelineState::Ready => "ready",
            PipelineState::Paused => "paused",
            PipelineState::Playing => "playing",
        })
    }
}

/// Accepted outcome of a state change request. Rejection is an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Success,
    /// The change continues on the framework's own threads.
    Async,
    /// Accepted, but a live source cannot preroll.
    NoPreroll,
}

/// Message types the bus can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Error,
    Eos,
    StateChanged,
}

/// Owned contents of a bus message, detached from the message handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    Eos,
    StateChanged {
        source: String,
        old: PipelineState,
        current: PipelineState,
    },
    /// Any message type the driver never asks for, by type name.
    Other(String),
}

impl BusEvent {
    pub fn kind_name(&self) -> &str {
        match self {
            BusEvent::Error { .. } => "error",
            BusEvent::Eos => "eos",
            BusEvent::StateChanged { .. } => "state-changed",
            BusEvent::Other(name) => name,
        }
    }
}

pub trait Backend {
    type Stage;
    type Container: Container<Stage = Self::Stage>;

    /// Instantiates one stage from its factory name.
    fn make_stage(&self, spec: &StageSpec) -> Result<Self::Stage, Error>;

    /// Creates an empty container.
    fn new_container(&self, name: &str) -> Self::Container;
}

/// A pipeline container. Stages are addressed by name once attached.
pub trait Container {
    type Stage;
    type Bus: Bus;

    /// Moves the stages into the container, which then owns their lifetime.
    fn attach(&mut self, stages: Vec<Self::Stage>) -> Result<(), Error>;

    fn link(&self, upstream: &str, downstream: &str) -> Result<(), Error>;

    /// Sets a property from its string form, parsed against the property type.
    fn set_property(&self, stage: &str, key: &str, value: &str) -> Result<(), Error>;

    fn set_state(&self, target: PipelineState) -> Result<StateChange, Error>;

    fn bus(&self) -> Option<Self::Bus>;
}

pub trait Bus {
    type Message: BusMessage;

    /// Pops the first message whose kind is in `kinds`, dropping the others.
    /// `None` as timeout blocks until such a message arrives.
    fn pop_filtered(&self, timeout: Option<Duration>, kinds: &[MessageKind])
        -> Option<Self::Message>;
}

pub trait BusMessage {
    fn view(&self) -> BusEvent;
}
