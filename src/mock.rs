//! Recording backend for driver tests.

use crate::backend::{
    Backend, Bus, BusEvent, BusMessage, Container, MessageKind, PipelineState, StateChange,
};
use crate::{Error, StageKind, StageSpec};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::sync::{Mutex, Once};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// One backend operation or handle release, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    MakeStage(String),
    NewContainer(String),
    Attach(Vec<String>),
    Link(String, String),
    SetProperty(String, String, String),
    SetState(PipelineState),
    AcquireBus,
    ReleaseMessage,
    ReleaseBus,
    ReleaseContainer,
    ReleaseStage(String),
}

#[derive(Debug, Clone, Default)]
struct Script {
    missing: HashSet<StageKind>,
    failing_links: HashSet<(String, String)>,
    rejected: HashSet<PipelineState>,
    missing_properties: HashSet<String>,
    ignore_filter: bool,
    no_bus: bool,
}

#[derive(Debug, Default)]
struct Shared {
    journal: RefCell<Vec<Call>>,
    queue: RefCell<VecDeque<BusEvent>>,
}

impl Shared {
    fn record(&self, call: Call) {
        self.journal.borrow_mut().push(call);
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    script: Script,
    shared: Rc<Shared>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn missing(mut self, kind: StageKind) -> Self {
        self.script.missing.insert(kind);
        self
    }

    pub(crate) fn failing_link(mut self, upstream: &str, downstream: &str) -> Self {
        self.script
            .failing_links
            .insert((upstream.to_owned(), downstream.to_owned()));
        self
    }

    pub(crate) fn rejecting(mut self, state: PipelineState) -> Self {
        self.script.rejected.insert(state);
        self
    }

    pub(crate) fn without_property(mut self, key: &str) -> Self {
        self.script.missing_properties.insert(key.to_owned());
        self
    }

    /// Hands out every queued message regardless of the requested kinds.
    pub(crate) fn ignoring_filter(mut self) -> Self {
        self.script.ignore_filter = true;
        self
    }

    pub(crate) fn without_bus(mut self) -> Self {
        self.script.no_bus = true;
        self
    }

    /// Queues a message for the bus.
    pub(crate) fn post(&self, event: BusEvent) {
        self.shared.queue.borrow_mut().push_back(event);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.shared.journal.borrow().clone()
    }
}

impl Backend for MockBackend {
    type Stage = MockStage;
    type Container = MockContainer;

    fn make_stage(&self, spec: &StageSpec) -> Result<MockStage, Error> {
        self.shared.record(Call::MakeStage(spec.name.clone()));
        if self.script.missing.contains(&spec.kind) {
            return Err(glib::bool_error!("no element factory `{}`", spec.factory).into());
        }
        Ok(MockStage {
            name: spec.name.clone(),
            shared: Rc::clone(&self.shared),
        })
    }

    fn new_container(&self, name: &str) -> MockContainer {
        self.shared.record(Call::NewContainer(name.to_owned()));
        MockContainer {
            stages: Vec::new(),
            script: self.script.clone(),
            shared: Rc::clone(&self.shared),
        }
    }
}

pub struct MockStage {
    name: String,
    shared: Rc<Shared>,
}

impl Drop for MockStage {
    fn drop(&mut self) {
        self.shared.record(Call::ReleaseStage(self.name.clone()));
    }
}

pub struct MockContainer {
    stages: Vec<MockStage>,
    script: Script,
    shared: Rc<Shared>,
}

impl MockContainer {
    fn has_stage(&self, name: &str) -> bool {
        self.stages.iter().any(|stage| stage.name == name)
    }
}

impl Drop for MockContainer {
    fn drop(&mut self) {
        // attached stages are released right after, as fields
        self.shared.record(Call::ReleaseContainer);
    }
}

impl Container for MockContainer {
    type Stage = MockStage;
    type Bus = MockBus;

    fn attach(&mut self, stages: Vec<MockStage>) -> Result<(), Error> {
        self.shared.record(Call::Attach(
            stages.iter().map(|stage| stage.name.clone()).collect(),
        ));
        self.stages.extend(stages);
        Ok(())
    }

    fn link(&self, upstream: &str, downstream: &str) -> Result<(), Error> {
        self.shared
            .record(Call::Link(upstream.to_owned(), downstream.to_owned()));
        for name in [upstream, downstream] {
            if !self.has_stage(name) {
                return Err(Error::UnknownStage(name.to_owned()));
            }
        }
        if self
            .script
            .failing_links
            .contains(&(upstream.to_owned(), downstream.to_owned()))
        {
            return Err(Error::Link {
                upstream: upstream.to_owned(),
                downstream: downstream.to_owned(),
            });
        }
        Ok(())
    }

    fn set_property(&self, stage: &str, key: &str, value: &str) -> Result<(), Error> {
        self.shared.record(Call::SetProperty(
            stage.to_owned(),
            key.to_owned(),
            value.to_owned(),
        ));
        if !self.has_stage(stage) {
            return Err(Error::UnknownStage(stage.to_owned()));
        }
        if self.script.missing_properties.contains(key) {
            return Err(Error::Property {
                stage: stage.to_owned(),
                key: key.to_owned(),
            });
        }
        Ok(())
    }

    fn set_state(&self, target: PipelineState) -> Result<StateChange, Error> {
        self.shared.record(Call::SetState(target));
        if self.script.rejected.contains(&target) {
            return Err(Error::StateChange(target));
        }
        Ok(StateChange::Async)
    }

    fn bus(&self) -> Option<MockBus> {
        self.shared.record(Call::AcquireBus);
        if self.script.no_bus {
            return None;
        }
        Some(MockBus {
            ignore_filter: self.script.ignore_filter,
            shared: Rc::clone(&self.shared),
        })
    }
}

pub struct MockBus {
    ignore_filter: bool,
    shared: Rc<Shared>,
}

impl Drop for MockBus {
    fn drop(&mut self) {
        self.shared.record(Call::ReleaseBus);
    }
}

impl Bus for MockBus {
    type Message = MockMessage;

    fn pop_filtered(
        &self,
        timeout: Option<Duration>,
        kinds: &[MessageKind],
    ) -> Option<MockMessage> {
        loop {
            let next = self.shared.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                // nothing will ever be posted; behave like an expired timeout
                std::thread::sleep(timeout.unwrap_or_default());
                return None;
            };
            let wanted = match &event {
                BusEvent::Error { .. } => kinds.contains(&MessageKind::Error),
                BusEvent::Eos => kinds.contains(&MessageKind::Eos),
                BusEvent::StateChanged { .. } => kinds.contains(&MessageKind::StateChanged),
                BusEvent::Other(_) => false,
            };
            if wanted || self.ignore_filter {
                return Some(MockMessage {
                    event,
                    shared: Rc::clone(&self.shared),
                });
            }
        }
    }
}

pub struct MockMessage {
    event: BusEvent,
    shared: Rc<Shared>,
}

impl Drop for MockMessage {
    fn drop(&mut self) {
        self.shared.record(Call::ReleaseMessage);
    }
}

impl BusMessage for MockMessage {
    fn view(&self) -> BusEvent {
        self.event.clone()
    }
}

/// Log sink keeping each record with the thread that emitted it, so tests
/// running in parallel only see their own lines.
struct CaptureLogger;

static CAPTURED: Mutex<Vec<(ThreadId, String)>> = Mutex::new(Vec::new());
static CAPTURE: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((thread::current().id(), record.args().to_string()));
    }

    fn flush(&self) {}
}

pub(crate) fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&CAPTURE).is_ok() {
            log::set_max_level(log::LevelFilter::Info);
        }
    });
}

/// Lines logged so far by the calling thread.
pub(crate) fn logged_here() -> Vec<String> {
    let me = thread::current().id();
    CAPTURED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .filter(|(id, _)| *id == me)
        .map(|(_, line)| line.clone())
        .collect()
}
