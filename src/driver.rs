use crate::backend::{Backend, Bus, BusEvent, BusMessage, Container, MessageKind, PipelineState};
use crate::{Error, PipelineConfig, WaitConfig};
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag that stops a running [`Driver`] between bus polls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a started pipeline stopped being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    EndOfStream,
    /// An element posted an error while streaming.
    StreamError {
        source: String,
        message: String,
        debug: Option<String>,
    },
    /// A message type that the bus filter should have dropped.
    Unexpected(String),
    Cancelled,
    TimedOut(Duration),
}

impl Outcome {
    /// Every watched outcome is a clean shutdown.
    pub fn exit_code(&self) -> i32 {
        0
    }

    /// Whether the report belongs on stderr.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::StreamError { .. } | Outcome::Unexpected(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::EndOfStream => write!(f, "End of stream reached"),
            Outcome::StreamError {
                source,
                message,
                debug,
            } => {
                writeln!(f, "Error received  from element {source}: {message}")?;
                write!(
                    f,
                    "Debugging Information : {}",
                    debug.as_deref().unwrap_or("none")
                )
            }
            Outcome::Unexpected(kind) => write!(f, "Unexpected turn of events ({kind} message)"),
            Outcome::Cancelled => write!(f, "Playback interrupted"),
            Outcome::TimedOut(after) => {
                write!(f, "No end of stream or error within {after:?}")
            }
        }
    }
}

/// Builds the source → filter → converter → sink chain on a backend, plays
/// it and watches the bus until a terminal message arrives.
pub struct Driver<'a, B: Backend> {
    backend: &'a B,
    config: PipelineConfig,
    wait: WaitConfig,
    cancel: CancelToken,
}

impl<'a, B: Backend> Driver<'a, B> {
    pub fn new(backend: &'a B, config: PipelineConfig) -> Self {
        Driver {
            backend,
            config,
            wait: WaitConfig::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the pipeline to completion.
    ///
    /// Setup failures come back as `Err` after every handle acquired so far
    /// has been released. Once playback has started the pipeline is always
    /// stopped and released before returning, whatever the bus reported.
    pub fn run(&self) -> Result<Outcome, Error> {
        let stages = self.create_stages()?;

        let mut container = self.backend.new_container(&self.config.name);
        container.attach(stages)?;
        self.link_chain(&container)?;

        let source = &self.config.source.name;
        for (key, value) in &self.config.source_properties {
            debug!("setting {source}.{key} = {value}");
            container.set_property(source, key, value)?;
        }

        let change = container.set_state(PipelineState::Playing)?;
        info!("pipeline {} started ({change:?})", self.config.name);

        let Some(bus) = container.bus() else {
            self.stop(&container);
            return Err(Error::Bus);
        };
        let outcome = self.wait_for_terminal(&bus);
        drop(bus);

        self.stop(&container);
        drop(container);

        Ok(outcome)
    }

    /// Best-effort transition back to Null; failure is only logged.
    fn stop(&self, container: &B::Container) {
        if let Err(err) = container.set_state(PipelineState::Null) {
            warn!("failed to stop pipeline {}: {err}", self.config.name);
        }
    }

    fn create_stages(&self) -> Result<Vec<B::Stage>, Error> {
        let mut stages = Vec::with_capacity(4);
        let mut missing = Vec::new();
        for spec in self.config.stages() {
            match self.backend.make_stage(spec) {
                Ok(stage) => stages.push(stage),
                Err(err) => {
                    debug!("cannot create {spec}: {err}");
                    missing.push(spec.to_string());
                }
            }
        }
        if missing.is_empty() {
            Ok(stages)
        } else {
            Err(Error::MissingStages(missing))
        }
    }

    fn link_chain(&self, container: &B::Container) -> Result<(), Error> {
        let names = self.config.stages().map(|spec| spec.name.as_str());
        for pair in names.windows(2) {
            debug!("linking {} -> {}", pair[0], pair[1]);
            container.link(pair[0], pair[1])?;
        }
        Ok(())
    }

    fn wait_for_terminal<T: Bus>(&self, bus: &T) -> Outcome {
        let mut kinds = vec![MessageKind::Error, MessageKind::Eos];
        if self.wait.trace_states {
            kinds.push(MessageKind::StateChanged);
        }
        let started = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                info!("wait cancelled");
                return Outcome::Cancelled;
            }
            let timeout = match self.wait.deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(started.elapsed());
                    if remaining.is_zero() {
                        warn!("no terminal message within {deadline:?}");
                        return Outcome::TimedOut(deadline);
                    }
                    remaining.min(self.wait.poll_interval)
                }
                None => self.wait.poll_interval,
            };

            let Some(message) = bus.pop_filtered(Some(timeout), &kinds) else {
                continue;
            };
            let event = message.view();
            drop(message);

            match event {
                BusEvent::Error {
                    source,
                    message,
                    debug,
                } => {
                    log::error!("bus returned an error from {source}: {message}");
                    return Outcome::StreamError {
                        source,
                        message,
                        debug,
                    };
                }
                BusEvent::Eos => {
                    info!("end of stream");
                    return Outcome::EndOfStream;
                }
                BusEvent::StateChanged {
                    source,
                    old,
                    current,
                } if self.wait.trace_states => {
                    if source == self.config.name {
                        info!("Pipeline state changed from {old} to {current}");
                    }
                }
                other => {
                    warn!("bus filter let through a {} message", other.kind_name());
                    return Outcome::Unexpected(other.kind_name().to_owned());
                }
            }
        }
    }
}
