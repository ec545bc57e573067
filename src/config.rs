use std::fmt;
use std::time::Duration;

/// Role of a stage in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Source,
    Filter,
    Converter,
    Sink,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageKind::Source => "source",
            StageKind::Filter => "filter",
            StageKind::Converter => "converter",
            StageKind::Sink => "sink",
        })
    }
}

/// One stage: which element factory to use and what to call the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub kind: StageKind,
    pub factory: String,
    pub name: String,
}

impl StageSpec {
    pub fn new(kind: StageKind, factory: impl Into<String>) -> Self {
        StageSpec {
            kind,
            factory: factory.into(),
            name: kind.to_string(),
        }
    }
}

impl fmt::Display for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.factory)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub name: String,
    pub source: StageSpec,
    pub filter: StageSpec,
    pub converter: StageSpec,
    pub sink: StageSpec,
    /// Applied to the source after linking, in order.
    pub source_properties: Vec<(String, String)>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            name: "test-pipeline".to_owned(),
            source: StageSpec::new(StageKind::Source, "videotestsrc"),
            filter: StageSpec::new(StageKind::Filter, "vertigotv"),
            converter: StageSpec::new(StageKind::Converter, "videoconvert"),
            sink: StageSpec::new(StageKind::Sink, "autovideosink"),
            source_properties: vec![("pattern".to_owned(), "0".to_owned())],
        }
    }
}

impl PipelineConfig {
    /// Stages in link order.
    pub fn stages(&self) -> [&StageSpec; 4] {
        [&self.source, &self.filter, &self.converter, &self.sink]
    }

    /// Sets a source property, replacing an earlier value for the same key.
    pub fn with_source_property(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.source_properties.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.source_properties.push((key.to_owned(), value)),
        }
        self
    }
}

/// How long and how the driver waits on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    /// Length of one bus pop; cancellation is checked between pops.
    pub poll_interval: Duration,
    /// Give up after this long without a terminal message.
    pub deadline: Option<Duration>,
    /// Also accept state-changed messages and log the pipeline's transitions.
    pub trace_states: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        WaitConfig {
            poll_interval: Duration::from_millis(100),
            deadline: None,
            trace_states: false,
        }
    }
}
