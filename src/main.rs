use clap::Parser;
use effect_pipeline::{
    CancelToken, Driver, GstBackend, PipelineConfig, Runtime, StageKind, StageSpec, WaitConfig,
    FAILURE_EXIT_CODE,
};
use log::{error, warn};
use std::time::Duration;

/// Plays a test pattern through a video effect until end of stream or error.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Source element factory
    #[arg(long, default_value = "videotestsrc")]
    source: String,
    /// Effect element factory
    #[arg(long, default_value = "vertigotv")]
    filter: String,
    /// Color-space converter element factory
    #[arg(long, default_value = "videoconvert")]
    converter: String,
    /// Display sink element factory
    #[arg(long, default_value = "autovideosink")]
    sink: String,
    /// Source `pattern` property, by number or nick
    #[arg(long, default_value = "0")]
    pattern: String,
    /// Stop after this many source buffers
    #[arg(long)]
    num_buffers: Option<u32>,
    /// Give up after this many seconds without end of stream or error
    #[arg(long)]
    timeout: Option<u64>,
    /// Bus poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
    /// Log the pipeline's state transitions
    #[arg(long)]
    trace_states: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig {
            source: StageSpec::new(StageKind::Source, &self.source),
            filter: StageSpec::new(StageKind::Filter, &self.filter),
            converter: StageSpec::new(StageKind::Converter, &self.converter),
            sink: StageSpec::new(StageKind::Sink, &self.sink),
            ..PipelineConfig::default()
        }
        .with_source_property("pattern", &self.pattern);
        if let Some(n) = self.num_buffers {
            config = config.with_source_property("num-buffers", n);
        }
        config
    }

    fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            deadline: self.timeout.map(Duration::from_secs),
            trace_states: self.trace_states,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let runtime = match Runtime::init() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to initialize gstreamer: {err}");
            std::process::exit(FAILURE_EXIT_CODE);
        }
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("cannot install Ctrl-C handler: {err}");
    }

    let backend = GstBackend::new(&runtime);
    let driver = Driver::new(&backend, args.pipeline_config())
        .wait_config(args.wait_config())
        .cancel_token(cancel);

    let code = match driver.run() {
        Ok(outcome) => {
            if outcome.is_failure() {
                eprintln!("{outcome}");
            } else {
                println!("{outcome}");
            }
            outcome.exit_code()
        }
        Err(err) => {
            eprintln!("{err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}
