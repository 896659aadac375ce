//! Window counter service
//!
//! Consumes events from Kafka, counts them per key in tumbling windows and
//! produces one summary record per key when a window closes.

mod service;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use window_counter_config::{CounterConfig, ObservabilityConfig, SinkKind};

#[derive(Parser, Debug)]
#[command(
    name = "window-counter",
    version,
    about = "Tumbling-window keyed event counter",
    long_about = "Counts Kafka events per key in fixed, non-overlapping time windows.\n\n\
                  Configuration is layered: built-in defaults, then the YAML file given\n\
                  with --config, then WINDOW_COUNTER_* environment variables, then the\n\
                  flags below."
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", env = "WINDOW_COUNTER_CONFIG")]
    config: Option<PathBuf>,

    /// Window length in milliseconds
    #[arg(long, value_name = "MS")]
    window_ms: Option<u64>,

    /// Period of the window-closure check in milliseconds
    #[arg(long, value_name = "MS")]
    flush_interval_ms: Option<u64>,

    /// Key reported for events without a key
    #[arg(long, value_name = "KEY")]
    no_key_sentinel: Option<String>,

    /// Kafka bootstrap servers
    #[arg(long, value_name = "HOSTS")]
    brokers: Option<String>,

    /// Topic to consume events from
    #[arg(long, value_name = "TOPIC")]
    input_topic: Option<String>,

    /// Topic to produce window summaries to
    #[arg(long, value_name = "TOPIC")]
    output_topic: Option<String>,

    /// Consumer group id
    #[arg(long, value_name = "GROUP")]
    group_id: Option<String>,

    /// Where window summaries are sent
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkArg {
    Kafka,
    Log,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Kafka => SinkKind::Kafka,
            SinkArg::Log => SinkKind::Log,
        }
    }
}

impl Cli {
    /// Apply flags on top of the loaded configuration
    fn apply(&self, config: &mut CounterConfig) {
        if let Some(window_ms) = self.window_ms {
            config.window.window_ms = window_ms;
        }
        if let Some(flush_interval_ms) = self.flush_interval_ms {
            config.window.flush_interval_ms = flush_interval_ms;
        }
        if let Some(sentinel) = &self.no_key_sentinel {
            config.window.no_key_sentinel = sentinel.clone();
        }
        if let Some(brokers) = &self.brokers {
            config.kafka.brokers = brokers.clone();
        }
        if let Some(topic) = &self.input_topic {
            config.kafka.input_topic = topic.clone();
        }
        if let Some(topic) = &self.output_topic {
            config.kafka.output_topic = topic.clone();
        }
        if let Some(group_id) = &self.group_id {
            config.kafka.group_id = group_id.clone();
        }
        if let Some(sink) = self.sink {
            config.sink.kind = sink.into();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if self.json_logs {
            config.observability.json_logging = true;
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CounterConfig::load(cli.config.clone())?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    init_tracing(&config.observability);

    service::run(config).await
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "window-counter",
            "--window-ms",
            "5000",
            "--flush-interval-ms",
            "250",
            "--no-key-sentinel",
            "none",
            "--brokers",
            "kafka:9092",
            "--input-topic",
            "clicks",
            "--output-topic",
            "click-counts",
            "--group-id",
            "counters",
            "--sink",
            "log",
            "--log-level",
            "debug",
            "--json-logs",
        ]);

        let mut config = CounterConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.window.window_ms, 5000);
        assert_eq!(config.window.flush_interval_ms, 250);
        assert_eq!(config.window.no_key_sentinel, "none");
        assert_eq!(config.kafka.brokers, "kafka:9092");
        assert_eq!(config.kafka.input_topic, "clicks");
        assert_eq!(config.kafka.output_topic, "click-counts");
        assert_eq!(config.kafka.group_id, "counters");
        assert_eq!(config.sink.kind, SinkKind::Log);
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.observability.json_logging);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["window-counter"]);

        let mut config = CounterConfig::default();
        cli.apply(&mut config);

        assert_eq!(config, CounterConfig::default());
        assert!(!cli.print_config);
    }

    #[test]
    fn test_unknown_sink_rejected() {
        let result = Cli::try_parse_from(["window-counter", "--sink", "stdout"]);
        assert!(result.is_err());
    }
}
