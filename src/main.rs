use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use file_publisher::execution::{PublishOptions, StreamingPublisher};
use file_publisher::ingestion::DecoderRegistry;
use file_publisher::logging::{self, LogFormat};
use file_publisher::publish::{LogSink, PublishSink};
use file_publisher::IngestionError;

#[derive(Parser, Debug)]
#[command(
    name = "file-publisher",
    version,
    about = "Publish every row of a CSV, text, or spreadsheet file to a message broker topic"
)]
struct Cli {
    /// Input file (.txt, .csv, .xlsx, .xls, .xlsm, .xlsb, .ods)
    file: Option<PathBuf>,

    /// Destination topic
    #[arg(long, env = "FILE_PUBLISHER_TOPIC", default_value = "file-lines")]
    topic: String,

    /// Kafka bootstrap servers; without it records are only logged
    #[arg(long, env = "FILE_PUBLISHER_BOOTSTRAP_SERVERS")]
    bootstrap_servers: Option<String>,

    /// Broker acknowledgement timeout per record, in milliseconds
    #[arg(long, env = "FILE_PUBLISHER_MESSAGE_TIMEOUT_MS", default_value_t = 5_000)]
    message_timeout_ms: u64,

    /// Maximum number of records awaiting broker acknowledgement
    #[arg(long, env = "FILE_PUBLISHER_MAX_IN_FLIGHT", default_value_t = file_publisher::execution::DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Rows buffered between the spreadsheet reader and the publisher
    #[arg(long, env = "FILE_PUBLISHER_BRIDGE_CAPACITY", default_value_t = file_publisher::ingestion::DEFAULT_BRIDGE_CAPACITY)]
    bridge_capacity: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "FILE_PUBLISHER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "FILE_PUBLISHER_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Print the run summary as JSON on stdout when done
    #[arg(long)]
    summary_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level, cli.log_format) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("file-publisher failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Some(file) = cli.file.clone() else {
        let err = IngestionError::Usage {
            message: "an input file path is required".to_string(),
        };
        error!(error = %err, "nothing to process");
        return Ok(ExitCode::from(2));
    };
    if cli.max_in_flight == 0 || cli.bridge_capacity == 0 {
        let err = IngestionError::Usage {
            message: "--max-in-flight and --bridge-capacity must be at least 1".to_string(),
        };
        error!(error = %err, "invalid arguments");
        return Ok(ExitCode::from(2));
    }

    let sink = build_sink(&cli)?;
    info!(destination = sink.destination(), "publishing records");

    let publisher = StreamingPublisher::new(
        DecoderRegistry::default(),
        sink,
        PublishOptions {
            bridge_capacity: cli.bridge_capacity,
            max_in_flight: cli.max_in_flight,
        },
    );

    // Fatal run errors are already logged by the publisher's observer.
    let Ok(summary) = publisher.run(&file).await else {
        return Ok(ExitCode::FAILURE);
    };

    if cli.summary_json {
        let json = serde_json::to_string(&summary).context("failed to serialize run summary")?;
        println!("{json}");
    }
    Ok(ExitCode::SUCCESS)
}

fn build_sink(cli: &Cli) -> anyhow::Result<Arc<dyn PublishSink>> {
    let Some(servers) = cli.bootstrap_servers.as_deref() else {
        return Ok(Arc::new(LogSink::new(cli.topic.clone())));
    };

    #[cfg(feature = "kafka")]
    {
        use file_publisher::publish::{KafkaSink, KafkaSinkConfig};

        let mut config = KafkaSinkConfig::new(servers, cli.topic.clone());
        config.message_timeout = std::time::Duration::from_millis(cli.message_timeout_ms);
        let sink = KafkaSink::connect(&config)
            .with_context(|| format!("failed to create Kafka producer for {servers}"))?;
        Ok(Arc::new(sink))
    }

    #[cfg(not(feature = "kafka"))]
    {
        let _ = cli.message_timeout_ms;
        anyhow::bail!(
            "--bootstrap-servers={servers} given, but this binary was built without the 'kafka' feature"
        )
    }
}
