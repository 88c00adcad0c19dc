//! apitest binary.
//!
//! Runs suites of HTTP API tests, imports curl commands and generates
//! assertions from sample payloads.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use apitest_core::{curl, AssertionGenerator, CapturedResponse, GeneratorConfig};
use apitest_runner::{report, CancellationToken, ExecutionOptions, Orchestrator, RunnerConfig, Suite};

#[derive(Parser)]
#[command(name = "apitest")]
#[command(about = "Declarative HTTP API test runner", long_about = None)]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a suite file and print the run report
    Run {
        /// Suite file (JSON with `services` and `test_cases`)
        suite: PathBuf,

        /// Maximum number of test cases in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-case timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the run as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Convert a curl command into a request spec
    ImportCurl {
        /// The curl command, or `-` to read it from stdin
        command: String,

        /// Emit a test case for this service instead of a request spec
        #[arg(long)]
        service_id: Option<Uuid>,

        /// Service base URL the case path is relative to
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Generate assertions from a JSON sample
    Generate {
        /// JSON file with the sample payload
        file: PathBuf,

        /// Treat the file as a captured response (status_code, headers, body, response_time_ms)
        #[arg(long)]
        response: bool,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long)]
        max_array_size: Option<usize>,

        #[arg(long)]
        include_nulls: bool,

        #[arg(long)]
        max_assertions: Option<usize>,
    },
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,apitest_runner=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so reports on stdout stay machine readable.
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Run {
            suite,
            concurrency,
            timeout,
            json,
        } => run_suite(suite, concurrency, timeout, json).await,

        Commands::ImportCurl {
            command,
            service_id,
            base_url,
        } => {
            let command = if command == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read curl command from stdin")?;
                buf
            } else {
                command
            };

            let spec = curl::parse(&command).context("Failed to import curl command")?;
            let output = match service_id {
                Some(id) => serde_json::to_string_pretty(&spec.into_test_case(id, base_url.as_deref()))?,
                None => serde_json::to_string_pretty(&spec)?,
            };
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Generate {
            file,
            response,
            max_depth,
            max_array_size,
            include_nulls,
            max_assertions,
        } => {
            let defaults = GeneratorConfig::default();
            let config = GeneratorConfig {
                max_depth: max_depth.unwrap_or(defaults.max_depth),
                max_array_size: max_array_size.unwrap_or(defaults.max_array_size),
                include_nulls,
                max_assertions: max_assertions.unwrap_or(defaults.max_assertions),
                ..defaults
            };

            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let generator = AssertionGenerator::new(config);

            let assertions = if response {
                let captured: CapturedResponse =
                    serde_json::from_str(&content).context("Invalid captured response")?;
                generator.generate_from_response(&captured)
            } else {
                let sample: serde_json::Value =
                    serde_json::from_str(&content).context("Invalid JSON sample")?;
                generator.generate(&sample)
            };

            println!("{}", serde_json::to_string_pretty(&assertions)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_suite(
    path: PathBuf,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    json: bool,
) -> Result<ExitCode> {
    let mut config = RunnerConfig::from_env().context("Failed to load configuration")?;
    if let Some(concurrency) = concurrency {
        config.max_concurrent_tests = concurrency;
    }
    if let Some(timeout) = timeout {
        config.default_request_timeout = timeout;
    }

    let suite = Suite::load(&path)?;
    let cases = suite.active_cases();
    tracing::info!(
        suite = %path.display(),
        cases = cases.len(),
        concurrency = config.max_concurrent_tests,
        "Suite loaded"
    );

    let orchestrator = Orchestrator::from_config(&config).context("Failed to build HTTP client")?;
    let mut options = ExecutionOptions::from(&config);
    options.run_name = suite.name.clone();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Cancellation requested, waiting for in-flight test cases");
            on_signal.cancel();
        }
    });

    let run = orchestrator
        .execute(&suite.services, &cases, &options, &cancel)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print!("{}", report::render_text(&run));
    }

    Ok(if run.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
