use anyhow::Context;
use clap::{error::ErrorKind, Parser, Subcommand};
use color_classifier::{
    classify::ClassifyPipeline,
    config::{Config, DEFAULT_MODEL_PATH},
    models::{ColorClassifier, Variant},
    web::serve,
    ClassifierError,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "color-classifier")]
#[command(about = "Color classification for images with a MobileViT-style network")]
#[command(version)]
struct Cli {
    /// Model weights path (.pth or .safetensors)
    #[arg(long, global = true, default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// Model size preset: XXS, XS or S
    #[arg(long, global = true, default_value = "XXS")]
    variant: Variant,

    /// Class labels in output order, comma separated
    #[arg(long, global = true, value_delimiter = ',')]
    labels: Option<Vec<String>>,

    /// Force CPU inference
    #[arg(long, global = true)]
    cpu: bool,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single image and print JSON to stdout
    Run {
        /// Image file path
        image_path: PathBuf,
    },
    /// Start the HTTP service
    Serve {
        /// Server bind address
        #[arg(long, default_value = "0.0.0.0:3001")]
        bind: String,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if is_informational(&err) => {
            // --help / --version
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => return fail(usage_error(&err).into()),
    };

    let config = match Config::new(cli.model, cli.variant, cli.labels, cli.cpu) {
        Ok(config) => config.with_log_level(cli.log_level),
        Err(err) => return fail(err.into()),
    };

    init_logging(&config.log_level);

    match execute(config, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

/// 初始化日志系统：RUST_LOG 优先，其次配置中的级别；输出到stderr，stdout只留给结果JSON
fn init_logging(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn execute(config: Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run { image_path } => run_once(&config, &image_path),
        Command::Serve { bind, workers } => run_server(config.with_server(bind, workers)?),
    }
}

fn run_once(config: &Config, image_path: &std::path::Path) -> anyhow::Result<()> {
    let classifier = ColorClassifier::new(config)?;
    let output = ClassifyPipeline::process_path(&classifier, image_path)?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting color classification service...");
    tracing::info!("Bind address: {}", config.server_config.bind_addr);
    tracing::info!("Model: {} ({})", config.model_path.display(), config.variant);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server_config.workers)
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(serve(config))?;
    Ok(())
}

fn is_informational(err: &clap::Error) -> bool {
    matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

/// 参数错误转为输入错误，去掉 clap 的前缀与用法说明
fn usage_error(err: &clap::Error) -> ClassifierError {
    let rendered = err.to_string();
    let message = rendered
        .split("\n\nUsage:")
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches("error:")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    ClassifierError::InvalidInput(message)
}

fn fail(err: anyhow::Error) -> ExitCode {
    tracing::debug!("{:#}", err);
    report_error(&err);
    ExitCode::FAILURE
}

/// 结构化错误以JSON写入stderr，其余错误输出纯文本
fn report_error(err: &anyhow::Error) {
    let json = err
        .downcast_ref::<ClassifierError>()
        .and_then(|e| serde_json::to_string_pretty(&e.to_payload()).ok());

    match json {
        Some(json) => eprintln!("{}", json),
        None => eprintln!("Error: {:#}", err),
    }
}
