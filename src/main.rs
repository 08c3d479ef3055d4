extern crate clap;

mod errors;
mod measurements;
mod results;
mod server;
mod speedtest;
mod stats;
mod tui;

use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colored::Colorize;
use log::{error, info, warn, LevelFilter};

use crate::errors::{exit_codes, format_error_for_display, ErrorKind, SpeedTestError};
use crate::measurements::MEBIBYTE;
use crate::results::{format_ping, format_speed, SpeedTestResult, ThroughputReport};
use crate::server::ServerConfig;
use crate::speedtest::cancel::CancelHandle;
use crate::speedtest::client::Client;
use crate::speedtest::engine::{TestConfig, TestEngine};
use crate::speedtest::progress::NoProgress;
use crate::tui::{DisplayMode, TuiController};

#[derive(Parser)]
#[command(author, version = env!("SPEEDPROBE_LONG_VERSION"), about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the measurement server
    Serve(ServeArgs),
    /// Measure download, upload and ping against a measurement server
    Run(RunArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3001")]
    listen: SocketAddr,

    /// Path prefix for the measurement endpoints
    #[arg(long, default_value = server::DEFAULT_PREFIX)]
    prefix: String,

    /// Largest payload served by /download, in MiB
    #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u64).range(1..=server::MAX_PAYLOAD_MB))]
    max_download_mb: u64,

    /// Largest body accepted by /upload, in MiB
    #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u64).range(1..=server::MAX_PAYLOAD_MB))]
    max_upload_mb: u64,

    /// Generator chunk size in KiB (64 to 1024)
    #[arg(long, default_value_t = 1024)]
    chunk_kb: usize,

    /// Download size used when the request names none, in MiB
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    default_size_mb: u64,
}

#[derive(Args)]
struct RunArgs {
    /// Base URL of the measurement server, including its prefix
    #[arg(long, default_value = "http://127.0.0.1:3001/api/speed-test")]
    server: String,

    /// Minimum seconds spent in each of download and upload
    #[arg(long, default_value_t = 10)]
    min_duration: u64,

    /// Number of ping round trips (at least 3)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(3..))]
    ping_count: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Print the result as JSON instead of showing the dashboard
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = cli.verbose.log_level_filter();

    let outcome = match cli.command {
        Command::Serve(args) => {
            init_logger(level);
            serve(args).await.map(|()| exit_codes::SUCCESS)
        }
        Command::Run(args) => {
            let mode = DisplayMode::detect(args.json, io::stdout().is_terminal());
            // stderr shares the terminal with the dashboard.
            init_logger(if mode.is_interactive() {
                level.min(LevelFilter::Error)
            } else {
                level
            });
            run(args, mode).await
        }
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_error_for_display(&e));
            e.exit_code()
        }
    };

    std::process::exit(code);
}

fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn serve(args: ServeArgs) -> Result<(), SpeedTestError> {
    let config = ServerConfig {
        listen: args.listen,
        prefix: args.prefix,
        default_download_mb: args.default_size_mb,
        max_download_mb: args.max_download_mb,
        max_upload_bytes: args.max_upload_mb.saturating_mul(MEBIBYTE),
        chunk_bytes: args.chunk_kb.saturating_mul(1024),
    };

    server::serve(config, shutdown_signal()).await
}

fn terminal_error(e: Box<dyn std::error::Error>) -> SpeedTestError {
    SpeedTestError::new(ErrorKind::Unknown, format!("terminal error: {}", e))
}

async fn run(args: RunArgs, mode: DisplayMode) -> Result<i32, SpeedTestError> {
    let client = Client::new(&args.server, Duration::from_secs(args.timeout))?;
    let config = TestConfig {
        min_phase_duration: Duration::from_secs(args.min_duration),
        ping_count: args.ping_count as usize,
        ..TestConfig::default()
    };
    let engine = Arc::new(TestEngine::new(client, config));

    if mode.is_interactive() {
        let mut controller = TuiController::new(mode, &args.server);
        controller.init().map_err(terminal_error)?;
        let outcome = controller.run_interactive(engine).await;
        controller.cleanup().map_err(terminal_error)?;

        if let Some(result) = outcome.map_err(terminal_error)? {
            print_summary(&args.server, &result);
        }
        return Ok(exit_codes::SUCCESS);
    }

    let cancel = CancelHandle::new();
    let token = cancel.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let Some(result) = engine.run(&token, &NoProgress).await? else {
        warn!("Speed test cancelled");
        return Ok(exit_codes::CANCELLED);
    };

    if mode == DisplayMode::Json {
        let json = serde_json::to_string_pretty(&result).map_err(|e| {
            SpeedTestError::new(ErrorKind::Unknown, "failed to serialize result")
                .with_source(e)
        })?;
        println!("{}", json);
    } else {
        print_summary(&args.server, &result);
    }

    Ok(exit_codes::SUCCESS)
}

fn phase_detail(report: &ThroughputReport) -> String {
    format!("({} requests, {} failed)", report.requests, report.failed)
}

fn print_summary(server: &str, result: &SpeedTestResult) {
    println!("{} {}", "Server:".bold().white(), server.bright_blue());
    println!("{} {}", "Your IP:".bold().white(), result.ip.bright_blue());
    println!(
        "{} {}",
        "Ping:".bold().white(),
        format_ping(result.ping).bright_cyan()
    );
    println!(
        "{} {} {}",
        "Download speed:".bold().white(),
        format_speed(result.download).bright_cyan(),
        phase_detail(&result.details.download).dimmed()
    );
    println!(
        "{} {} {}",
        "Upload speed:".bold().white(),
        format_speed(result.upload).bright_cyan(),
        phase_detail(&result.details.upload).dimmed()
    );
}
