//! AMLP driver process entry point (spec section 6).
//!
//! ```text
//! driver [stream_port] [framed_port] [master_source_path]
//! driver --parse-test <source_path>
//! ```
//!
//! The positional form starts the two listeners (stream and framed) and
//! runs the readiness loop until a shutdown signal or an admin `shutdown`
//! command. `--parse-test` is a diagnostic mode: compile one source file
//! and report its function count and bytecode size without starting any
//! network listener.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{error, info};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
use tracing_subscriber::{fmt, EnvFilter};

use amlp_compiler::Compiler;
use amlp_config::Config;
use amlp_net::Server;

#[derive(Parser, Debug)]
#[command(name = "driver", about = "AMLP MUD driver", version)]
struct Cli {
    /// Path to a TOML config file layered under the CLI/environment
    /// overrides below.
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Compile `source_path` and report function count and bytecode size
    /// instead of starting the server. Exit code 0 on success, 1 otherwise.
    #[arg(long, value_name = "PATH")]
    parse_test: Option<PathBuf>,

    /// Stream (telnet-style) listener port.
    #[arg(value_name = "STREAM_PORT")]
    stream_port: Option<u16>,

    /// Web-socket framed listener port.
    #[arg(value_name = "FRAMED_PORT")]
    framed_port: Option<u16>,

    /// Root directory scripts and data resolve under (spec section 4.8's
    /// sandbox root). `AMLP_MUDLIB` overrides this when set.
    #[arg(value_name = "MASTER_SOURCE_PATH")]
    master_source_path: Option<PathBuf>,

    /// Run without the console banner, logging only to the configured file.
    #[arg(long, short = 'd')]
    daemon: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(source_path) = &cli.parse_test {
        return run_parse_test(source_path);
    }

    let mut config = cli.config.as_ref().map(Config::load).transpose()?.unwrap_or_default();

    if let Some(port) = cli.stream_port {
        config.stream_port = port;
    }
    if let Some(port) = cli.framed_port {
        config.framed_port = port;
    }
    if let Some(root) = &cli.master_source_path {
        config.mudlib_root = root.clone();
    }
    config.apply_env_overrides();

    let _log_guard = init_tracing(cli.daemon)?;

    info!(
        target: "driver",
        stream_port = config.stream_port,
        framed_port = config.framed_port,
        mudlib_root = %config.mudlib_root.display(),
        "starting driver"
    );

    let mut server = Server::bind(&config).with_context(|| "failed to bind listeners")?;

    info!(
        target: "driver",
        stream_port = config.stream_port,
        framed_port = config.framed_port,
        "driver started; press Ctrl+C to stop"
    );

    if let Err(err) = server.run() {
        error!(target: "driver", error = %err, "server loop exited with an error");
        return Err(err.into());
    }

    info!(target: "driver", "shutdown complete");
    Ok(())
}

/// `driver --parse-test <source_path>`: compiles one file in isolation and
/// reports the function count and bytecode length (spec section 6).
fn run_parse_test(source_path: &Path) -> Result<()> {
    let source = fs::read_to_string(source_path)
        .with_context(|| format!("failed to read {}", source_path.display()))?;
    let filename = source_path.display().to_string();
    let program = Compiler::compile(&source, &filename);

    if let Some(error_info) = program.error_info() {
        eprintln!(
            "{}:{}:{}: {}",
            filename, error_info.line, error_info.column, error_info.message
        );
        std::process::exit(1);
    }

    println!(
        "{}: {} function(s), {} byte(s) of bytecode",
        filename,
        program.functions.len(),
        program.bytecode.len()
    );
    Ok(())
}

struct LoggingHandles {
    #[allow(dead_code)]
    guard: Option<WorkerGuard>,
}

fn init_tracing(daemon_mode: bool) -> Result<LoggingHandles> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut guard = None;
    let console_enabled = !daemon_mode;

    let writer: BoxMakeWriter = if daemon_mode {
        let (file_writer, file_guard) = create_file_writer("logs")?;
        guard = Some(file_guard);
        BoxMakeWriter::new(file_writer)
    } else {
        BoxMakeWriter::new(io::stderr)
    };

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(console_enabled)
        .try_init();

    Ok(LoggingHandles { guard })
}

fn create_file_writer(dir: &str) -> Result<(non_blocking::NonBlocking, WorkerGuard)> {
    let dir_path = Path::new(dir);
    fs::create_dir_all(dir_path)
        .with_context(|| format!("failed to create log directory {}", dir_path.display()))?;
    let file_path = dir_path.join(default_log_name());
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&file_path)
        .with_context(|| format!("failed to open log file {}", file_path.display()))?;
    Ok(non_blocking(file))
}

fn default_log_name() -> String {
    format!("driver-{}.log", Local::now().format("%Y-%m-%d"))
}
