//! Purpose: `pagewalk` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit one JSON value per line on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Tracing output goes to stderr and is filtered by `RUST_LOG` (default: warn).
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod demo_source;
mod simulate;

use pagewalk::api::{Error, ErrorKind, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `pagewalk --help` for usage."));
            }
        },
    };

    init_tracing();
    command_dispatch::dispatch_command(cli.command)
}

#[derive(Parser)]
#[command(
    name = "pagewalk",
    version,
    about = "Drive a forward-only pager against a simulated slow source",
    long_about = None,
    after_help = r#"EXAMPLES
  $ pagewalk simulate --scroll-to 60
  $ pagewalk simulate --page-size 20 --prefetch 0 --delay-ms 0
  $ pagewalk simulate --error-on-page 2 --retry
  $ pagewalk simulate --config paging.json
  $ RUST_LOG=pagewalk=debug pagewalk simulate --scroll-to 15"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Scroll through a simulated list and print the pager state at each step",
        long_about = r#"Scroll through a simulated list and print the pager state at each step.

Each line on stdout is the aggregate state after the pager settled on one observed
position. The last line is a summary with the total number of fetches."#,
        after_help = r#"NOTES
  - `--config` takes a JSON file like {"page_size": 20, "prefetch_distance": 5}
    and overrides --page-size/--prefetch
  - `--error-on-page` fails that page once; `--retry` retries after the failure"#
    )]
    Simulate(SimulateArgs),
    #[command(about = "Print shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    #[arg(long, default_value_t = 95, help = "Number of items the source holds")]
    total_count: usize,
    #[arg(long, default_value_t = pagewalk::api::DEFAULT_PAGE_SIZE, help = "Items per page")]
    page_size: usize,
    #[arg(long, help = "Prefetch distance in items (default: page size / 2)")]
    prefetch: Option<usize>,
    #[arg(
        long,
        help = "JSON file holding a paging config",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 20, help = "Simulated latency per fetch")]
    delay_ms: u64,
    #[arg(long, help = "Fail this page once")]
    error_on_page: Option<usize>,
    #[arg(long, default_value_t = 50, help = "Last position to observe")]
    scroll_to: usize,
    #[arg(long, default_value_t = 5, help = "Positions advanced per step")]
    step: usize,
    #[arg(long, default_value_t = 0, help = "Trailing non-data rows (loading footer)")]
    footer_rows: usize,
    #[arg(long, help = "Retry once after a failed fetch")]
    retry: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim_start_matches("error: ").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn emit_json(value: Value) {
    let json = serde_json::to_string(&value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", error_message(err));
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Fetch => "fetch failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(page) = err.page() {
        inner.insert("page".to_string(), json!(page));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}
