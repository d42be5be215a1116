//! Purpose: Hold top-level CLI command dispatch for `pagewalk`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `simulate` exits non-zero (fetch exit code) when the session ends in error.
//! Invariants: A `--config` file overrides `--page-size`/`--prefetch` entirely.

use super::*;
use crate::simulate::{SimulateConfig, simulate};
use clap::CommandFactory;
use pagewalk::api::PagingConfig;
use std::path::Path;
use std::time::Duration;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "pagewalk", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Simulate(args) => {
            let paging = match &args.config {
                Some(path) => load_paging_config(path)?,
                None => match args.prefetch {
                    Some(prefetch) => PagingConfig::new(args.page_size, prefetch)?,
                    None => PagingConfig::with_page_size(args.page_size)?,
                },
            };
            let config = SimulateConfig {
                paging,
                total_count: args.total_count,
                delay: Duration::from_millis(args.delay_ms),
                error_on_page: args.error_on_page,
                scroll_to: args.scroll_to,
                step: args.step,
                footer_rows: args.footer_rows,
                retry: args.retry,
            };
            let summary = simulate(config, emit_json)?;
            emit_json(summary.to_json());
            if summary.status == "error" {
                Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Fetch)))
            } else {
                Ok(RunOutcome::ok())
            }
        }
    }
}

fn load_paging_config(path: &Path) -> Result<PagingConfig, Error> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read config {}", path.display()))
            .with_source(err)
    })?;
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid config {}: {err}", path.display()))
            .with_hint(r#"Expected JSON like {"page_size": 20, "prefetch_distance": 5}."#)
    })
}
