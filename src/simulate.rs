//! Purpose: Scripted scroll session that drives a pager over the demo source.
//! Exports: `SimulateConfig`, `SimulationSummary`, `simulate`.
//! Role: Plays the list UI: observe a row, wait for the pager to settle, report, repeat.
//! Invariants: Runs on a current-thread runtime so each event is fully handled before checks.
//! Invariants: Reports are deterministic for a given config.
use std::sync::Arc;
use std::time::Duration;

use pagewalk::api::{
    AggregateState, Error, ErrorKind, EventEmitter, Pager, PagingConfig, StateStream,
};
use serde_json::{Value, json};
use tokio::runtime::Handle;

use crate::demo_source::{DemoItem, DemoSource};

#[derive(Clone, Debug)]
pub(crate) struct SimulateConfig {
    pub(crate) paging: PagingConfig,
    pub(crate) total_count: usize,
    pub(crate) delay: Duration,
    pub(crate) error_on_page: Option<usize>,
    pub(crate) scroll_to: usize,
    pub(crate) step: usize,
    pub(crate) footer_rows: usize,
    pub(crate) retry: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct SimulationSummary {
    pub(crate) items: usize,
    pub(crate) pages: usize,
    pub(crate) fetches: usize,
    pub(crate) status: &'static str,
    pub(crate) total_count: Option<usize>,
}

impl SimulationSummary {
    pub(crate) fn to_json(&self) -> Value {
        json!({
            "summary": {
                "items": self.items,
                "pages": self.pages,
                "fetches": self.fetches,
                "status": self.status,
                "total_count": self.total_count,
            }
        })
    }
}

pub(crate) fn simulate(
    config: SimulateConfig,
    mut on_report: impl FnMut(Value),
) -> Result<SimulationSummary, Error> {
    if config.step == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("step must be positive")
            .with_hint("Use --step 1 or more."));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to start runtime")
                .with_source(err)
        })?;
    runtime.block_on(run_session(config, &mut on_report))
}

async fn run_session(
    config: SimulateConfig,
    on_report: &mut impl FnMut(Value),
) -> Result<SimulationSummary, Error> {
    let source = Arc::new(
        DemoSource::new(config.total_count, config.delay).with_error_on_page(config.error_on_page),
    );
    let pager = Pager::new(Handle::current(), Arc::clone(&source), 0usize, config.paging);
    let mut states = pager.states();
    let mut emitter = EventEmitter::new();
    emitter.set_bottom_item_offset(config.footer_rows);
    let task = pager.launch(emitter.channel().clone());

    let mut retried = false;
    let mut last = states.current();
    let mut position = 0;
    while position <= config.scroll_to {
        // The footer renders below loaded rows only.
        let footer = if last.is_empty() { 0 } else { config.footer_rows };
        emitter.set_list_size(last.len() + footer);
        emitter.on_get_item(position);
        last = settle(&emitter, &mut states).await?;
        on_report(report_json("observe", Some(position), &last, source.calls()));

        if last.error().is_some() {
            if !config.retry || retried {
                break;
            }
            retried = true;
            emitter.retry();
            last = settle(&emitter, &mut states).await?;
            on_report(report_json("retry", None, &last, source.calls()));
            if last.error().is_some() {
                break;
            }
        }
        position += config.step;
    }

    emitter.stop();
    let pager = task.await.map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("pager task failed")
            .with_source(err)
    })?;

    Ok(SimulationSummary {
        items: last.len(),
        pages: pager.loaded_pages(),
        fetches: source.calls(),
        status: last.status.as_str(),
        total_count: last.total_count,
    })
}

/// Wait until the pager has drained its events and no fetch is outstanding.
async fn settle(
    emitter: &EventEmitter,
    states: &mut StateStream<DemoItem>,
) -> Result<AggregateState<DemoItem>, Error> {
    while emitter.channel().pending() > 0 {
        tokio::task::yield_now().await;
    }
    states
        .wait_for(|state| !state.is_loading())
        .await
        .ok_or_else(|| Error::new(ErrorKind::Internal).with_message("pager stopped publishing"))
}

fn report_json(
    event: &str,
    position: Option<usize>,
    state: &AggregateState<DemoItem>,
    fetches: usize,
) -> Value {
    let mut value = json!({
        "event": event,
        "items": state.len(),
        "status": state.status.as_str(),
        "total_count": state.total_count,
        "fetches": fetches,
    });
    if let Some(position) = position {
        value["position"] = json!(position);
    }
    if let Some(last) = state.items.last() {
        value["last_item"] = json!(last);
    }
    if let Some(err) = state.error() {
        value["error"] = json!(err.message().unwrap_or("fetch failed"));
    }
    value
}
