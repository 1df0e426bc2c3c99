//! Shared sync runner: poll loop, shutdown, timers
//!
//! Fetches the full event history from the source each tick, reconciles it
//! into the in-memory ledger, and pushes the delta to the backend store.
//! A failing tick logs and waits for the next one: every failure mode here
//! is recoverable by re-running the pass.

use anyhow::Result;
use std::time::Duration;
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::chain::{EventFilter, EventSource};
use crate::config::BaseConfig;
use crate::ledger::SaleLedger;
use crate::reconcile::{reconcile_and_store, ReconciliationReport};
use crate::store::BackendStore;

/// One full fetch-reconcile-push pass over the configured asset set.
///
/// An empty asset list reconciles everything the source returns under a
/// single unfiltered query. `pushed_revision` is the durable-write cursor
/// shared across passes: see [`reconcile_and_store`].
pub async fn sync_once<S: EventSource + ?Sized>(
    config: &BaseConfig,
    ledger: &mut SaleLedger,
    source: &S,
    store: &BackendStore,
    pushed_revision: &mut u64,
) -> Result<ReconciliationReport> {
    let filters: Vec<EventFilter> = if config.assets.is_empty() {
        vec![EventFilter::default()]
    } else {
        config.assets.iter().map(|&id| EventFilter::for_asset(id)).collect()
    };

    let mut total = ReconciliationReport::default();
    for filter in &filters {
        let events = source.get_raw_events(filter).await?;
        let report = reconcile_and_store(ledger, &events, store, pushed_revision).await?;
        total.applied += report.applied;
        total.skipped += report.skipped;
        total.rejected_regressions += report.rejected_regressions;
    }
    Ok(total)
}

/// Run the sync loop until Ctrl-C.
pub async fn run_sync<S: EventSource + ?Sized>(
    config: &BaseConfig,
    source: &S,
    store: &BackendStore,
) -> Result<()> {
    let mut ledger = SaleLedger::new();
    let mut pushed_revision = 0u64;

    // Skip missed ticks so a slow pass doesn't queue a burst of replays
    let mut poll_timer = interval(Duration::from_secs(config.poll_interval_secs));
    poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if config.assets.is_empty() {
        info!("Watching all assets, polling every {}s", config.poll_interval_secs);
    } else {
        info!(
            "Watching {} asset(s), polling every {}s",
            config.assets.len(),
            config.poll_interval_secs
        );
    }
    info!(
        "Sync agent started at {}. Press Ctrl+C to exit.",
        chrono::Utc::now().to_rfc3339()
    );

    loop {
        tokio::select! {
            _ = poll_timer.tick() => {
                match sync_once(config, &mut ledger, source, store, &mut pushed_revision).await {
                    Ok(report) => {
                        if report.applied > 0 || !report.is_clean() {
                            info!("Reconciliation pass: {} ({} row(s) total)", report, ledger.len());
                        }
                    }
                    Err(e) => {
                        // Transport failures included: state is unchanged,
                        // the next tick replays the full history
                        warn!("Sync pass failed, will retry: {:#}", e);
                    }
                }
            }
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down after {} reconciled row(s)", ledger.len());
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testutil::encode_event;
    use crate::events::RawSaleEvent;
    use crate::types::SaleRequest;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    struct FixedSource {
        events: Vec<RawSaleEvent>,
        filters_seen: Mutex<Vec<EventFilter>>,
    }

    #[async_trait]
    impl EventSource for FixedSource {
        async fn get_raw_events(&self, filter: &EventFilter) -> Result<Vec<RawSaleEvent>> {
            self.filters_seen.lock().unwrap().push(filter.clone());
            let events = match filter.asset_id {
                None => self.events.clone(),
                Some(id) => self
                    .events
                    .iter()
                    .filter(|e| {
                        // asset id is the first data word
                        e.data[2..66] == format!("{:064x}", id)
                    })
                    .cloned()
                    .collect(),
            };
            Ok(events)
        }
    }

    fn config(assets: Vec<u64>) -> BaseConfig {
        BaseConfig {
            api_url: "http://localhost:9".to_string(),
            events_url: "http://localhost:9".to_string(),
            contract_address: "0x1234567890abcdef1234567890abcdef12345678".to_string(),
            participant: None,
            poll_interval_secs: 1,
            connection_timeout_secs: 1,
            assets,
        }
    }

    fn proposed_event(asset_id: u64) -> RawSaleEvent {
        let request = SaleRequest {
            asset_id,
            seller: "0x1111111111111111111111111111111111111111".to_string(),
            buyer: "0x2222222222222222222222222222222222222222".to_string(),
            tokens: 10,
            funds: Decimal::ONE,
            seller_approved: false,
            buyer_proposed: true,
            is_confirmed: false,
            is_finished: false,
            is_withdraw: false,
        };
        encode_event(&request, 1_000_000_000_000_000_000, asset_id, 0)
    }

    #[tokio::test]
    async fn test_failed_push_keeps_merge_and_retries_delta() {
        let source = FixedSource {
            events: vec![proposed_event(7)],
            filters_seen: Mutex::new(Vec::new()),
        };
        // Nothing listens here: every push fails
        let store = BackendStore::new("http://127.0.0.1:1", 1).unwrap();
        let mut ledger = SaleLedger::new();
        let mut pushed = 0u64;

        // First pass merges the row, then the push fails and propagates.
        let err = sync_once(&config(vec![]), &mut ledger, &source, &store, &mut pushed).await;
        assert!(err.is_err());
        assert_eq!(ledger.len(), 1);
        // The durable-write cursor did not advance past the failed push
        assert_eq!(pushed, 0);
        assert_eq!(ledger.rows_since(pushed).len(), 1);

        // Simulate a successful push, then a pass with no new history is
        // clean and never touches the store.
        pushed = ledger.current_revision();
        let report = sync_once(&config(vec![]), &mut ledger, &source, &store, &mut pushed)
            .await
            .unwrap();
        assert_eq!(report.applied, 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_sync_once_queries_each_configured_asset() {
        let source = FixedSource {
            events: vec![],
            filters_seen: Mutex::new(Vec::new()),
        };
        let store = BackendStore::new("http://127.0.0.1:1", 1).unwrap();
        let mut ledger = SaleLedger::new();
        let mut pushed = 0u64;

        sync_once(&config(vec![7, 9]), &mut ledger, &source, &store, &mut pushed)
            .await
            .unwrap();
        let seen = source.filters_seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], EventFilter::for_asset(7));
        assert_eq!(seen[1], EventFilter::for_asset(9));
    }
}
