use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};
use tourbook_booking::{CheckoutOrchestrator, ReconcileReport, Reconciler};

/// One maintenance pass: replay pending booking writes, then drop idle
/// checkout sessions. Returns the reconcile report when the pending log
/// could be read.
pub async fn run_maintenance(reconciler: &Reconciler, checkout: &CheckoutOrchestrator) -> Option<ReconcileReport> {
    let report = match reconciler.run_once().await {
        Ok(report) => {
            if report.written + report.already_present + report.failed > 0 {
                info!(
                    "Reconciliation pass: {} written, {} already present, {} failed, {} parked",
                    report.written, report.already_present, report.failed, report.parked
                );
            }
            Some(report)
        }
        Err(e) => {
            error!("Reconciliation pass failed: {}", e);
            None
        }
    };

    let purged = checkout.purge_idle().await;
    if purged > 0 {
        info!("Purged {} idle checkout sessions", purged);
    }

    report
}

pub async fn start_maintenance_worker(
    reconciler: Arc<Reconciler>,
    checkout: Arc<CheckoutOrchestrator>,
    interval_seconds: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Maintenance worker started, running every {}s", interval_seconds);

    loop {
        ticker.tick().await;
        run_maintenance(&reconciler, &checkout).await;
    }
}
