use crate::models::SweepReport;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info};

/// Expires overdue tasks every `every`; the first pass runs immediately.
pub fn spawn(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_once(&state, Utc::now()).await;
        }
    })
}

/// One sweep; failures are logged and left for the next tick.
pub async fn run_once(state: &AppState, now: DateTime<Utc>) -> Option<SweepReport> {
    match state.sweep(now).await {
        Ok(report) => {
            if report != SweepReport::default() {
                info!(
                    expired = report.expired,
                    materialized = report.materialized,
                    "sweep finished"
                );
            }
            Some(report)
        }
        Err(err) => {
            error!("sweep failed, retrying next tick: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerPolicy, Tracker};
    use crate::models::NewHabitRequest;
    use chrono::TimeZone;

    #[tokio::test]
    async fn failed_sweep_is_reported_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::default();
        let request = NewHabitRequest {
            name: "walk".to_string(),
            frequency: Some(1),
            period: "daily".to_string(),
            goal: "1 week".to_string(),
            start_date: "2024-01-01".to_string(),
            notes: None,
        };
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        tracker
            .create_habit(&request, start, &LedgerPolicy::default())
            .unwrap();
        let state = AppState::new(
            dir.path().join("missing").join("state.json"),
            tracker,
            LedgerPolicy::default(),
        );

        let later = Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap();
        assert!(run_once(&state, later).await.is_none());

        let working = AppState::new(
            dir.path().join("state.json"),
            state.tracker.read().await.clone(),
            LedgerPolicy::default(),
        );
        let report = run_once(&working, later).await.unwrap();
        assert_eq!(report.expired, 2);
        assert_eq!(run_once(&working, later).await, Some(SweepReport::default()));
    }
}
