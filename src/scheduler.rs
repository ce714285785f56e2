//! When runs happen, and making sure only one happens at a time.
//!
//! The scheduler owns the run guard. A trigger that arrives while a run is in
//! progress (a manual command during a scheduled run, or a slow tick) is
//! dropped, not queued.

use crate::config::{Config, DigestSettings, ScheduleSlot};
use crate::delivery::{DeliverySink, deliver_digest};
use crate::error::ConfigError;
use crate::fetch::PageSource;
use crate::outputs::digest::DigestFormatter;
use crate::outputs::json;
use crate::scrapers::ScrapeOrchestrator;
use chrono::{DateTime, Timelike, Utc};
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        })
    }
}

/// Holds the in-progress flag for as long as it lives.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler<S, D> {
    orchestrator: ScrapeOrchestrator<S>,
    sink: D,
    destination: String,
    digest: DigestSettings,
    schedule: Vec<ScheduleSlot>,
    message_pause_ms: u64,
    json_output_dir: Option<String>,
    running: AtomicBool,
    last_slot: Mutex<Option<String>>,
}

impl<S: PageSource, D: DeliverySink> Scheduler<S, D> {
    pub fn new(
        source: S,
        sink: D,
        config: &Config,
        json_output_dir: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            orchestrator: ScrapeOrchestrator::new(source, config)?,
            sink,
            destination: config.destination.clone(),
            digest: config.digest.clone(),
            schedule: config.schedule.clone(),
            message_pause_ms: config.pacing.message_pause_ms,
            json_output_dir,
            running: AtomicBool::new(false),
            last_slot: Mutex::new(None),
        })
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Scrape and format one digest. `None` if another run holds the guard.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Option<Vec<String>> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Run already in progress; ignoring trigger");
            return None;
        };
        Some(self.scrape_and_format(now).await)
    }

    /// Full run: scrape, format, deliver. Returns whether a run took place.
    #[instrument(level = "info", skip_all, fields(%trigger))]
    pub async fn send_digest(&self, trigger: Trigger, now: DateTime<Utc>) -> bool {
        if !self.sink.is_usable() {
            warn!("Delivery sink not usable; skipping run");
            return false;
        }
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Run already in progress; ignoring trigger");
            return false;
        };

        let t0 = Instant::now();
        let chunks = self.scrape_and_format(now).await;
        let delivered =
            deliver_digest(&self.sink, &self.destination, &chunks, self.message_pause_ms).await;
        info!(
            delivered,
            chunks = chunks.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Digest sent"
        );
        true
    }

    /// Fire a scheduled run if `now` falls on a slot that has not fired yet.
    pub async fn tick(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.orchestrator.offset());
        let Some(slot) = self
            .schedule
            .iter()
            .find(|slot| slot.hour == local.hour() && slot.minute == local.minute())
        else {
            return false;
        };

        let key = format!(
            "{}-{:02}:{:02}",
            local.format("%Y-%m-%d"),
            slot.hour,
            slot.minute
        );
        {
            let mut last = match self.last_slot.lock() {
                Ok(last) => last,
                Err(poisoned) => poisoned.into_inner(),
            };
            if last.as_deref() == Some(key.as_str()) {
                return false;
            }
            *last = Some(key.clone());
        }

        info!(slot = %key, "Scheduled slot reached");
        self.send_digest(Trigger::Scheduled, now).await
    }

    async fn scrape_and_format(&self, now: DateTime<Utc>) -> Vec<String> {
        let report = self.orchestrator.run(now).await;
        if let Some(dir) = &self.json_output_dir {
            if let Err(e) = json::write_run(&report, dir).await {
                error!(error = %e, "Failed to archive run");
            }
        }
        DigestFormatter::new(&self.digest).format(&report.results, &report.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pacing;
    use crate::delivery::fixtures::RecordingSink;
    use crate::error::FetchError;
    use crate::fetch::fixtures::FixtureSource;
    use crate::outputs::digest::NO_UPDATES;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::time::Duration;

    /// Delays every fetch so a run stays in progress across polls.
    struct SlowSource(FixtureSource);

    impl PageSource for SlowSource {
        async fn fetch(
            &self,
            url: &str,
            headers: &BTreeMap<String, String>,
        ) -> Result<String, FetchError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.fetch(url, headers).await
        }
    }

    fn config() -> Config {
        Config {
            pacing: Pacing::immediate(),
            ..Config::default()
        }
    }

    fn scheduler() -> Scheduler<SlowSource, RecordingSink> {
        Scheduler::new(
            SlowSource(FixtureSource::new(vec![])),
            RecordingSink::new(),
            &config(),
            None,
        )
        .unwrap()
    }

    /// 19:50 in León.
    fn evening_slot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 16, 1, 50, 0).unwrap()
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_while_first_in_progress() {
        let scheduler = scheduler();
        let now = evening_slot();

        let (first, (second, still_running)) = tokio::join!(scheduler.run_once(now), async {
            let second = scheduler.run_once(now).await;
            (second, scheduler.is_running())
        });

        assert!(second.is_none());
        assert!(still_running);
        // Only the first run fetched: one listing per configured site.
        assert_eq!(scheduler.orchestrator_source().0.fetched().len(), 2);
        let chunks = first.unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].ends_with(NO_UPDATES));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_tick_fires_once_per_slot() {
        let scheduler = scheduler();
        let slot = evening_slot();

        assert!(!scheduler.tick(slot - chrono::Duration::minutes(1)).await);
        assert!(scheduler.tick(slot).await);
        assert!(!scheduler.tick(slot + chrono::Duration::seconds(30)).await);
        assert_eq!(scheduler.sink().texts().len(), 1);

        // Same time next day is a new slot.
        assert!(scheduler.tick(slot + chrono::Duration::days(1)).await);
        assert_eq!(scheduler.sink().texts().len(), 2);
    }

    #[tokio::test]
    async fn test_unusable_sink_skips_run() {
        let scheduler = scheduler();
        scheduler.sink().usable.store(false, Ordering::SeqCst);

        assert!(!scheduler.send_digest(Trigger::Manual, evening_slot()).await);
        assert!(scheduler.orchestrator_source().0.fetched().is_empty());
        assert!(scheduler.sink().texts().is_empty());
    }

    #[tokio::test]
    async fn test_manual_run_delivers_to_destination() {
        let scheduler = scheduler();
        assert!(scheduler.send_digest(Trigger::Manual, evening_slot()).await);
        let sent = scheduler.sink().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Config::default().destination);
    }

    impl<S: PageSource, D: DeliverySink> Scheduler<S, D> {
        fn orchestrator_source(&self) -> &S {
            self.orchestrator.source()
        }
    }
}
