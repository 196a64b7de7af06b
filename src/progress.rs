//! Progress extraction strategies
//!
//! Exactly one strategy runs per job:
//! - [`DerivedProgress`] turns parseable worker output lines into events
//! - [`SyntheticProgress`] fabricates a slowly rising percentage for workers
//!   that print nothing until they exit

use crate::event_bus::EventBus;
use crate::types::ProgressEvent;
use crate::worker::parse_progress_line;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Line-by-line progress derivation for one job
///
/// Percentages never go backwards: yt-dlp restarts at 0% for the audio stream
/// of a merged download, and those samples are dropped rather than published.
#[derive(Debug, Default)]
pub struct DerivedProgress {
    last: u8,
}

impl DerivedProgress {
    /// Start at 0%
    pub fn new() -> Self {
        Self::default()
    }

    /// Event for this line, if it carries progress that does not regress
    pub fn observe(&mut self, line: &str) -> Option<ProgressEvent> {
        let sample = parse_progress_line(line)?;
        if sample.percent < self.last {
            return None;
        }
        self.last = sample.percent;

        Some(ProgressEvent::Downloading {
            progress: sample.percent,
            message: format!("Downloading: {}%", sample.percent),
            downloaded: Some(sample.downloaded),
            total: sample.total,
        })
    }

    /// Highest percentage published so far
    pub fn last(&self) -> u8 {
        self.last
    }
}

/// Time-based progress approximation running on its own task
///
/// Counts up by one every `interval`, starting from 0 and stopping at `cap`.
/// [`stop`](Self::stop) cancels the ticker and waits for the task to finish, so
/// once it returns no further `downloading` event can be published. Dropping
/// the handle cancels the ticker as well.
pub struct SyntheticProgress {
    token: CancellationToken,
    handle: Option<JoinHandle<u8>>,
}

impl SyntheticProgress {
    /// Spawn the ticker
    pub fn start(bus: EventBus, interval: Duration, cap: u8) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(tick(bus, interval, cap, token.clone()));
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Cancel the ticker and wait until it has exited
    ///
    /// Returns the last percentage it published.
    pub async fn stop(mut self) -> u8 {
        self.token.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(0),
            None => 0,
        }
    }

    /// Whether the ticker has been told to stop
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SyntheticProgress {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn tick(bus: EventBus, interval: Duration, cap: u8, token: CancellationToken) -> u8 {
    let mut progress = 0u8;

    while progress < cap && !token.is_cancelled() {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        // Re-check after the sleep: cancellation may have raced the timer.
        if token.is_cancelled() {
            break;
        }

        progress += 1;
        bus.publish(&ProgressEvent::downloading(
            progress,
            format!("Downloading: {progress}%"),
        ));
    }

    tracing::debug!(progress, "synthetic progress stopped");
    progress
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::Subscription;

    fn drain(sub: &mut Subscription) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(payload) = sub.try_recv() {
            events.push(serde_json::from_str(&payload).unwrap());
        }
        events
    }

    #[test]
    fn derived_progress_reports_matching_lines() {
        let mut derived = DerivedProgress::new();

        let event = derived.observe("512000/1024000 50.0% 00:10").unwrap();
        assert_eq!(
            event,
            ProgressEvent::Downloading {
                progress: 50,
                message: "Downloading: 50%".into(),
                downloaded: Some(512_000),
                total: Some(1_024_000),
            }
        );
        assert!(derived.observe("abc/1024000 x").is_none());
        assert!(derived.observe("[youtube] Extracting URL").is_none());
        assert_eq!(derived.last(), 50);
    }

    #[test]
    fn derived_progress_never_regresses() {
        let mut derived = DerivedProgress::new();

        assert!(derived.observe("900/1000 90.0% 00:01").is_some());
        // Second stream of a merged download restarts at zero.
        assert!(derived.observe("10/1000 1.0% 00:20").is_none());
        assert_eq!(
            derived.observe("950/1000 95.0% 00:00").unwrap().progress(),
            Some(95)
        );
    }

    #[tokio::test]
    async fn synthetic_progress_counts_up_to_cap() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        let ticker = SyntheticProgress::start(bus.clone(), Duration::from_millis(5), 3);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ticker.stop().await, 3);

        let progress: Vec<_> = drain(&mut sub).iter().filter_map(|e| e.progress()).collect();
        assert_eq!(progress, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn synthetic_progress_is_silent_after_stop() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let ticker = SyntheticProgress::start(bus.clone(), Duration::from_millis(5), 95);
        tokio::time::sleep(Duration::from_millis(40)).await;
        let last = ticker.stop().await;

        let before = drain(&mut sub);
        assert_eq!(before.len(), usize::from(last));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(drain(&mut sub).is_empty(), "no ticks after stop");
    }

    #[tokio::test]
    async fn synthetic_progress_stops_before_first_tick() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        let ticker = SyntheticProgress::start(bus.clone(), Duration::from_secs(60), 95);
        assert_eq!(ticker.stop().await, 0);
        assert!(drain(&mut sub).is_empty());
    }

    #[tokio::test]
    async fn dropping_synthetic_progress_cancels_it() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let ticker = SyntheticProgress::start(bus.clone(), Duration::from_millis(5), 95);
        drop(ticker);
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(drain(&mut sub).len() <= 1);
    }
}
