//! Handing digest chunks to the chat transport.
//!
//! # Architecture
//!
//! - [`DeliverySink`]: core trait, one text chunk to one destination
//! - [`ConsoleSink`]: prints chunks to stdout (dry runs, local testing)
//! - [`WebhookSink`]: POSTs `{"to", "text"}` JSON to a messaging bridge
//! - [`RetrySink`]: decorator adding exponential backoff to any sink
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), 30s) + random_jitter(0..250ms)
//! ```
//!
//! A chunk that still fails after `max_retries` is dropped and logged. Nothing
//! about the failure is ever sent to the destination.

use crate::config::DeliverySettings;
use crate::error::DeliveryError;
use crate::utils::{pause, truncate_for_log};
use rand::{Rng, rng};
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Anything that can deliver a text message to a destination identifier.
pub trait DeliverySink: Send + Sync {
    /// Whether the transport is currently able to send. Runs are skipped otherwise.
    fn is_usable(&self) -> bool;

    fn send(
        &self,
        destination: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

#[derive(Debug, Default)]
pub struct ConsoleSink;

impl DeliverySink for ConsoleSink {
    fn is_usable(&self) -> bool {
        true
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        println!("── to {destination} ──\n{text}\n");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    to: &'a str,
    text: &'a str,
}

/// Sends chunks to an HTTP bridge in front of the chat client.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.to_string(),
        })
    }
}

impl DeliverySink for WebhookSink {
    fn is_usable(&self) -> bool {
        !self.url.is_empty()
    }

    #[instrument(level = "debug", skip_all, fields(%destination))]
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        let t0 = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(&OutgoingMessage {
                to: destination,
                text,
            })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(%status, elapsed_ms = t0.elapsed().as_millis() as u64, "Webhook responded");
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// The sink selected at startup.
#[derive(Debug)]
pub enum Sink {
    Console(ConsoleSink),
    Webhook(WebhookSink),
}

impl DeliverySink for Sink {
    fn is_usable(&self) -> bool {
        match self {
            Sink::Console(sink) => sink.is_usable(),
            Sink::Webhook(sink) => sink.is_usable(),
        }
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        match self {
            Sink::Console(sink) => sink.send(destination, text).await,
            Sink::Webhook(sink) => sink.send(destination, text).await,
        }
    }
}

/// Wrapper that retries failed sends of any [`DeliverySink`].
pub struct RetrySink<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter_ms: u64,
}

impl<T: DeliverySink> RetrySink<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter_ms: 250,
        }
    }

    pub fn from_settings(inner: T, settings: &DeliverySettings) -> Self {
        Self::new(
            inner,
            settings.max_retries,
            Duration::from_millis(settings.base_delay_ms),
        )
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = rng().random_range(0..=self.max_jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetrySink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySink")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: DeliverySink> DeliverySink for RetrySink<T> {
    fn is_usable(&self) -> bool {
        self.inner.is_usable()
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.send(destination, text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "send() exhausted retries"
                        );
                        return Err(e);
                    }
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "send() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Send chunks in order with a fixed pause between them. Returns how many
/// were delivered; failed chunks are dropped.
#[instrument(level = "info", skip_all, fields(%destination, chunks = chunks.len()))]
pub async fn deliver_digest<D: DeliverySink>(
    sink: &D,
    destination: &str,
    chunks: &[String],
    pause_ms: u64,
) -> usize {
    let mut delivered = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            pause(pause_ms).await;
        }
        match sink.send(destination, chunk).await {
            Ok(()) => delivered += 1,
            Err(e) => error!(
                chunk = i + 1,
                preview = %truncate_for_log(chunk, 40),
                error = %e,
                "Dropping chunk"
            ),
        }
    }
    info!(delivered, total = chunks.len(), "Digest delivered");
    delivered
}

/// Sinks for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::DeliverySink;
    use crate::error::DeliveryError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records delivered chunks; the first `failures` sends fail.
    pub(crate) struct RecordingSink {
        pub(crate) sent: Mutex<Vec<(String, String)>>,
        failures: AtomicUsize,
        pub(crate) usable: AtomicBool,
    }

    impl RecordingSink {
        pub(crate) fn new() -> Self {
            Self::failing(0)
        }

        pub(crate) fn failing(failures: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failures: AtomicUsize::new(failures),
                usable: AtomicBool::new(true),
            }
        }

        pub(crate) fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl DeliverySink for RecordingSink {
        fn is_usable(&self) -> bool {
            self.usable.load(Ordering::SeqCst)
        }

        async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DeliveryError::Transport("connection closed".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), text.to_string()));
            Ok(())
        }
    }
}
