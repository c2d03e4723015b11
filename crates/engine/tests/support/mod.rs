#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use common::{Error, Notifier, PriceFeed, Result, TokenPrice, TokenQuote};
use engine::{Tracker, TrackerSettings};
use store::PriceStore;

/// Price feed whose quotes are set by the test.
#[derive(Default)]
pub struct FakeFeed {
    prices: Mutex<HashMap<String, f64>>,
    changes: Mutex<HashMap<String, f64>>,
    broken_tokens: Mutex<HashSet<String>>,
    batch_down: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub single_calls: AtomicUsize,
}

impl FakeFeed {
    pub fn set_price(&self, token: &str, price: f64) {
        self.prices.lock().unwrap().insert(token.to_string(), price);
    }

    pub fn set_change(&self, token: &str, raw_pct: f64) {
        self.changes.lock().unwrap().insert(token.to_string(), raw_pct);
    }

    pub fn break_token(&self, token: &str) {
        self.broken_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn set_batch_down(&self, down: bool) {
        self.batch_down.store(down, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn maybe_stall(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }

    fn price_of(&self, token: &str) -> Result<f64> {
        if self.broken_tokens.lock().unwrap().contains(token) {
            return Err(Error::FeedUnavailable(format!("no route to {token}")));
        }
        self.prices
            .lock()
            .unwrap()
            .get(token)
            .copied()
            .ok_or_else(|| Error::FeedUnavailable(format!("unknown token {token}")))
    }
}

#[async_trait]
impl PriceFeed for FakeFeed {
    async fn fetch_multiple_prices(
        &self,
        _chain: &str,
        token_addresses: &[String],
    ) -> Result<Vec<TokenQuote>> {
        self.maybe_stall().await;
        if self.batch_down.load(Ordering::SeqCst) {
            return Err(Error::FeedUnavailable("batch endpoint down".into()));
        }

        let prices = self.prices.lock().unwrap();
        let changes = self.changes.lock().unwrap();
        Ok(token_addresses
            .iter()
            .filter_map(|addr| {
                prices.get(addr).map(|&price| TokenQuote {
                    token_address: addr.clone(),
                    usd_price: price,
                    usd_price_formatted: format!("{price}"),
                    percent_change_24h_raw: changes.get(addr).copied(),
                })
            })
            .collect())
    }

    async fn fetch_single_price(&self, _chain: &str, token_address: &str) -> Result<TokenPrice> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        let price = self.price_of(token_address)?;
        Ok(TokenPrice {
            usd_price: price,
            usd_price_formatted: format!("{price}"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Notifier that records every delivery and can be switched to fail, to
/// report an unknown outcome, or to hang after handing the message off.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
    outcome_unknown: AtomicBool,
    stall_after_send: Mutex<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_outcome_unknown(&self, unknown: bool) {
        self.outcome_unknown.store(unknown, Ordering::SeqCst);
    }

    pub fn set_stall_after_send(&self, stall: Duration) {
        *self.stall_after_send.lock().unwrap() = Some(stall);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<String> {
        // Yield so concurrent evaluations genuinely interleave.
        tokio::task::yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::NotifierFailure("smtp relay refused".into()));
        }
        let delivery_id = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(SentMessage {
                to: to.to_vec(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            format!("delivery-{}", sent.len())
        };

        let stall = *self.stall_after_send.lock().unwrap();
        if let Some(d) = stall {
            tokio::time::sleep(d).await;
        }
        if self.outcome_unknown.load(Ordering::SeqCst) {
            return Err(Error::DeliveryUnknown("connection reset after send".into()));
        }
        Ok(delivery_id)
    }
}

pub struct Harness {
    pub tracker: Arc<Tracker>,
    pub feed: Arc<FakeFeed>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: PriceStore,
}

pub async fn harness() -> Harness {
    harness_with(TrackerSettings {
        movement_recipients: vec!["ops@example.com".to_string()],
        ..TrackerSettings::default()
    })
    .await
}

pub async fn harness_with(settings: TrackerSettings) -> Harness {
    let store = PriceStore::in_memory().await.expect("in-memory store");
    let feed = Arc::new(FakeFeed::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let tracker = Arc::new(Tracker::new(
        feed.clone(),
        notifier.clone(),
        store.clone(),
        settings,
    ));
    Harness {
        tracker,
        feed,
        notifier,
        store,
    }
}
