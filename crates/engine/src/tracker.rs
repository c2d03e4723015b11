use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, error, info, warn};

use common::{
    Config, Error, NewAlert, Notifier, PriceAlert, PriceFeed, PriceMovement, PriceRecord,
    Result, SwapQuote, TokenPrice, TokenQuote,
};
use store::PriceStore;

/// Network every quote is requested on (Ethereum mainnet).
pub const CHAIN: &str = "0x1";

/// Tokens sampled on every tracking cycle: stETH and MATIC.
pub const WATCH_LIST: [&str; 2] = [
    "0xae7ab96520de3a18e5e111b5eaab095312d7fe84",
    "0x7d1afa7b718fb893db30a3abc0cfc608aacfebb0",
];

/// Base leg of the swap quote (WETH).
pub const WETH_ADDRESS: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
/// Quote leg of the swap quote (WBTC).
pub const WBTC_ADDRESS: &str = "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599";

/// Trailing window the movement baseline is taken from.
pub const MOVEMENT_WINDOW_SECS: i64 = 60 * 60;
/// A move strictly above this many percent raises a notification.
pub const MOVEMENT_THRESHOLD_PCT: f64 = 3.0;
/// Flat fee taken on a swap, as a fraction of the ETH amount.
pub const SWAP_FEE_RATE: f64 = 0.03;

/// Runtime knobs for the tracker. Everything else is a compiled-in constant.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub movement_recipients: Vec<String>,
    pub feed_timeout: Duration,
    pub notify_timeout: Duration,
    pub store_timeout: Duration,
}

impl TrackerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            movement_recipients: cfg.alert_recipients.clone(),
            feed_timeout: cfg.feed_timeout,
            notify_timeout: cfg.notify_timeout,
            store_timeout: cfg.store_timeout,
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            movement_recipients: Vec::new(),
            feed_timeout: Duration::from_secs(10),
            notify_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// The price tracking and alerting engine.
///
/// Holds no mutable state of its own: every piece of shared state lives in
/// the `PriceStore`, so any number of callers (scheduled ticks, API requests)
/// may run its operations concurrently. Each outbound call carries its own
/// deadline; a call that overruns is dropped, which cancels it.
pub struct Tracker {
    feed: Arc<dyn PriceFeed>,
    notifier: Arc<dyn Notifier>,
    store: PriceStore,
    settings: TrackerSettings,
}

impl Tracker {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        notifier: Arc<dyn Notifier>,
        store: PriceStore,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            feed,
            notifier,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    /// Quote the watch-list and append one record per quote.
    ///
    /// The batch is stored in a single transaction: if the feed or the store
    /// fails, nothing from this cycle is persisted.
    pub async fn fetch_and_persist_prices(&self) -> Result<Vec<PriceRecord>> {
        let watch_list: Vec<String> = WATCH_LIST.iter().map(|s| s.to_string()).collect();

        let quotes = within(
            self.settings.feed_timeout,
            Error::FeedUnavailable,
            self.feed.fetch_multiple_prices(CHAIN, &watch_list),
        )
        .await?;

        let now = now_millis();
        let records: Vec<PriceRecord> = quotes.into_iter().map(|q| to_record(q, now)).collect();

        within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store.append_batch(&records),
        )
        .await?;

        info!(count = records.len(), "Prices tracked");
        Ok(records)
    }

    /// Run a fresh fetch cycle, then compare each token's new price with the
    /// oldest sample recorded for it in the trailing hour.
    ///
    /// The baseline excludes records written by this cycle; a token with no
    /// earlier sample in the window is skipped. Stateless across cycles: a
    /// sustained move notifies on every cycle until it falls back under the
    /// threshold. A failed notification is logged and does not stop the
    /// remaining tokens.
    pub async fn evaluate_movement_and_alert(&self) -> Result<Vec<PriceMovement>> {
        let current = self.fetch_and_persist_prices().await?;
        let mut movements = Vec::new();

        for record in &current {
            let history = within(
                self.settings.store_timeout,
                Error::StoreTimeout,
                self.store.query_window(
                    record.timestamp - chrono::Duration::seconds(MOVEMENT_WINDOW_SECS),
                    record.timestamp,
                    Some(&record.token_address),
                ),
            )
            .await?;

            let Some(baseline) = history.first().filter(|r| r.timestamp < record.timestamp) else {
                debug!(token = %record.token_address, "No baseline in window, skipping");
                continue;
            };

            let Some(change) = percent_change(baseline.usd_price, record.usd_price) else {
                warn!(token = %record.token_address, baseline = baseline.usd_price, "Unusable baseline price");
                continue;
            };

            if change <= MOVEMENT_THRESHOLD_PCT {
                continue;
            }

            let mut movement = PriceMovement {
                token_address: record.token_address.clone(),
                previous_price: baseline.usd_price,
                current_price: record.usd_price,
                percent_change: change,
                notified: false,
            };

            info!(
                token = %movement.token_address,
                previous = movement.previous_price,
                current = movement.current_price,
                change_pct = change,
                "Price movement over threshold"
            );

            movement.notified = self.notify_movement(&movement).await;
            movements.push(movement);
        }

        Ok(movements)
    }

    async fn notify_movement(&self, movement: &PriceMovement) -> bool {
        if self.settings.movement_recipients.is_empty() {
            warn!(token = %movement.token_address, "No movement recipients configured");
            return false;
        }

        let (subject, body) = movement_message(movement);
        match within(
            self.settings.notify_timeout,
            Error::NotifierFailure,
            self.notifier
                .send(&self.settings.movement_recipients, &subject, &body),
        )
        .await
        {
            Ok(delivery_id) => {
                debug!(token = %movement.token_address, %delivery_id, "Movement notification sent");
                true
            }
            Err(e) => {
                error!(token = %movement.token_address, error = %e, "Movement notification failed");
                false
            }
        }
    }

    /// Check every pending alert against a live quote and fire those whose
    /// target is reached. Returns the alerts fired by this call.
    ///
    /// Failures are isolated per alert: a feed or notifier error is logged
    /// and the loop moves on. Only loading the pending alerts is fatal.
    /// A delivery the notifier definitely rejected is retried next tick; one
    /// whose outcome is unknown keeps its claim and is never sent again.
    pub async fn evaluate_target_alerts(&self) -> Result<Vec<PriceAlert>> {
        let pending = within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store.list_untriggered_alerts(),
        )
        .await?;

        let mut fired = Vec::new();
        for alert in pending {
            match self.evaluate_alert(&alert).await {
                Ok(Some(done)) => fired.push(done),
                Ok(None) => {}
                Err(e) => {
                    warn!(alert_id = %alert.id, token = %alert.token_address, error = %e, "Alert evaluation failed");
                }
            }
        }

        if !fired.is_empty() {
            info!(count = fired.len(), "Target alerts fired");
        }
        Ok(fired)
    }

    async fn evaluate_alert(&self, alert: &PriceAlert) -> Result<Option<PriceAlert>> {
        let price = within(
            self.settings.feed_timeout,
            Error::FeedUnavailable,
            self.feed.fetch_single_price(CHAIN, &alert.token_address),
        )
        .await?;

        if !alert.is_reached_by(price.usd_price) {
            return Ok(None);
        }

        // Only the caller holding the lease may notify.
        let claimed = within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store.claim_alert(&alert.id, now_millis()),
        )
        .await?;
        if !claimed {
            debug!(alert_id = %alert.id, "Alert already claimed");
            return Ok(None);
        }

        let (subject, body) = target_message(alert, &price);
        let limit = self.settings.notify_timeout;
        let sent = tokio::time::timeout(
            limit,
            self.notifier
                .send(std::slice::from_ref(&alert.email), &subject, &body),
        )
        .await;

        let delivery_id = match sent {
            Ok(Ok(delivery_id)) => delivery_id,
            Ok(Err(Error::NotifierFailure(reason))) => {
                self.release_claim(&alert.id).await;
                return Err(Error::NotifierFailure(reason));
            }
            Ok(Err(e)) => {
                error!(alert_id = %alert.id, error = %e, "Alert delivery outcome unknown, keeping claim");
                return Err(e);
            }
            Err(_) => {
                error!(alert_id = %alert.id, ?limit, "Alert delivery timed out, keeping claim");
                return Err(Error::DeliveryUnknown(format!("no response within {limit:?}")));
            }
        };

        let triggered_at = now_millis();
        let marked = within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store.mark_triggered(&alert.id, triggered_at),
        )
        .await;
        let marked = match marked {
            Ok(marked) => marked,
            Err(e) => {
                error!(alert_id = %alert.id, %delivery_id, error = %e, "Alert delivered but not marked triggered");
                return Err(e);
            }
        };
        if !marked {
            warn!(alert_id = %alert.id, "Alert was already triggered");
            return Ok(None);
        }

        info!(alert_id = %alert.id, %delivery_id, price = price.usd_price, "Target alert fired");
        Ok(Some(PriceAlert {
            triggered: true,
            triggered_at: Some(triggered_at),
            ..alert.clone()
        }))
    }

    /// Hand a lease back after a delivery that definitely did not go out.
    async fn release_claim(&self, id: &str) {
        let released = within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store.release_claim(id),
        )
        .await;
        if let Err(e) = released {
            error!(alert_id = id, error = %e, "Failed to release alert claim");
        }
    }

    /// Records from the last `hours` hours, oldest first.
    pub async fn get_recent_window(&self, hours: i64) -> Result<Vec<PriceRecord>> {
        if hours <= 0 {
            return Err(Error::InvalidInput(format!(
                "window must be a positive number of hours, got {hours}"
            )));
        }

        let now = now_millis();
        within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store
                .query_window(now - chrono::Duration::hours(hours), now, None),
        )
        .await
    }

    /// Quote converting `eth_amount` ETH into BTC with the flat swap fee.
    /// Both legs are quoted live; if either fails, nothing is returned.
    pub async fn get_swap_quote(&self, eth_amount: f64) -> Result<SwapQuote> {
        if !eth_amount.is_finite() || eth_amount < 0.0 {
            return Err(Error::InvalidInput(format!(
                "eth amount must be a non-negative number, got {eth_amount}"
            )));
        }

        let (eth, btc) = tokio::try_join!(
            within(
                self.settings.feed_timeout,
                Error::FeedUnavailable,
                self.feed.fetch_single_price(CHAIN, WETH_ADDRESS),
            ),
            within(
                self.settings.feed_timeout,
                Error::FeedUnavailable,
                self.feed.fetch_single_price(CHAIN, WBTC_ADDRESS),
            ),
        )?;

        swap_quote(eth_amount, eth.usd_price, btc.usd_price)
    }

    pub async fn create_alert(&self, new: NewAlert) -> Result<PriceAlert> {
        validate_alert(&new)?;
        within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store.create_alert(&new),
        )
        .await
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<PriceAlert>> {
        within(
            self.settings.store_timeout,
            Error::StoreTimeout,
            self.store.get_alert(id),
        )
        .await
    }
}

/// Await `fut`, failing with `on_timeout` once `limit` elapses.
async fn within<T, F>(limit: Duration, on_timeout: fn(String) -> Error, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("no response within {limit:?}"))),
    }
}

/// Current time at the precision the store keeps, so returned values match
/// what a later read sees.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Round a feed percentage to the nearest whole percent, halves upward.
pub fn round_percent(raw: f64) -> i64 {
    (raw + 0.5).floor() as i64
}

fn to_record(quote: TokenQuote, timestamp: DateTime<Utc>) -> PriceRecord {
    PriceRecord {
        percent_change_24h: quote.percent_change_24h_raw.map(round_percent),
        token_address: quote.token_address,
        usd_price: quote.usd_price,
        usd_price_formatted: quote.usd_price_formatted,
        timestamp,
    }
}

/// Relative change from `baseline` to `current` in percent.
pub fn percent_change(baseline: f64, current: f64) -> Option<f64> {
    if !baseline.is_finite() || !current.is_finite() || baseline <= 0.0 {
        return None;
    }
    Some((current - baseline) / baseline * 100.0)
}

pub fn swap_quote(eth_amount: f64, eth_price_usd: f64, btc_price_usd: f64) -> Result<SwapQuote> {
    if !btc_price_usd.is_finite() || btc_price_usd <= 0.0 {
        return Err(Error::FeedUnavailable(format!(
            "unusable BTC price: {btc_price_usd}"
        )));
    }
    if !eth_price_usd.is_finite() || eth_price_usd < 0.0 {
        return Err(Error::FeedUnavailable(format!(
            "unusable ETH price: {eth_price_usd}"
        )));
    }

    let eth_fee = eth_amount * SWAP_FEE_RATE;
    Ok(SwapQuote {
        btc_amount: eth_amount / btc_price_usd,
        eth_fee,
        dollar_fee: eth_fee * eth_price_usd,
    })
}

fn validate_alert(new: &NewAlert) -> Result<()> {
    if new.token_address.trim().is_empty() {
        return Err(Error::InvalidInput("token_address must not be empty".into()));
    }
    if !new.target_price.is_finite() || new.target_price <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "target_price must be a positive number, got {}",
            new.target_price
        )));
    }
    if !new.email.contains('@') {
        return Err(Error::InvalidInput(format!(
            "email is not an address: '{}'",
            new.email
        )));
    }
    Ok(())
}

fn movement_message(movement: &PriceMovement) -> (String, String) {
    let subject = format!("Price movement alert: {}", movement.token_address);
    let body = format!(
        "Token {token} moved {change:.2}% within the last hour.\n\
         Previous price: ${previous}\n\
         Current price: ${current}\n\
         Change: {change:.2}%",
        token = movement.token_address,
        previous = movement.previous_price,
        current = movement.current_price,
        change = movement.percent_change,
    );
    (subject, body)
}

fn target_message(alert: &PriceAlert, price: &TokenPrice) -> (String, String) {
    let subject = format!("Price target reached: {}", alert.token_address);
    let body = format!(
        "Token {token} is now trading at ${current}, reaching your target of ${target}.",
        token = alert.token_address,
        current = price.usd_price_formatted,
        target = alert.target_price,
    );
    (subject, body)
}
