use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use common::{NewAlert, PriceAlert, PriceRecord, SwapQuote};

use crate::{auth::require_auth, ApiError, AppState};

/// Hours covered by the recent-prices endpoint.
const RECENT_WINDOW_HOURS: i64 = 24;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/track-prices", post(track_prices))
        .route("/api/alerts", post(create_alert))
        .route("/api/alerts/evaluate", post(evaluate_alerts))
        .route("/api/alerts/:id", get(get_alert))
        .route("/api/prices/last-24-hours", get(last_24_hours))
        .route("/api/swap-rate/:eth_amount", get(swap_rate))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

// ─── Tracking ─────────────────────────────────────────────────────────────────

async fn track_prices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let prices = state.tracker.fetch_and_persist_prices().await?;
    info!(count = prices.len(), "Manual tracking cycle complete");
    Ok(Json(json!({
        "message": "Prices tracked successfully",
        "prices": prices,
    })))
}

async fn last_24_hours(State(state): State<AppState>) -> Result<Json<Vec<PriceRecord>>, ApiError> {
    let records = state.tracker.get_recent_window(RECENT_WINDOW_HOURS).await?;
    Ok(Json(records))
}

// ─── Alerts ───────────────────────────────────────────────────────────────────

async fn create_alert(
    State(state): State<AppState>,
    Json(body): Json<NewAlert>,
) -> Result<(StatusCode, Json<PriceAlert>), ApiError> {
    let alert = state.tracker.create_alert(body).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn evaluate_alerts(State(state): State<AppState>) -> Result<Json<Vec<PriceAlert>>, ApiError> {
    let fired = state.tracker.evaluate_target_alerts().await?;
    Ok(Json(fired))
}

async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PriceAlert>, ApiError> {
    state
        .tracker
        .get_alert(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("alert {id}")))
}

// ─── Swap ─────────────────────────────────────────────────────────────────────

async fn swap_rate(
    State(state): State<AppState>,
    Path(eth_amount): Path<f64>,
) -> Result<Json<SwapQuote>, ApiError> {
    let quote = state.tracker.get_swap_quote(eth_amount).await?;
    Ok(Json(quote))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use common::{
        Error, NotifyMode, Notifier, PriceFeed, Result, TokenPrice, TokenQuote,
    };
    use engine::{Tracker, TrackerSettings};
    use store::PriceStore;

    use super::*;

    struct FixedFeed(f64);

    #[async_trait]
    impl PriceFeed for FixedFeed {
        async fn fetch_multiple_prices(
            &self,
            _chain: &str,
            token_addresses: &[String],
        ) -> Result<Vec<TokenQuote>> {
            Ok(token_addresses
                .iter()
                .map(|addr| TokenQuote {
                    token_address: addr.clone(),
                    usd_price: self.0,
                    usd_price_formatted: self.0.to_string(),
                    percent_change_24h_raw: Some(1.2),
                })
                .collect())
        }

        async fn fetch_single_price(&self, _chain: &str, _token: &str) -> Result<TokenPrice> {
            if self.0 <= 0.0 {
                return Err(Error::FeedUnavailable("feed offline".into()));
            }
            Ok(TokenPrice {
                usd_price: self.0,
                usd_price_formatted: self.0.to_string(),
            })
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl Notifier for NullNotifier {
        async fn send(&self, _to: &[String], _subject: &str, _body: &str) -> Result<String> {
            Ok("null".into())
        }
    }

    async fn test_app(price: f64) -> Router {
        let store = PriceStore::in_memory().await.unwrap();
        let tracker = Tracker::new(
            Arc::new(FixedFeed(price)),
            Arc::new(NullNotifier),
            store,
            TrackerSettings::default(),
        );
        crate::app(AppState {
            tracker: Arc::new(tracker),
            notify_mode: NotifyMode::DryRun,
            api_token: "secret".into(),
        })
    }

    fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", "Bearer secret")
            .header("Content-Type", "application/json")
            .body(body)
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_needs_no_token() {
        let app = test_app(10.0).await;
        let resp = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["notify_mode"], "dry-run");
    }

    #[tokio::test]
    async fn api_rejects_missing_token() {
        let app = test_app(10.0).await;
        let resp = app
            .oneshot(
                Request::get("/api/prices/last-24-hours")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn api_rejects_wrong_token_with_json_error() {
        let app = test_app(10.0).await;
        let resp = app
            .oneshot(
                Request::post("/api/track-prices")
                    .header("Authorization", "Bearer guess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"], "missing or invalid API token");
    }

    #[tokio::test]
    async fn track_then_list_recent_prices() {
        let app = test_app(10.0).await;

        let resp = app
            .clone()
            .oneshot(authed("POST", "/api/track-prices", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let tracked = json_body(resp).await;
        assert_eq!(tracked["prices"].as_array().unwrap().len(), 2);
        assert_eq!(tracked["prices"][0]["percent_change_24h"], 1);

        let resp = app
            .oneshot(authed("GET", "/api/prices/last-24-hours", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_and_fetch_alert() {
        let app = test_app(10.0).await;
        let body = json!({
            "token_address": "0xae7ab96520de3a18e5e111b5eaab095312d7fe84",
            "target_price": 50.0,
            "email": "holder@example.com",
        });

        let resp = app
            .clone()
            .oneshot(authed("POST", "/api/alerts", Body::from(body.to_string())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = json_body(resp).await;
        assert_eq!(created["triggered"], false);

        let id = created["id"].as_str().unwrap();
        let resp = app
            .oneshot(authed("GET", &format!("/api/alerts/{id}"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["target_price"], 50.0);
    }

    #[tokio::test]
    async fn invalid_alert_is_bad_request() {
        let app = test_app(10.0).await;
        let body = json!({
            "token_address": "0xabc",
            "target_price": 50.0,
            "email": "not-an-email",
        });
        let resp = app
            .oneshot(authed("POST", "/api/alerts", Body::from(body.to_string())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_alert_is_not_found() {
        let app = test_app(10.0).await;
        let resp = app
            .oneshot(authed("GET", "/api/alerts/nope", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn swap_rate_reports_feed_outage_as_bad_gateway() {
        let app = test_app(0.0).await;
        let resp = app
            .oneshot(authed("GET", "/api/swap-rate/1.5", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
