use chrono::{DateTime, SubsecRound, Utc};
use sqlx::FromRow;
use tracing::{debug, info};

use common::{NewAlert, PriceAlert, Result};

use crate::{from_millis, to_millis, PriceStore};

#[derive(FromRow)]
struct PriceAlertRow {
    id: String,
    token_address: String,
    target_price: f64,
    email: String,
    triggered: bool,
    created_at: i64,
    triggered_at: Option<i64>,
}

impl TryFrom<PriceAlertRow> for PriceAlert {
    type Error = sqlx::Error;

    fn try_from(row: PriceAlertRow) -> Result<Self, Self::Error> {
        Ok(PriceAlert {
            id: row.id,
            token_address: row.token_address,
            target_price: row.target_price,
            email: row.email,
            triggered: row.triggered,
            created_at: from_millis(row.created_at)?,
            triggered_at: row.triggered_at.map(from_millis).transpose()?,
        })
    }
}

impl PriceStore {
    /// Register a new alert in the `Pending` state.
    pub async fn create_alert(&self, new: &NewAlert) -> Result<PriceAlert> {
        let alert = PriceAlert {
            id: uuid::Uuid::new_v4().to_string(),
            token_address: new.token_address.clone(),
            target_price: new.target_price,
            email: new.email.clone(),
            triggered: false,
            created_at: Utc::now().trunc_subsecs(3),
            triggered_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO price_alerts (id, token_address, target_price, email, triggered, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.token_address)
        .bind(alert.target_price)
        .bind(&alert.email)
        .bind(to_millis(alert.created_at))
        .execute(&self.db)
        .await?;

        info!(alert_id = %alert.id, token = %alert.token_address, target = alert.target_price, "Price alert created");
        Ok(alert)
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<PriceAlert>> {
        let row: Option<PriceAlertRow> = sqlx::query_as(
            r#"
            SELECT id, token_address, target_price, email, triggered, created_at, triggered_at
            FROM price_alerts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(PriceAlert::try_from).transpose()?)
    }

    /// Alerts still waiting for their target and not held by an in-flight
    /// delivery, oldest first.
    pub async fn list_untriggered_alerts(&self) -> Result<Vec<PriceAlert>> {
        let rows: Vec<PriceAlertRow> = sqlx::query_as(
            r#"
            SELECT id, token_address, target_price, email, triggered, created_at, triggered_at
            FROM price_alerts
            WHERE triggered = 0 AND claimed_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let alerts = rows
            .into_iter()
            .map(PriceAlert::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    /// Take the delivery lease on a pending alert. Of any number of
    /// concurrent callers for the same alert, at most one sees `true`, and no
    /// caller sees `true` again until the lease is released.
    pub async fn claim_alert(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE price_alerts
            SET claimed_at = ?1
            WHERE id = ?2 AND triggered = 0 AND claimed_at IS NULL
            "#,
        )
        .bind(to_millis(at))
        .bind(id)
        .execute(&self.db)
        .await?;

        let claimed = result.rows_affected() == 1;
        debug!(alert_id = id, claimed, "Alert claim attempted");
        Ok(claimed)
    }

    /// Flip `triggered` to true, stamping `triggered_at` with `at`, only if it
    /// is still false. Returns whether this call made the transition.
    /// Nothing ever sets `triggered` back to false.
    pub async fn mark_triggered(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE price_alerts
            SET triggered = 1, triggered_at = ?1
            WHERE id = ?2 AND triggered = 0
            "#,
        )
        .bind(to_millis(at))
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Drop the delivery lease on an alert that has not fired, making it
    /// eligible for evaluation again. Returns whether a lease was dropped.
    pub async fn release_claim(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE price_alerts
            SET claimed_at = NULL
            WHERE id = ?1 AND triggered = 0 AND claimed_at IS NOT NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
