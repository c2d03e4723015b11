use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::debug;

use common::{PriceRecord, Result};

use crate::{from_millis, to_millis, PriceStore};

#[derive(FromRow)]
struct PriceRecordRow {
    token_address: String,
    usd_price: f64,
    usd_price_formatted: String,
    percent_change_24h: Option<i64>,
    timestamp: i64,
}

impl TryFrom<PriceRecordRow> for PriceRecord {
    type Error = sqlx::Error;

    fn try_from(row: PriceRecordRow) -> Result<Self, Self::Error> {
        Ok(PriceRecord {
            token_address: row.token_address,
            usd_price: row.usd_price,
            usd_price_formatted: row.usd_price_formatted,
            percent_change_24h: row.percent_change_24h,
            timestamp: from_millis(row.timestamp)?,
        })
    }
}

impl PriceStore {
    /// Append one price observation.
    pub async fn append(&self, record: &PriceRecord) -> Result<()> {
        let mut tx = self.db.begin().await?;
        insert_record(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Append a whole fetch cycle. Either every record is stored or none is.
    pub async fn append_batch(&self, records: &[PriceRecord]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for record in records {
            insert_record(&mut tx, record).await?;
        }
        tx.commit().await?;
        debug!(count = records.len(), "Price batch appended");
        Ok(())
    }

    /// Records with `start <= timestamp <= end`, optionally for one token,
    /// ordered by timestamp ascending (insertion order breaks ties).
    pub async fn query_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        token_address: Option<&str>,
    ) -> Result<Vec<PriceRecord>> {
        let rows: Vec<PriceRecordRow> = sqlx::query_as(
            r#"
            SELECT token_address, usd_price, usd_price_formatted, percent_change_24h, timestamp
            FROM price_records
            WHERE timestamp >= ?1 AND timestamp <= ?2
              AND (?3 IS NULL OR token_address = ?3)
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(to_millis(start))
        .bind(to_millis(end))
        .bind(token_address)
        .fetch_all(&self.db)
        .await?;

        let records = rows
            .into_iter()
            .map(PriceRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

async fn insert_record(tx: &mut Transaction<'_, Sqlite>, record: &PriceRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO price_records (token_address, usd_price, usd_price_formatted, percent_change_24h, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&record.token_address)
    .bind(record.usd_price)
    .bind(&record.usd_price_formatted)
    .bind(record.percent_change_24h)
    .bind(to_millis(record.timestamp))
    .execute(&mut **tx)
    .await?;
    Ok(())
}
