//! PostgreSQL implementation of WebhookEventRepository.
//!
//! Claims are rows with `outcome = 'pending'`. The primary key on
//! `event_id` makes the claim insert atomic; an expired claim is taken over
//! by the same statement's `DO UPDATE ... WHERE`.

use std::time::Duration;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::{ClaimResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    event_type: String,
    outcome: String,
    reason: Option<String>,
    claimed_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, err))
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let outcome = WebhookOutcome::parse(&row.outcome).ok_or_else(|| {
            DomainError::database(format!("Invalid webhook outcome: {}", row.outcome))
        })?;

        Ok(WebhookEventRecord {
            event_id: EventId::new(row.event_id)
                .map_err(|e| DomainError::database(format!("Invalid event_id: {}", e)))?,
            event_type: row.event_type,
            outcome,
            reason: row.reason,
            processed_at: Timestamp::from_datetime(row.processed_at.unwrap_or(row.claimed_at)),
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, outcome, reason, claimed_at, processed_at
            FROM webhook_events
            WHERE event_id = $1 AND outcome <> 'pending'
            "#,
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load webhook event", e))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn claim(
        &self,
        event_id: &EventId,
        event_type: &str,
        lease: Duration,
    ) -> Result<ClaimResult, DomainError> {
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (event_id, event_type, outcome, claimed_at)
            VALUES ($1, $2, 'pending', NOW())
            ON CONFLICT (event_id) DO UPDATE SET claimed_at = NOW()
            WHERE webhook_events.outcome = 'pending'
              AND webhook_events.claimed_at <= NOW() - make_interval(secs => $3)
            RETURNING event_id
            "#,
        )
        .bind(event_id.as_str())
        .bind(event_type)
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to claim webhook event", e))?;

        if claimed.is_some() {
            return Ok(ClaimResult::Claimed);
        }

        match self.find_by_event_id(event_id).await? {
            Some(record) => Ok(ClaimResult::Settled(record)),
            None => Ok(ClaimResult::InFlight),
        }
    }

    async fn settle(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, event_type, outcome, reason, processed_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO UPDATE SET
                outcome = EXCLUDED.outcome,
                reason = EXCLUDED.reason,
                processed_at = EXCLUDED.processed_at
            WHERE webhook_events.outcome = 'pending'
            "#,
        )
        .bind(record.event_id.as_str())
        .bind(&record.event_type)
        .bind(record.outcome.as_str())
        .bind(&record.reason)
        .bind(record.processed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to settle webhook event", e))?;

        Ok(())
    }

    async fn release(&self, event_id: &EventId) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM webhook_events WHERE event_id = $1 AND outcome = 'pending'")
            .bind(event_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to release webhook event", e))?;

        Ok(())
    }
}
