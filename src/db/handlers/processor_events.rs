use crate::db::{
    errors::Result,
    models::processor_events::{ProcessorEventCreateDBRequest, ProcessorEventDBResponse},
};
use sqlx::PgConnection;

pub struct ProcessorEvents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ProcessorEvents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Record an event, returning whether this is the first time it was seen.
    ///
    /// `ON CONFLICT DO NOTHING` on the event id primary key turns replayed
    /// webhook deliveries into no-ops; callers skip reconciliation when this
    /// returns `false`.
    pub async fn record(&mut self, request: &ProcessorEventCreateDBRequest) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processor_events (event_id, event_type, booking_id, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&request.event_id)
        .bind(&request.event_type)
        .bind(request.booking_id)
        .bind(&request.payload)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_by_id(&mut self, event_id: &str) -> Result<Option<ProcessorEventDBResponse>> {
        let event =
            sqlx::query_as::<_, ProcessorEventDBResponse>("SELECT * FROM processor_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(event)
    }
}
