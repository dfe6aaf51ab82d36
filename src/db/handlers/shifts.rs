use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::shifts::{ShiftCreateDBRequest, ShiftDBResponse, ShiftFilter, ShiftStatus},
};
use crate::types::ShiftId;
use sqlx::PgConnection;

pub struct Shifts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Shifts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Get a shift row with a row-level lock, blocking concurrent acceptors.
    ///
    /// Must be called inside a transaction; the lock is held until commit.
    pub async fn get_for_update(&mut self, id: ShiftId) -> Result<Option<ShiftDBResponse>> {
        let shift = sqlx::query_as::<_, ShiftDBResponse>("SELECT * FROM shifts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(shift)
    }

    /// Transition a shift's status, guarded by its expected current status.
    ///
    /// Returns [`DbError::StaleState`] when the shift has moved on under a
    /// concurrent request.
    pub async fn set_status(&mut self, id: ShiftId, from: ShiftStatus, to: ShiftStatus) -> Result<ShiftDBResponse> {
        let shift = sqlx::query_as::<_, ShiftDBResponse>(
            r#"
            UPDATE shifts
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *self.db)
        .await?;

        shift.ok_or(DbError::StaleState {
            entity: "shift",
            id: id.to_string(),
            expected: status_name(from),
        })
    }
}

fn status_name(status: ShiftStatus) -> &'static str {
    match status {
        ShiftStatus::Open => "open",
        ShiftStatus::Filled => "filled",
        ShiftStatus::Completed => "completed",
        ShiftStatus::Cancelled => "cancelled",
    }
}

#[async_trait::async_trait]
impl Repository for Shifts<'_> {
    type CreateRequest = ShiftCreateDBRequest;
    type Response = ShiftDBResponse;
    type Id = ShiftId;
    type Filter = ShiftFilter;

    async fn create(&mut self, request: &ShiftCreateDBRequest) -> Result<ShiftDBResponse> {
        let shift = sqlx::query_as::<_, ShiftDBResponse>(
            r#"
            INSERT INTO shifts (requester_id, title, description, location, starts_at, ends_at, hourly_rate, headcount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.requester_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.hourly_rate)
        .bind(request.headcount)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(shift)
    }

    async fn get_by_id(&mut self, id: ShiftId) -> Result<Option<ShiftDBResponse>> {
        let shift = sqlx::query_as::<_, ShiftDBResponse>("SELECT * FROM shifts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(shift)
    }

    async fn list(&mut self, filter: &ShiftFilter) -> Result<Vec<ShiftDBResponse>> {
        let shifts = sqlx::query_as::<_, ShiftDBResponse>(
            r#"
            SELECT * FROM shifts
            WHERE ($1::uuid IS NULL OR requester_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY starts_at ASC
            OFFSET $3
            LIMIT $4
            "#,
        )
        .bind(filter.requester_id)
        .bind(filter.status)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(shifts)
    }
}
