use crate::db::{
    errors::{DbError, Result},
    models::applications::{ApplicationCreateDBRequest, ApplicationDBResponse, ApplicationStatus},
};
use crate::types::{ApplicationId, ShiftId, UserId};
use sqlx::PgConnection;

pub struct Applications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Applications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new pending application.
    ///
    /// The `UNIQUE (shift_id, provider_id)` constraint surfaces double
    /// applications as [`DbError::UniqueViolation`].
    pub async fn create(&mut self, request: &ApplicationCreateDBRequest) -> Result<ApplicationDBResponse> {
        let application = sqlx::query_as::<_, ApplicationDBResponse>(
            r#"
            INSERT INTO shift_applications (shift_id, provider_id, message)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.shift_id)
        .bind(request.provider_id)
        .bind(&request.message)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(application)
    }

    pub async fn get_by_id(&mut self, id: ApplicationId) -> Result<Option<ApplicationDBResponse>> {
        let application =
            sqlx::query_as::<_, ApplicationDBResponse>("SELECT * FROM shift_applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(application)
    }

    pub async fn list_for_shift(&mut self, shift_id: ShiftId) -> Result<Vec<ApplicationDBResponse>> {
        let applications = sqlx::query_as::<_, ApplicationDBResponse>(
            "SELECT * FROM shift_applications WHERE shift_id = $1 ORDER BY created_at ASC",
        )
        .bind(shift_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(applications)
    }

    pub async fn list_for_provider(&mut self, provider_id: UserId) -> Result<Vec<ApplicationDBResponse>> {
        let applications = sqlx::query_as::<_, ApplicationDBResponse>(
            "SELECT * FROM shift_applications WHERE provider_id = $1 ORDER BY created_at DESC",
        )
        .bind(provider_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(applications)
    }

    /// Transition an application from `pending` to the given status.
    ///
    /// Returns [`DbError::StaleState`] when the application is no longer
    /// pending: it was accepted, rejected or withdrawn under a concurrent
    /// request.
    pub async fn resolve_pending(
        &mut self,
        id: ApplicationId,
        to: ApplicationStatus,
    ) -> Result<ApplicationDBResponse> {
        let application = sqlx::query_as::<_, ApplicationDBResponse>(
            r#"
            UPDATE shift_applications
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to)
        .fetch_optional(&mut *self.db)
        .await?;

        application.ok_or(DbError::StaleState {
            entity: "application",
            id: id.to_string(),
            expected: "pending",
        })
    }

    /// Count accepted applications on a shift. This is the quantity the
    /// headcount bounds: an acceptance consumes a slot permanently, even if
    /// the booking it produced is later cancelled.
    pub async fn count_accepted_for_shift(&mut self, shift_id: ShiftId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shift_applications WHERE shift_id = $1 AND status = 'accepted'")
                .bind(shift_id)
                .fetch_one(&mut *self.db)
                .await?;

        Ok(count)
    }

    /// Reject every remaining pending application on a shift, returning the
    /// rejected rows so callers can notify the affected providers.
    pub async fn reject_pending_for_shift(&mut self, shift_id: ShiftId) -> Result<Vec<ApplicationDBResponse>> {
        let rejected = sqlx::query_as::<_, ApplicationDBResponse>(
            r#"
            UPDATE shift_applications
            SET status = 'rejected', updated_at = NOW()
            WHERE shift_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(shift_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rejected)
    }
}
