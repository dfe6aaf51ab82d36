use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::bookings::{BookingCreateDBRequest, BookingDBResponse, BookingFilter},
};
use crate::rates::Earnings;
use crate::types::{BookingId, ShiftId};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

pub struct Bookings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Bookings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Bookings on a shift that have not reached a settled or terminal state.
    /// A shift can only be marked completed once this reaches zero.
    pub async fn count_unsettled_for_shift(&mut self, shift_id: ShiftId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE shift_id = $1 AND status IN ('confirmed', 'checked_in', 'checked_out')",
        )
        .bind(shift_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Provider arrives: `confirmed -> checked_in`.
    pub async fn check_in(&mut self, id: BookingId, at: DateTime<Utc>) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET status = 'checked_in', checked_in_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'confirmed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *self.db)
        .await?;

        booking.ok_or(DbError::StaleState {
            entity: "booking",
            id: id.to_string(),
            expected: "confirmed",
        })
    }

    /// Provider leaves: `checked_in -> checked_out`, recording the priced
    /// earnings alongside. The earnings columns are written exactly once
    /// here and never recomputed.
    pub async fn check_out(
        &mut self,
        id: BookingId,
        at: DateTime<Utc>,
        earnings: &Earnings,
    ) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET status = 'checked_out',
                checked_out_at = $2,
                quarter_hours = $3,
                provider_payout_cents = $4,
                platform_fee_cents = $5,
                requester_total_cents = $6,
                updated_at = NOW()
            WHERE id = $1 AND status = 'checked_in'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(earnings.quarter_hours)
        .bind(earnings.provider_payout_cents)
        .bind(earnings.platform_fee_cents)
        .bind(earnings.requester_total_cents)
        .fetch_optional(&mut *self.db)
        .await?;

        booking.ok_or(DbError::StaleState {
            entity: "booking",
            id: id.to_string(),
            expected: "checked_in",
        })
    }

    /// Requester flags a post-payment anomaly on a completed booking.
    pub async fn dispute(&mut self, id: BookingId) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET status = 'disputed', updated_at = NOW()
            WHERE id = $1 AND status = 'completed'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        booking.ok_or(DbError::StaleState {
            entity: "booking",
            id: id.to_string(),
            expected: "completed",
        })
    }

    /// Cancel a booking before any work product exists. Checked-out and later
    /// bookings must be settled or disputed instead.
    pub async fn cancel(&mut self, id: BookingId) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status IN ('confirmed', 'checked_in')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        booking.ok_or(DbError::StaleState {
            entity: "booking",
            id: id.to_string(),
            expected: "confirmed or checked_in",
        })
    }

    /// Cancel every booking still holding capacity on a cancelled shift,
    /// returning the cancelled rows so callers can notify providers.
    pub async fn cancel_for_shift(&mut self, shift_id: ShiftId) -> Result<Vec<BookingDBResponse>> {
        let cancelled = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = NOW()
            WHERE shift_id = $1 AND status IN ('confirmed', 'checked_in')
            RETURNING *
            "#,
        )
        .bind(shift_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(cancelled)
    }

    /// Bookings the settlement poller should pick up: checked out, not yet
    /// claimed by a charge, and not parked on a recorded failure.
    pub async fn list_settleable(&mut self, limit: i64) -> Result<Vec<BookingDBResponse>> {
        let bookings = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            SELECT * FROM bookings
            WHERE status = 'checked_out'
              AND processor_payment_id IS NULL
              AND payment_failure IS NULL
            ORDER BY checked_out_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(bookings)
    }

    /// Claim a booking for settlement by storing the processor payment
    /// reference. The `processor_payment_id IS NULL` guard makes the claim
    /// exclusive: a second initiator sees zero rows and backs off.
    pub async fn claim_for_settlement(&mut self, id: BookingId, payment_ref: &str) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET processor_payment_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'checked_out' AND processor_payment_id IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(payment_ref)
        .fetch_optional(&mut *self.db)
        .await?;

        booking.ok_or(DbError::StaleState {
            entity: "booking",
            id: id.to_string(),
            expected: "checked_out",
        })
    }

    /// Look up a booking by its processor payment reference. Used when a
    /// webhook event arrives without booking metadata.
    pub async fn get_by_payment_ref(&mut self, payment_ref: &str) -> Result<Option<BookingDBResponse>> {
        let booking =
            sqlx::query_as::<_, BookingDBResponse>("SELECT * FROM bookings WHERE processor_payment_id = $1")
                .bind(payment_ref)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(booking)
    }

    /// Settlement landed: `checked_out -> completed` with the payment time.
    ///
    /// Returns `None` when the booking is no longer checked out (already
    /// completed by an earlier delivery, or disputed meanwhile); callers
    /// decide whether that is an error.
    pub async fn complete(&mut self, id: BookingId, paid_at: DateTime<Utc>) -> Result<Option<BookingDBResponse>> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET status = 'completed', paid_at = $2, payment_failure = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'checked_out'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(paid_at)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(booking)
    }

    /// Record a failed charge. The payment reference is cleared so a later
    /// retry can claim the booking again, while `payment_failure` parks it
    /// out of the poller's reach until someone intervenes.
    pub async fn record_payment_failure(&mut self, id: BookingId, reason: &str) -> Result<Option<BookingDBResponse>> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET payment_failure = $2, processor_payment_id = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'checked_out'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(booking)
    }

    /// Clear a recorded failure so settlement can be retried.
    pub async fn clear_payment_failure(&mut self, id: BookingId) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET payment_failure = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'checked_out'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        booking.ok_or(DbError::StaleState {
            entity: "booking",
            id: id.to_string(),
            expected: "checked_out",
        })
    }
}

#[async_trait::async_trait]
impl Repository for Bookings<'_> {
    type CreateRequest = BookingCreateDBRequest;
    type Response = BookingDBResponse;
    type Id = BookingId;
    type Filter = BookingFilter;

    async fn create(&mut self, request: &BookingCreateDBRequest) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            INSERT INTO bookings (shift_id, application_id, provider_id, requester_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.shift_id)
        .bind(request.application_id)
        .bind(request.provider_id)
        .bind(request.requester_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(booking)
    }

    async fn get_by_id(&mut self, id: BookingId) -> Result<Option<BookingDBResponse>> {
        let booking = sqlx::query_as::<_, BookingDBResponse>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(booking)
    }

    async fn list(&mut self, filter: &BookingFilter) -> Result<Vec<BookingDBResponse>> {
        let bookings = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            SELECT * FROM bookings
            WHERE ($1::uuid IS NULL OR provider_id = $1)
              AND ($2::uuid IS NULL OR requester_id = $2)
              AND ($3::uuid IS NULL OR shift_id = $3)
              AND ($4::text IS NULL OR status = $4)
            ORDER BY created_at DESC
            OFFSET $5
            LIMIT $6
            "#,
        )
        .bind(filter.provider_id)
        .bind(filter.requester_id)
        .bind(filter.shift_id)
        .bind(filter.status)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(bookings)
    }
}
