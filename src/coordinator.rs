//! Capacity coordinator: acceptance and cancellation under concurrency.
//!
//! Acceptance is the contended path of the whole system: several requester
//! sessions can race to accept applications on the same shift, and the
//! headcount must never be oversubscribed. Each acceptance runs in a single
//! transaction that takes a row lock on the shift (`SELECT ... FOR UPDATE`),
//! so concurrent acceptors for one shift serialize while different shifts
//! proceed in parallel. Serialization failures and deadlocks are retried a
//! bounded number of times before giving up with a 503.

use crate::db::handlers::{Applications, Bookings, Repository, Shifts};
use crate::db::models::{
    applications::{ApplicationDBResponse, ApplicationStatus},
    bookings::{BookingCreateDBRequest, BookingDBResponse},
    shifts::{ShiftDBResponse, ShiftStatus},
};
use crate::errors::{Error, Result};
use crate::types::{abbrev_uuid, ApplicationId, ShiftId, UserId};
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

const MAX_ATTEMPTS: u32 = 3;

/// Result of accepting an application.
#[derive(Debug)]
pub struct AcceptOutcome {
    pub booking: BookingDBResponse,
    pub application: ApplicationDBResponse,
    pub shift: ShiftDBResponse,
    /// Whether this acceptance filled the shift's last slot
    pub shift_filled: bool,
    /// Pending applications rejected as part of the fill cascade
    pub rejected: Vec<ApplicationDBResponse>,
}

/// Result of cancelling a shift.
#[derive(Debug)]
pub struct CancelOutcome {
    pub shift: ShiftDBResponse,
    pub rejected_applications: Vec<ApplicationDBResponse>,
    pub cancelled_bookings: Vec<BookingDBResponse>,
}

/// Accept a pending application on behalf of the shift's requester.
///
/// Creates the booking, and when the shift's headcount is reached, flips the
/// shift to `filled` and rejects every remaining pending application in the
/// same transaction.
#[instrument(skip(pool), fields(application = %abbrev_uuid(&application_id)))]
pub async fn accept_application(
    pool: &PgPool,
    application_id: ApplicationId,
    requester_id: UserId,
) -> Result<AcceptOutcome> {
    for attempt in 1..=MAX_ATTEMPTS {
        match try_accept(pool, application_id, requester_id).await {
            Err(Error::Database(db_err)) if db_err.is_retryable() => {
                warn!(attempt, error = %db_err, "Acceptance transaction conflicted, retrying");
            }
            other => return other,
        }
    }
    Err(Error::Busy)
}

async fn try_accept(pool: &PgPool, application_id: ApplicationId, requester_id: UserId) -> Result<AcceptOutcome> {
    let mut tx = pool.begin().await.map_err(crate::db::errors::DbError::from)?;

    let application = Applications::new(&mut tx)
        .get_by_id(application_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Application".to_string(),
            id: application_id.to_string(),
        })?;

    // Lock the shift row first; every acceptor for this shift queues here.
    let shift = Shifts::new(&mut tx)
        .get_for_update(application.shift_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Shift".to_string(),
            id: application.shift_id.to_string(),
        })?;

    if shift.requester_id != requester_id {
        return Err(Error::Forbidden {
            message: "Only the shift's requester can accept applications".to_string(),
        });
    }
    if shift.status != ShiftStatus::Open {
        return Err(Error::Conflict {
            message: "Shift is no longer accepting applications".to_string(),
        });
    }
    if shift.starts_at <= Utc::now() {
        return Err(Error::Conflict {
            message: "Shift has already started".to_string(),
        });
    }

    let application = Applications::new(&mut tx)
        .resolve_pending(application_id, ApplicationStatus::Accepted)
        .await?;

    let booking = Bookings::new(&mut tx)
        .create(&BookingCreateDBRequest {
            shift_id: shift.id,
            application_id: application.id,
            provider_id: application.provider_id,
            requester_id: shift.requester_id,
        })
        .await?;

    // Headcount bounds accepted applications, not live bookings: a booking
    // cancelled after acceptance does not re-open the slot.
    let accepted = Applications::new(&mut tx).count_accepted_for_shift(shift.id).await?;

    let (shift, shift_filled, rejected) = if accepted >= shift.headcount as i64 {
        let filled = Shifts::new(&mut tx)
            .set_status(shift.id, ShiftStatus::Open, ShiftStatus::Filled)
            .await?;
        let rejected = Applications::new(&mut tx).reject_pending_for_shift(shift.id).await?;
        (filled, true, rejected)
    } else {
        (shift, false, Vec::new())
    };

    tx.commit().await.map_err(crate::db::errors::DbError::from)?;

    info!(
        booking = %abbrev_uuid(&booking.id),
        shift = %abbrev_uuid(&shift.id),
        shift_filled,
        rejected = rejected.len(),
        "Accepted application"
    );

    Ok(AcceptOutcome {
        booking,
        application,
        shift,
        shift_filled,
        rejected,
    })
}

/// Cancel an open or filled shift.
///
/// Rejects remaining pending applications and cancels confirmed and
/// checked-in bookings in the same transaction. Checked-out bookings are
/// left alone: the work already happened and must still be settled or
/// disputed.
#[instrument(skip(pool), fields(shift = %abbrev_uuid(&shift_id)))]
pub async fn cancel_shift(pool: &PgPool, shift_id: ShiftId, requester_id: UserId) -> Result<CancelOutcome> {
    for attempt in 1..=MAX_ATTEMPTS {
        match try_cancel(pool, shift_id, requester_id).await {
            Err(Error::Database(db_err)) if db_err.is_retryable() => {
                warn!(attempt, error = %db_err, "Cancellation transaction conflicted, retrying");
            }
            other => return other,
        }
    }
    Err(Error::Busy)
}

async fn try_cancel(pool: &PgPool, shift_id: ShiftId, requester_id: UserId) -> Result<CancelOutcome> {
    let mut tx = pool.begin().await.map_err(crate::db::errors::DbError::from)?;

    let shift = Shifts::new(&mut tx)
        .get_for_update(shift_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Shift".to_string(),
            id: shift_id.to_string(),
        })?;

    if shift.requester_id != requester_id {
        return Err(Error::Forbidden {
            message: "Only the shift's requester can cancel it".to_string(),
        });
    }
    if shift.status.is_terminal() {
        return Err(Error::Conflict {
            message: "Shift is already completed or cancelled".to_string(),
        });
    }

    let shift = Shifts::new(&mut tx)
        .set_status(shift.id, shift.status, ShiftStatus::Cancelled)
        .await?;
    let rejected_applications = Applications::new(&mut tx).reject_pending_for_shift(shift.id).await?;
    let cancelled_bookings = Bookings::new(&mut tx).cancel_for_shift(shift.id).await?;

    tx.commit().await.map_err(crate::db::errors::DbError::from)?;

    info!(
        rejected = rejected_applications.len(),
        cancelled = cancelled_bookings.len(),
        "Cancelled shift"
    );

    Ok(CancelOutcome {
        shift,
        rejected_applications,
        cancelled_bookings,
    })
}
