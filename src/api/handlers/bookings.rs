use crate::{
    api::models::{
        bookings::{BookingResponse, ListBookingsQuery},
        users::CurrentUser,
    },
    auth::{require_provider, require_requester},
    db::{
        handlers::{Bookings, Repository, Shifts},
        models::{
            bookings::{BookingDBResponse, BookingFilter},
            users::UserRole,
        },
    },
    errors::{Error, Result},
    rates::{self, RateCard},
    settlement::SettlementGateway,
    types::BookingId,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};

fn require_party(booking: &BookingDBResponse, current_user: &CurrentUser) -> Result<()> {
    if booking.provider_id != current_user.id && booking.requester_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the booking's provider or requester may access it".to_string(),
        });
    }
    Ok(())
}

async fn load_booking(state: &AppState, id: BookingId) -> Result<BookingDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Bookings::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Booking".to_string(),
        id: id.to_string(),
    })
}

/// List the caller's bookings
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    summary = "List the caller's bookings",
    description = "Providers see bookings they work; requesters see bookings on their shifts.",
    params(ListBookingsQuery),
    responses(
        (status = 200, description = "Bookings, newest first", body = [BookingResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<BookingResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = match current_user.role {
        UserRole::Provider => BookingFilter::for_provider(current_user.id, skip, limit),
        UserRole::Requester => BookingFilter::for_requester(current_user.id, skip, limit),
    };
    filter.status = query.status;
    filter.shift_id = query.shift_id;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let bookings = Bookings::new(&mut conn).list(&filter).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// Get a booking
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    summary = "Get a booking",
    params(
        ("id" = String, Path, format = "uuid", description = "Booking ID")
    ),
    responses(
        (status = 200, description = "The booking", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a party to the booking"),
        (status = 404, description = "Booking not found"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    let booking = load_booking(&state, id).await?;
    require_party(&booking, &current_user)?;
    Ok(Json(booking.into()))
}

/// Check in to a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/check-in",
    tag = "bookings",
    summary = "Check in to a booking",
    description = "Provider marks arrival. Allowed from the shift's start time onward.",
    params(
        ("id" = String, Path, format = "uuid", description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Checked-in booking", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the booking's provider"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking not confirmed, or shift has not started"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    require_provider(&current_user)?;

    let booking = load_booking(&state, id).await?;
    if booking.provider_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the booking's provider may check in".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shift = Shifts::new(&mut conn)
        .get_by_id(booking.shift_id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: format!("check in booking {id}: shift row is missing"),
        })?;

    let now = chrono::Utc::now();
    if now < shift.starts_at {
        return Err(Error::Conflict {
            message: "Shift has not started yet".to_string(),
        });
    }

    let checked_in = Bookings::new(&mut conn).check_in(id, now).await?;
    Ok(Json(checked_in.into()))
}

/// Check out of a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/check-out",
    tag = "bookings",
    summary = "Check out of a booking",
    description = "Provider marks departure. Worked time is billed in quarter-hour units (minimum half an hour) and the payout, platform fee and requester total are recorded atomically with the status change.",
    params(
        ("id" = String, Path, format = "uuid", description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Checked-out booking with recorded earnings", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the booking's provider"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking not checked in"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn check_out(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    require_provider(&current_user)?;

    let booking = load_booking(&state, id).await?;
    if booking.provider_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the booking's provider may check out".to_string(),
        });
    }
    let Some(checked_in_at) = booking.checked_in_at else {
        return Err(Error::Conflict {
            message: "Booking has not been checked in".to_string(),
        });
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shift = Shifts::new(&mut conn)
        .get_by_id(booking.shift_id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: format!("check out booking {id}: shift row is missing"),
        })?;

    let now = chrono::Utc::now();
    let earnings = rates::compute(
        &RateCard {
            hourly_rate: shift.hourly_rate,
            fee_rate: state.config.billing.fee_rate,
        },
        now - checked_in_at,
    );

    let checked_out = Bookings::new(&mut conn).check_out(id, now, &earnings).await?;
    Ok(Json(checked_out.into()))
}

/// Cancel a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    summary = "Cancel a booking",
    description = "Requester releases a confirmed or checked-in booking. Checked-out bookings must be settled or disputed instead.",
    params(
        ("id" = String, Path, format = "uuid", description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Cancelled booking", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the booking's requester"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking has progressed past check-in"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    require_requester(&current_user)?;

    let booking = load_booking(&state, id).await?;
    if booking.requester_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the booking's requester may cancel it".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let cancelled = Bookings::new(&mut conn).cancel(id).await?;

    state.notifier.notify(crate::notifications::NotificationEvent::BookingCancelled {
        booking_id: cancelled.id,
        provider_id: cancelled.provider_id,
        shift_id: cancelled.shift_id,
    });

    Ok(Json(cancelled.into()))
}

/// Dispute a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/dispute",
    tag = "bookings",
    summary = "Dispute a booking",
    description = "Requester flags a post-payment anomaly on a completed booking for manual review.",
    params(
        ("id" = String, Path, format = "uuid", description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Disputed booking", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the booking's requester"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not completed"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn dispute_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    require_requester(&current_user)?;

    let booking = load_booking(&state, id).await?;
    if booking.requester_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the booking's requester may dispute it".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let disputed = Bookings::new(&mut conn).dispute(id).await?;
    Ok(Json(disputed.into()))
}

/// Settle a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/settle",
    tag = "bookings",
    summary = "Settle a booking",
    description = "Starts (or retries, after a recorded payment failure) the charge for a checked-out booking. Settlement normally runs in the background; this endpoint exists for explicit retries.",
    params(
        ("id" = String, Path, format = "uuid", description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking with settlement in flight", body = BookingResponse),
        (status = 400, description = "Provider has no payout account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the booking's requester"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not awaiting settlement"),
        (status = 502, description = "Payment processor rejected the charge"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn settle_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    require_requester(&current_user)?;

    let booking = load_booking(&state, id).await?;
    if booking.requester_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the booking's requester may settle it".to_string(),
        });
    }

    let gateway = SettlementGateway::new(state.db.clone(), state.processor.clone(), state.notifier.clone());
    let settled = if booking.payment_failure.is_some() {
        gateway.retry(id).await?
    } else {
        gateway.initiate(id).await?
    };

    Ok(Json(settled.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::bookings::BookingStatus;
    use crate::db::models::users::UserRole;
    use crate::test_utils::{
        add_auth_headers, backdate_shift, create_accepted_booking, create_test_app, create_test_user,
        set_payout_account,
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_check_in_before_start_conflicts(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let (_, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        let response = app
            .post(&format!("/api/v1/bookings/{}/check-in", booking.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_check_in_and_out_records_earnings(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        backdate_shift(&pool, shift.id, chrono::Utc::now() - chrono::Duration::hours(1)).await;

        let response = app
            .post(&format!("/api/v1/bookings/{}/check-in", booking.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .await;
        response.assert_status_ok();
        let checked_in: BookingResponse = response.json();
        assert_eq!(checked_in.status, BookingStatus::CheckedIn);
        assert!(checked_in.checked_in_at.is_some());

        let response = app
            .post(&format!("/api/v1/bookings/{}/check-out", booking.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .await;
        response.assert_status_ok();
        let checked_out: BookingResponse = response.json();
        assert_eq!(checked_out.status, BookingStatus::CheckedOut);

        // Instant check-out still bills the half-hour minimum at $40/h + 20% fee
        assert_eq!(checked_out.quarter_hours, Some(2));
        assert_eq!(checked_out.provider_payout_cents, Some(2000));
        assert_eq!(checked_out.platform_fee_cents, Some(400));
        assert_eq!(checked_out.requester_total_cents, Some(2400));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_only_provider_can_check_in(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let intruder = create_test_user(&pool, UserRole::Provider).await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        backdate_shift(&pool, shift.id, chrono::Utc::now() - chrono::Duration::hours(1)).await;

        let response = app
            .post(&format!("/api/v1/bookings/{}/check-in", booking.id))
            .add_header(add_auth_headers(&intruder.email).0, add_auth_headers(&intruder.email).1)
            .await;
        response.assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_booking_boundary(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        backdate_shift(&pool, shift.id, chrono::Utc::now() - chrono::Duration::hours(1)).await;

        // Checked-in bookings can still be cancelled
        app.post(&format!("/api/v1/bookings/{}/check-in", booking.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .await
            .assert_status_ok();

        let response = app
            .post(&format!("/api/v1/bookings/{}/cancel", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();
        let cancelled: BookingResponse = response.json();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // Terminal: no further transitions
        let response = app
            .post(&format!("/api/v1/bookings/{}/check-in", booking.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_checked_out_booking_cannot_be_cancelled(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        backdate_shift(&pool, shift.id, chrono::Utc::now() - chrono::Duration::hours(1)).await;

        for action in ["check-in", "check-out"] {
            app.post(&format!("/api/v1/bookings/{}/{action}", booking.id))
                .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
                .await
                .assert_status_ok();
        }

        let response = app
            .post(&format!("/api/v1/bookings/{}/cancel", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settle_requires_payout_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        backdate_shift(&pool, shift.id, chrono::Utc::now() - chrono::Duration::hours(1)).await;
        for action in ["check-in", "check-out"] {
            app.post(&format!("/api/v1/bookings/{}/{action}", booking.id))
                .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
                .await
                .assert_status_ok();
        }

        let response = app
            .post(&format!("/api/v1/bookings/{}/settle", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settle_claims_booking(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        set_payout_account(&pool, provider.id, "acct_test").await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        backdate_shift(&pool, shift.id, chrono::Utc::now() - chrono::Duration::hours(1)).await;
        for action in ["check-in", "check-out"] {
            app.post(&format!("/api/v1/bookings/{}/{action}", booking.id))
                .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
                .await
                .assert_status_ok();
        }

        let response = app
            .post(&format!("/api/v1/bookings/{}/settle", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let claimed = Bookings::new(&mut conn).get_by_id(booking.id).await.unwrap().unwrap();
        assert!(claimed.processor_payment_id.is_some());
        assert_eq!(claimed.status, BookingStatus::CheckedOut);

        // A second settle while the charge is in flight conflicts
        let response = app
            .post(&format!("/api/v1/bookings/{}/settle", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_dispute_only_after_completion(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        backdate_shift(&pool, shift.id, chrono::Utc::now() - chrono::Duration::hours(1)).await;
        for action in ["check-in", "check-out"] {
            app.post(&format!("/api/v1/bookings/{}/{action}", booking.id))
                .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
                .await
                .assert_status_ok();
        }

        // Not yet paid: dispute conflicts
        let response = app
            .post(&format!("/api/v1/bookings/{}/dispute", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let mut conn = pool.acquire().await.unwrap();
        Bookings::new(&mut conn)
            .complete(booking.id, chrono::Utc::now())
            .await
            .unwrap()
            .expect("booking should complete");

        let response = app
            .post(&format!("/api/v1/bookings/{}/dispute", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();
        let disputed: BookingResponse = response.json();
        assert_eq!(disputed.status, BookingStatus::Disputed);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_bookings_by_role(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let other_provider = create_test_user(&pool, UserRole::Provider).await;
        let (_, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;

        let response = app
            .get("/api/v1/bookings")
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .await;
        response.assert_status_ok();
        let bookings: Vec<BookingResponse> = response.json();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].id, booking.id);

        let response = app
            .get("/api/v1/bookings")
            .add_header(
                add_auth_headers(&other_provider.email).0,
                add_auth_headers(&other_provider.email).1,
            )
            .await;
        response.assert_status_ok();
        let bookings: Vec<BookingResponse> = response.json();
        assert!(bookings.is_empty());

        // The requester sees the same booking from their side
        let response = app
            .get("/api/v1/bookings")
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();
        let bookings: Vec<BookingResponse> = response.json();
        assert_eq!(bookings.len(), 1);
    }
}
