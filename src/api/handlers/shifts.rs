use crate::{
    api::models::{
        shifts::{ListShiftsQuery, ShiftCreate, ShiftResponse},
        users::CurrentUser,
    },
    auth::{require_eligible_requester, require_requester},
    coordinator,
    db::{
        handlers::{Bookings, Repository, Shifts},
        models::shifts::{ShiftCreateDBRequest, ShiftFilter, ShiftStatus},
    },
    errors::{Error, Result},
    notifications::NotificationEvent,
    types::ShiftId,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Post a new shift
#[utoipa::path(
    post,
    path = "/shifts",
    tag = "shifts",
    summary = "Post a new shift",
    request_body = ShiftCreate,
    responses(
        (status = 201, description = "Shift created", body = ShiftResponse),
        (status = 400, description = "Invalid shift"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a requester with a complete profile"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn create_shift(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ShiftCreate>,
) -> Result<(StatusCode, Json<ShiftResponse>)> {
    require_eligible_requester(&current_user)?;
    request.validate(chrono::Utc::now())?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shift = Shifts::new(&mut conn)
        .create(&ShiftCreateDBRequest {
            requester_id: current_user.id,
            title: request.title,
            description: request.description,
            location: request.location,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            hourly_rate: request.hourly_rate,
            headcount: request.headcount,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(shift.into())))
}

/// List shifts
#[utoipa::path(
    get,
    path = "/shifts",
    tag = "shifts",
    summary = "List shifts",
    params(ListShiftsQuery),
    responses(
        (status = 200, description = "Shifts ordered by start time", body = [ShiftResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn list_shifts(
    State(state): State<AppState>,
    Query(query): Query<ListShiftsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ShiftResponse>>> {
    let (skip, limit) = query.pagination.params();
    let requester_id = query.mine.then_some(current_user.id);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shifts = Shifts::new(&mut conn)
        .list(&ShiftFilter::new(requester_id, query.status, skip, limit))
        .await?;

    Ok(Json(shifts.into_iter().map(Into::into).collect()))
}

/// Get a shift
#[utoipa::path(
    get,
    path = "/shifts/{id}",
    tag = "shifts",
    summary = "Get a shift",
    params(
        ("id" = String, Path, format = "uuid", description = "Shift ID")
    ),
    responses(
        (status = 200, description = "The shift", body = ShiftResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Shift not found"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn get_shift(
    State(state): State<AppState>,
    Path(id): Path<ShiftId>,
    _current_user: CurrentUser,
) -> Result<Json<ShiftResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shift = Shifts::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Shift".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(shift.into()))
}

/// Cancel a shift
#[utoipa::path(
    post,
    path = "/shifts/{id}/cancel",
    tag = "shifts",
    summary = "Cancel a shift",
    description = "Cancels an open or filled shift. Pending applications are rejected and confirmed or checked-in bookings cancelled in the same transaction; checked-out bookings stay untouched and still settle.",
    params(
        ("id" = String, Path, format = "uuid", description = "Shift ID")
    ),
    responses(
        (status = 200, description = "Cancelled shift", body = ShiftResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the shift"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Shift is already completed or cancelled"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn cancel_shift(
    State(state): State<AppState>,
    Path(id): Path<ShiftId>,
    current_user: CurrentUser,
) -> Result<Json<ShiftResponse>> {
    require_requester(&current_user)?;

    let outcome = coordinator::cancel_shift(&state.db, id, current_user.id).await?;

    state.notifier.notify(NotificationEvent::ShiftCancelled {
        shift_id: outcome.shift.id,
        requester_id: current_user.id,
    });
    for application in &outcome.rejected_applications {
        state.notifier.notify(NotificationEvent::ApplicationRejected {
            application_id: application.id,
            provider_id: application.provider_id,
            shift_id: application.shift_id,
        });
    }
    for booking in &outcome.cancelled_bookings {
        state.notifier.notify(NotificationEvent::BookingCancelled {
            booking_id: booking.id,
            provider_id: booking.provider_id,
            shift_id: booking.shift_id,
        });
    }

    Ok(Json(outcome.shift.into()))
}

/// Mark a filled shift completed
#[utoipa::path(
    post,
    path = "/shifts/{id}/complete",
    tag = "shifts",
    summary = "Mark a filled shift completed",
    description = "Allowed once every booking on the shift has reached a settled or terminal state.",
    params(
        ("id" = String, Path, format = "uuid", description = "Shift ID")
    ),
    responses(
        (status = 200, description = "Completed shift", body = ShiftResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the shift"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Shift is not filled, or bookings remain unsettled"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn complete_shift(
    State(state): State<AppState>,
    Path(id): Path<ShiftId>,
    current_user: CurrentUser,
) -> Result<Json<ShiftResponse>> {
    require_requester(&current_user)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let shift = Shifts::new(&mut tx)
        .get_for_update(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Shift".to_string(),
            id: id.to_string(),
        })?;

    if shift.requester_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the shift's requester may complete it".to_string(),
        });
    }

    let unsettled = Bookings::new(&mut tx).count_unsettled_for_shift(id).await?;
    if unsettled > 0 {
        return Err(Error::Conflict {
            message: format!("{unsettled} booking(s) have not finished settlement"),
        });
    }

    let completed = Shifts::new(&mut tx)
        .set_status(id, ShiftStatus::Filled, ShiftStatus::Completed)
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(completed.into()))
}
