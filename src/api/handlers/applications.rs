use crate::{
    api::models::{
        applications::{AcceptResponse, ApplicationCreate, ApplicationResponse, ListApplicationsQuery},
        users::CurrentUser,
    },
    auth::{require_eligible_provider, require_eligible_requester, require_provider, require_requester},
    coordinator,
    db::{
        handlers::{Applications, Repository, Shifts},
        models::{
            applications::{ApplicationCreateDBRequest, ApplicationStatus},
            shifts::ShiftStatus,
        },
    },
    errors::{Error, Result},
    notifications::NotificationEvent,
    types::{ApplicationId, ShiftId},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Apply to a shift
#[utoipa::path(
    post,
    path = "/shifts/{id}/applications",
    tag = "applications",
    summary = "Apply to a shift",
    description = "Providers must be verified with a complete profile. One application per provider per shift.",
    params(
        ("id" = String, Path, format = "uuid", description = "Shift ID")
    ),
    request_body = ApplicationCreate,
    responses(
        (status = 201, description = "Application submitted", body = ApplicationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an eligible provider"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Shift not open, already started, or already applied"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn submit_application(
    State(state): State<AppState>,
    Path(shift_id): Path<ShiftId>,
    current_user: CurrentUser,
    Json(request): Json<ApplicationCreate>,
) -> Result<(StatusCode, Json<ApplicationResponse>)> {
    require_eligible_provider(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shift = Shifts::new(&mut conn)
        .get_by_id(shift_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Shift".to_string(),
            id: shift_id.to_string(),
        })?;

    if shift.status != ShiftStatus::Open {
        return Err(Error::Conflict {
            message: "Shift is no longer accepting applications".to_string(),
        });
    }
    if shift.starts_at <= chrono::Utc::now() {
        return Err(Error::Conflict {
            message: "Shift has already started".to_string(),
        });
    }

    let application = Applications::new(&mut conn)
        .create(&ApplicationCreateDBRequest {
            shift_id,
            provider_id: current_user.id,
            message: request.message,
        })
        .await?;

    state.notifier.notify(NotificationEvent::ApplicationSubmitted {
        application_id: application.id,
        shift_id,
        provider_id: current_user.id,
    });

    Ok((StatusCode::CREATED, Json(application.into())))
}

/// List applications for a shift
#[utoipa::path(
    get,
    path = "/shifts/{id}/applications",
    tag = "applications",
    summary = "List applications for a shift",
    params(
        ("id" = String, Path, format = "uuid", description = "Shift ID")
    ),
    responses(
        (status = 200, description = "Applications in submission order", body = [ApplicationResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the shift"),
        (status = 404, description = "Shift not found"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn list_shift_applications(
    State(state): State<AppState>,
    Path(shift_id): Path<ShiftId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ApplicationResponse>>> {
    require_requester(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shift = Shifts::new(&mut conn)
        .get_by_id(shift_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Shift".to_string(),
            id: shift_id.to_string(),
        })?;

    if shift.requester_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the shift's requester may view its applications".to_string(),
        });
    }

    let applications = Applications::new(&mut conn).list_for_shift(shift_id).await?;
    Ok(Json(applications.into_iter().map(Into::into).collect()))
}

/// List the caller's applications
#[utoipa::path(
    get,
    path = "/applications",
    tag = "applications",
    summary = "List the caller's applications",
    params(ListApplicationsQuery),
    responses(
        (status = 200, description = "The provider's applications, newest first", body = [ApplicationResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a provider"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn list_my_applications(
    State(state): State<AppState>,
    Query(_query): Query<ListApplicationsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ApplicationResponse>>> {
    require_provider(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let applications = Applications::new(&mut conn).list_for_provider(current_user.id).await?;
    Ok(Json(applications.into_iter().map(Into::into).collect()))
}

/// Accept an application
#[utoipa::path(
    post,
    path = "/applications/{id}/accept",
    tag = "applications",
    summary = "Accept an application",
    description = "Creates a confirmed booking. When the acceptance fills the shift's last slot, the shift flips to filled and every remaining pending application is rejected in the same transaction.",
    params(
        ("id" = String, Path, format = "uuid", description = "Application ID")
    ),
    responses(
        (status = 200, description = "Acceptance outcome", body = AcceptResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the shift or has an incomplete profile"),
        (status = 404, description = "Application not found"),
        (status = 409, description = "Shift not open or application no longer pending"),
        (status = 503, description = "Concurrent acceptances kept conflicting, retry"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn accept_application(
    State(state): State<AppState>,
    Path(id): Path<ApplicationId>,
    current_user: CurrentUser,
) -> Result<Json<AcceptResponse>> {
    require_eligible_requester(&current_user)?;

    let outcome = coordinator::accept_application(&state.db, id, current_user.id).await?;

    state.notifier.notify(NotificationEvent::ApplicationAccepted {
        application_id: outcome.application.id,
        provider_id: outcome.application.provider_id,
        booking_id: outcome.booking.id,
    });
    state.notifier.notify(NotificationEvent::BookingConfirmed {
        booking_id: outcome.booking.id,
        provider_id: outcome.booking.provider_id,
        shift_id: outcome.shift.id,
    });
    for rejected in &outcome.rejected {
        state.notifier.notify(NotificationEvent::ApplicationRejected {
            application_id: rejected.id,
            provider_id: rejected.provider_id,
            shift_id: rejected.shift_id,
        });
    }

    Ok(Json(AcceptResponse {
        application: outcome.application.into(),
        booking: outcome.booking.into(),
        shift_filled: outcome.shift_filled,
    }))
}

/// Reject an application
#[utoipa::path(
    post,
    path = "/applications/{id}/reject",
    tag = "applications",
    summary = "Reject an application",
    params(
        ("id" = String, Path, format = "uuid", description = "Application ID")
    ),
    responses(
        (status = 200, description = "Rejected application", body = ApplicationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the shift"),
        (status = 404, description = "Application not found"),
        (status = 409, description = "Application no longer pending"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn reject_application(
    State(state): State<AppState>,
    Path(id): Path<ApplicationId>,
    current_user: CurrentUser,
) -> Result<Json<ApplicationResponse>> {
    require_requester(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let application = Applications::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Application".to_string(),
            id: id.to_string(),
        })?;

    let shift = Shifts::new(&mut conn)
        .get_by_id(application.shift_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Shift".to_string(),
            id: application.shift_id.to_string(),
        })?;

    if shift.requester_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the shift's requester may reject applications".to_string(),
        });
    }

    let rejected = Applications::new(&mut conn)
        .resolve_pending(id, ApplicationStatus::Rejected)
        .await?;

    state.notifier.notify(NotificationEvent::ApplicationRejected {
        application_id: rejected.id,
        provider_id: rejected.provider_id,
        shift_id: rejected.shift_id,
    });

    Ok(Json(rejected.into()))
}

/// Withdraw an application
#[utoipa::path(
    post,
    path = "/applications/{id}/withdraw",
    tag = "applications",
    summary = "Withdraw an application",
    params(
        ("id" = String, Path, format = "uuid", description = "Application ID")
    ),
    responses(
        (status = 200, description = "Withdrawn application", body = ApplicationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the application"),
        (status = 404, description = "Application not found"),
        (status = 409, description = "Application no longer pending"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn withdraw_application(
    State(state): State<AppState>,
    Path(id): Path<ApplicationId>,
    current_user: CurrentUser,
) -> Result<Json<ApplicationResponse>> {
    require_provider(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let application = Applications::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Application".to_string(),
            id: id.to_string(),
        })?;

    if application.provider_id != current_user.id {
        return Err(Error::Forbidden {
            message: "Only the applicant may withdraw an application".to_string(),
        });
    }

    let withdrawn = Applications::new(&mut conn)
        .resolve_pending(id, ApplicationStatus::Withdrawn)
        .await?;

    Ok(Json(withdrawn.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::users::UserRole;
    use crate::test_utils::{
        add_auth_headers, create_test_app, create_test_shift, create_test_shift_with_headcount, create_test_user,
        create_test_unverified_provider,
    };
    use serde_json::json;
    use sqlx::PgPool;

    async fn apply(
        app: &axum_test::TestServer,
        shift_id: crate::types::ShiftId,
        provider_email: &str,
    ) -> ApplicationResponse {
        let response = app
            .post(&format!("/api/v1/shifts/{shift_id}/applications"))
            .add_header(add_auth_headers(provider_email).0, add_auth_headers(provider_email).1)
            .json(&json!({ "message": "I can cover this" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_submit_application(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let shift = create_test_shift(&pool, requester.id).await;

        let application = apply(&app, shift.id, &provider.email).await;
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert_eq!(application.provider_id, provider.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_application_conflicts(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let shift = create_test_shift(&pool, requester.id).await;

        apply(&app, shift.id, &provider.email).await;

        let response = app
            .post(&format!("/api/v1/shifts/{}/applications", shift.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .json(&json!({}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unverified_provider_cannot_apply(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_unverified_provider(&pool).await;
        let shift = create_test_shift(&pool, requester.id).await;

        let response = app
            .post(&format!("/api/v1/shifts/{}/applications", shift.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .json(&json!({}))
            .await;
        response.assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_accept_fills_shift_and_rejects_rest(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let first = create_test_user(&pool, UserRole::Provider).await;
        let second = create_test_user(&pool, UserRole::Provider).await;
        let shift = create_test_shift_with_headcount(&pool, requester.id, 1).await;

        let first_application = apply(&app, shift.id, &first.email).await;
        let second_application = apply(&app, shift.id, &second.email).await;

        let response = app
            .post(&format!("/api/v1/applications/{}/accept", first_application.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();
        let outcome: AcceptResponse = response.json();
        assert!(outcome.shift_filled);
        assert_eq!(outcome.application.status, ApplicationStatus::Accepted);
        assert_eq!(outcome.booking.provider_id, first.id);

        // The competing application was rejected in the fill cascade
        let response = app
            .get(&format!("/api/v1/shifts/{}/applications", shift.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();
        let applications: Vec<ApplicationResponse> = response.json();
        let rejected = applications.iter().find(|a| a.id == second_application.id).unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);

        // Filled shift no longer accepts applications
        let third = create_test_user(&pool, UserRole::Provider).await;
        let response = app
            .post(&format!("/api/v1/shifts/{}/applications", shift.id))
            .add_header(add_auth_headers(&third.email).0, add_auth_headers(&third.email).1)
            .json(&json!({}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_incomplete_requester_cannot_accept(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let shift = create_test_shift(&pool, requester.id).await;

        let application = apply(&app, shift.id, &provider.email).await;

        // Profile lapses between posting and staffing
        let mut conn = pool.acquire().await.unwrap();
        crate::db::handlers::Users::new(&mut conn)
            .update(
                requester.id,
                &crate::db::models::users::UserUpdateDBRequest {
                    profile_complete: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let response = app
            .post(&format!("/api/v1/applications/{}/accept", application.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_accept_requires_shift_ownership(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let other = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let shift = create_test_shift(&pool, requester.id).await;

        let application = apply(&app, shift.id, &provider.email).await;

        let response = app
            .post(&format!("/api/v1/applications/{}/accept", application.id))
            .add_header(add_auth_headers(&other.email).0, add_auth_headers(&other.email).1)
            .await;
        response.assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_withdraw_then_accept_conflicts(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let shift = create_test_shift(&pool, requester.id).await;

        let application = apply(&app, shift.id, &provider.email).await;

        let response = app
            .post(&format!("/api/v1/applications/{}/withdraw", application.id))
            .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
            .await;
        response.assert_status_ok();
        let withdrawn: ApplicationResponse = response.json();
        assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);

        // Resolution is monotonic: a withdrawn application cannot be accepted
        let response = app
            .post(&format!("/api/v1/applications/{}/accept", application.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reject_application(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        let shift = create_test_shift(&pool, requester.id).await;

        let application = apply(&app, shift.id, &provider.email).await;

        let response = app
            .post(&format!("/api/v1/applications/{}/reject", application.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();
        let rejected: ApplicationResponse = response.json();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
    }
}
