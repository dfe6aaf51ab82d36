use crate::{
    api::models::users::{CurrentUser, PayoutAccountUpdate, UserResponse},
    auth::require_provider,
    db::{handlers::Users, models::users::UserUpdateDBRequest},
    errors::{Error, Result},
    AppState,
};
use axum::{extract::State, response::Json};

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/users/current",
    tag = "users",
    summary = "Get the authenticated user's profile",
    responses(
        (status = 200, description = "The caller's profile", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;

    Ok(Json(user.into()))
}

/// Record the caller's payout account
#[utoipa::path(
    patch,
    path = "/users/current/payout-account",
    tag = "users",
    summary = "Record the caller's payout account",
    description = "Stores the connected-account id produced by the external payout onboarding flow. Providers only.",
    request_body = PayoutAccountUpdate,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Invalid account id"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a provider"),
    ),
    security(
        ("X-Shiftctl-User" = [])
    )
)]
pub async fn update_payout_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PayoutAccountUpdate>,
) -> Result<Json<UserResponse>> {
    require_provider(&current_user)?;

    if request.payout_account_id.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Payout account id must not be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let updated = Users::new(&mut conn)
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                payout_account_id: Some(Some(request.payout_account_id)),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::users::UserRole;
    use crate::test_utils::{add_auth_headers, create_test_app, create_test_user};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_current_user(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, UserRole::Provider).await;

        let response = app
            .get("/api/v1/users/current")
            .add_header(add_auth_headers(&user.email).0, add_auth_headers(&user.email).1)
            .await;

        response.assert_status_ok();
        let profile: UserResponse = response.json();
        assert_eq!(profile.id, user.id);
        assert_eq!(profile.role, UserRole::Provider);
        assert!(!profile.has_payout_account);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_current_user_unauthenticated(pool: PgPool) {
        let (app, _) = create_test_app(pool).await;

        let response = app.get("/api/v1/users/current").await;
        response.assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_payout_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, UserRole::Provider).await;

        let response = app
            .patch("/api/v1/users/current/payout-account")
            .add_header(add_auth_headers(&user.email).0, add_auth_headers(&user.email).1)
            .json(&json!({ "payout_account_id": "acct_123" }))
            .await;

        response.assert_status_ok();
        let profile: UserResponse = response.json();
        assert!(profile.has_payout_account);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_requester_cannot_set_payout_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, UserRole::Requester).await;

        let response = app
            .patch("/api/v1/users/current/payout-account")
            .add_header(add_auth_headers(&user.email).0, add_auth_headers(&user.email).1)
            .json(&json!({ "payout_account_id": "acct_123" }))
            .await;

        response.assert_status_forbidden();
    }
}
