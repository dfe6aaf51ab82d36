use crate::{
    api::models::users::CurrentUser,
    db::{errors::DbError, handlers::Users},
    errors::{Error, Result},
    AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header_name = &state.config.auth.user_header;
        let user_email = match parts.headers.get(header_name).and_then(|h| h.to_str().ok()) {
            Some(email) if !email.is_empty() => email,
            _ => {
                trace!("No identity header found in request");
                return Err(Error::Unauthenticated { message: None });
            }
        };

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        match Users::new(&mut conn).get_by_email(user_email).await? {
            Some(user) => {
                debug!("Authenticated user: {}", user.id);
                Ok(CurrentUser {
                    id: user.id,
                    email: user.email,
                    display_name: user.display_name,
                    role: user.role,
                    verified: user.verified,
                    profile_complete: user.profile_complete,
                    payout_account_id: user.payout_account_id,
                })
            }
            None => {
                trace!("Identity header named an unknown user");
                Err(Error::Unauthenticated {
                    message: Some("Unknown user".to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::CurrentUser,
        db::models::users::UserRole,
        test_utils::{create_test_config, create_test_state, create_test_user},
    };
    use axum::{extract::FromRequestParts as _, http::request::Parts};
    use sqlx::PgPool;

    fn parts_with_header(header_name: &str, header_value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(header_name, header_value)
            .body(())
            .unwrap();

        let (parts, _body) = request.into_parts();
        parts
    }

    fn parts_without_header() -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .body(())
            .unwrap();

        let (parts, _body) = request.into_parts();
        parts
    }

    #[sqlx::test]
    async fn test_existing_user_extraction(pool: PgPool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool, UserRole::Provider).await;

        let mut parts = parts_with_header("x-shiftctl-user", &user.email);
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(current.id, user.id);
        assert_eq!(current.email, user.email);
        assert_eq!(current.role, UserRole::Provider);
    }

    #[sqlx::test]
    async fn test_unknown_user_is_rejected(pool: PgPool) {
        let state = create_test_state(pool);

        let mut parts = parts_with_header("x-shiftctl-user", "nobody@example.com");
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;

        assert!(matches!(result, Err(crate::errors::Error::Unauthenticated { .. })));
    }

    #[sqlx::test]
    async fn test_missing_header_is_rejected(pool: PgPool) {
        let state = create_test_state(pool);

        let mut parts = parts_without_header();
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;

        assert!(matches!(result, Err(crate::errors::Error::Unauthenticated { .. })));
    }

    #[sqlx::test]
    async fn test_custom_header_name(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.user_header = "x-forwarded-email".to_string();
        let state = crate::AppState::builder()
            .db(pool.clone())
            .config(config)
            .processor(crate::payment_processors::create_processor(None))
            .notifier(crate::notifications::Notifier::disabled())
            .build();

        let user = create_test_user(&pool, UserRole::Requester).await;

        let mut parts = parts_with_header("x-forwarded-email", &user.email);
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.role, UserRole::Requester);
    }
}
