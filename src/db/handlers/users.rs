use crate::db::{
    errors::Result,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::UserId;
use sqlx::PgConnection;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new user
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (email, display_name, role, verified, profile_complete, payout_account_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(request.role)
        .bind(request.verified)
        .bind(request.profile_complete)
        .bind(&request.payout_account_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Partially update a user's marketplace attributes.
    ///
    /// `payout_account_id` uses a double Option: `None` leaves the column
    /// untouched, `Some(None)` clears it, `Some(Some(id))` sets it.
    pub async fn update(&mut self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let (set_payout, payout_value) = match &request.payout_account_id {
            None => (false, None),
            Some(value) => (true, value.clone()),
        };

        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                verified = COALESCE($3, verified),
                profile_complete = COALESCE($4, profile_complete),
                payout_account_id = CASE WHEN $5 THEN $6 ELSE payout_account_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .bind(request.verified)
        .bind(request.profile_complete)
        .bind(set_payout)
        .bind(payout_value)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }
}
