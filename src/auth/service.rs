use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{
    AuthError, AuthResponse, ChangePasswordRequest, JwtService, LoginRequest, MessageResponse,
    RefreshTokenRequest, RegisterRequest, TokenResponse, UserInfo, UserRole, UserSession,
};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, password_hash, name, role, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool, jwt_secret: &str) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_secret),
            db,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Register a new user together with its role-specific profile row
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        if request.role == UserRole::Admin {
            return Err(AuthError::InsufficientPermissions);
        }

        let email = request.email.trim().to_lowercase();
        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&password_hash)
        .bind(request.name.trim())
        .bind(request.role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            let duplicate = err
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false);
            if duplicate {
                AuthError::EmailAlreadyExists
            } else {
                AuthError::Database(err)
            }
        })?;

        let profile_id = Uuid::new_v4();
        match user.role {
            UserRole::Personal => {
                sqlx::query(
                    "INSERT INTO personal_profiles (id, user_id, display_name, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $4)",
                )
                .bind(profile_id)
                .bind(user.id)
                .bind(&user.name)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            UserRole::Student => {
                sqlx::query(
                    "INSERT INTO students (id, user_id, name, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $4)",
                )
                .bind(profile_id)
                .bind(user.id)
                .bind(&user.name)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            UserRole::Admin => {}
        }

        tx.commit().await?;
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "registered user");

        self.issue_tokens(user, Some(profile_id)).await
    }

    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let user = self
            .get_user_by_email(&request.email.trim().to_lowercase())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let profile_id = self.get_profile_id(user.id, user.role).await?;
        self.issue_tokens(user, profile_id).await
    }

    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        let claims = self.jwt_service.validate_token(&request.refresh_token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }

        let access_token = self
            .jwt_service
            .create_access_token(user_id, &claims.email, claims.role)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Blacklist the access token and revoke every refresh token of the user
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        self.blacklist_token(&claims.jti, claims.exp as i64).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        Ok(MessageResponse::new("Successfully logged out"))
    }

    pub async fn me(&self, session: &UserSession) -> Result<UserInfo, AuthError> {
        let user = self
            .get_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let profile_id = self.get_profile_id(user.id, user.role).await?;

        Ok(user_info(user, profile_id))
    }

    pub async fn change_password(
        &self,
        session: &UserSession,
        request: ChangePasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        request.validate()?;

        let user = self
            .get_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_password(&request.new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user.id)
            .execute(&self.db)
            .await?;

        self.revoke_user_refresh_tokens(user.id).await?;

        Ok(MessageResponse::new("Password changed successfully"))
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.is_some())
    }

    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        Ok(session)
    }

    // Private helper methods

    async fn issue_tokens(&self, user: User, profile_id: Option<Uuid>) -> Result<AuthResponse, AuthError> {
        let (access_token, refresh_token) = self
            .jwt_service
            .create_token_pair(user.id, &user.email, user.role)?;

        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: user_info(user, profile_id),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn get_profile_id(&self, user_id: Uuid, role: UserRole) -> Result<Option<Uuid>, AuthError> {
        let sql = match role {
            UserRole::Personal => "SELECT id FROM personal_profiles WHERE user_id = $1",
            UserRole::Student => "SELECT id FROM students WHERE user_id = $1",
            UserRole::Admin => return Ok(None),
        };

        let id = sqlx::query_scalar::<_, Uuid>(sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(id)
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.jwt_service.validate_token(refresh_token)?;
        let expires_at = chrono::DateTime::from_timestamp(claims.exp as i64, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(format!("{:x}", md5::compute(refresh_token)))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let token_hash = format!("{:x}", md5::compute(refresh_token));

        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND expires_at > NOW() AND NOT revoked",
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> Result<(), AuthError> {
        let expires_at = chrono::DateTime::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn user_info(user: User, profile_id: Option<Uuid>) -> UserInfo {
    UserInfo {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
        profile_id,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}
