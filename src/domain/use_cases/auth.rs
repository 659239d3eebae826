use std::sync::Arc;

use once_cell::sync::Lazy;
use validator::Validate;

use crate::entities::token::AuthResponse;
use crate::entities::user::{LoginUser, NewUser, User};
use crate::errors::{AppError, AuthError};
use crate::repositories::user::UserRepository;
use crate::auth::password::{hash_password, verify_password};
use crate::repositories::token::TokenServiceRepository;

/// Verified against when the email is unknown, so both failure paths
/// spend the same hashing time.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    hash_password("dummy-password-for-timing").unwrap_or_default()
});

pub struct AuthHandler<R, T>
where
    R: UserRepository + ?Sized,
    T: TokenServiceRepository,
{
    pub user_repo: Arc<R>,
    pub token_service: T,
}

impl<R, T> AuthHandler<R, T>
where
    R: UserRepository + ?Sized,
    T: TokenServiceRepository,
{
    pub fn new(user_repo: Arc<R>, token_service: T) -> Self {
        AuthHandler {
            user_repo,
            token_service
        }
    }

    /// Creates the account, then logs in with the same credentials
    pub async fn register(&self, request: NewUser) -> Result<AuthResponse, AppError> {
        request.validate()?;

        let hashed_password = hash_password(&request.password)?;
        let user_insert = request.prepare_for_insert(hashed_password);

        let user_id = self.user_repo.create_user(&user_insert).await?;
        tracing::info!(%user_id, "User registered");

        self.login(request.login()).await.map_err(|e| match e {
            AuthError::InvalidCredentials | AuthError::MissingCredentials => AppError::UnauthorizedAccess,
            other => AppError::InternalError(other.to_string()),
        })
    }

    /// Checks credentials and issues an access token
    pub async fn login(&self, request: LoginUser) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let user = self.authenticate(&request.email, &request.password).await?;
        let access_token = self.token_service.issue_token(&user.email)?;

        tracing::info!(user_id = %user.id, "User logged in successfully");
        Ok(AuthResponse::new(access_token))
    }

    /// Unknown email and wrong password fail identically.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self.user_repo.get_user_by_email(email.trim())
            .await
            .map_err(|e| {
                tracing::error!("User lookup failed during login: {}", e);
                AuthError::InvalidCredentials
            })?;

        match user {
            Some(user) if verify_password(password, &user.password_hash) => Ok(user),
            Some(_) => Err(AuthError::InvalidCredentials),
            None => {
                let _ = verify_password(password, &DUMMY_HASH);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Maps a bearer token to its user. Bad signatures, expiry, an empty
    /// subject and unknown subjects all yield `InvalidCredentials`.
    pub async fn resolve_user(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.token_service.decode_token(token)?;

        let email = claims.sub.trim();
        if email.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        self.user_repo.get_user_by_email(email)
            .await
            .map_err(|e| {
                tracing::error!("User lookup failed during token check: {}", e);
                AuthError::InvalidCredentials
            })?
            .ok_or(AuthError::InvalidCredentials)
    }
}
