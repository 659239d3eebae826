use jsonwebtoken::{encode, Header, decode, Validation, Algorithm};
use chrono::{Utc, Duration};

use crate::entities::token::{Claims, ExtraClaims};
use crate::errors::AuthError;
use crate::repositories::token::TokenServiceRepository;
use crate::settings::{AppConfig, JwtKeys};


#[derive(Clone)]
pub struct JwtService {
    keys: JwtKeys,
    algorithm: Algorithm,
    access_expiration: Duration,
}

impl JwtService {
    /// Builds the service from validated configuration. Falls back to HS256
    /// if the configured algorithm is not an HMAC variant.
    pub fn new(config: &AppConfig) -> Self {
        let algorithm = config.jwt_algorithm().unwrap_or_else(|e| {
            tracing::warn!("{}; using HS256", e);
            Algorithm::HS256
        });

        JwtService {
            keys: JwtKeys::from(config),
            algorithm,
            access_expiration: Duration::minutes(config.jwt_expiration_minutes),
        }
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.access_expiration = expiration;
        self
    }

    pub fn issue_token(&self, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = (now + self.access_expiration).timestamp().max(0) as usize;

        let claims = Claims {
            sub: email.to_string(),
            exp,
            iat: now.timestamp() as usize,
            extra: ExtraClaims::default(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.keys.encoding).map_err(|e| {
            tracing::warn!("Failed to sign token: {}", e);
            AuthError::TokenCreation
        })
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let decoded = decode::<Claims>(token, &self.keys.decoding, &validation)?;
        Ok(decoded.claims)
    }
}

impl TokenServiceRepository for JwtService {
    fn issue_token(&self, email: &str) -> Result<String, AuthError> {
        self.issue_token(email)
    }

    fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.decode_token(token)
    }
}
