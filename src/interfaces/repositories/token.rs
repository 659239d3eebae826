use crate::{entities::token::Claims, errors::AuthError};


pub trait TokenServiceRepository: Send + Sync {
    /// Signs an access token whose subject is the user's email
    fn issue_token(&self, email: &str) -> Result<String, AuthError>;

    /// Verifies signature and expiry and returns the claims
    fn decode_token(&self, token: &str) -> Result<Claims, AuthError>;
}
