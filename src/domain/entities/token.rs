use serde::{ Serialize, Deserialize };

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
}

impl AuthResponse {
    pub fn new(access_token: String) -> Self {
        AuthResponse {
            access_token,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Signed payload of an access token. `sub` carries the user's email.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(flatten)]
    pub extra: ExtraClaims,
}

/// Typed home for claims beyond subject and expiry. Add fields here
/// (with `#[serde(default)]`) instead of passing untyped maps around.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ExtraClaims {}
