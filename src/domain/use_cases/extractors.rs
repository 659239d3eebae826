use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{ready, Ready};

use crate::{entities::user::User, errors::AuthError};

/// The user resolved by `AuthMiddleware` for this request.
/// Returns 401 if the request was not authenticated.
/// Usage: Add `user: CurrentUser` as a parameter to your handler function.
#[derive(Debug)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<User>() {
            Some(user) => ready(Ok(CurrentUser(user.clone()))),
            None => ready(Err(AuthError::MissingCredentials.into())),
        }
    }
}
