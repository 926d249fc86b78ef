use thiserror::Error;

use crate::backend::AuthBackend;
use crate::domain::{Role, User, GUEST_EMAIL, GUEST_NICKNAME};
use crate::error::ApiError;
use crate::session::SessionContext;
use crate::session_store::SessionError;
use crate::token::{decode_user, DecodeError};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Log in with an access token obtained elsewhere (e.g. the OAuth callback).
pub fn login_with_token(session: &SessionContext, token: &str) -> Result<User, AuthError> {
    let token = token.trim();
    let user = decode_user(token)?;
    session.login(user.clone(), token)?;
    tracing::info!(user_id = user.id, "logged in with access token");
    Ok(user)
}

/// Ask the backend for an anonymous trial session and store it.
pub async fn guest_login<B: AuthBackend + ?Sized>(
    backend: &B,
    session: &SessionContext,
) -> Result<User, AuthError> {
    let guest = backend.guest_login().await?;

    // The guest endpoint omits most identity fields; fill the gaps from the
    // token when it decodes, and from fixed guest values otherwise.
    let decoded = decode_user(&guest.access_token).ok();
    let user = User {
        id: guest
            .id
            .or_else(|| decoded.as_ref().map(|u| u.id))
            .unwrap_or(0),
        email: decoded
            .as_ref()
            .map(|u| u.email.clone())
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| GUEST_EMAIL.to_string()),
        nickname: guest
            .nickname
            .filter(|nickname| !nickname.is_empty())
            .unwrap_or_else(|| GUEST_NICKNAME.to_string()),
        role: Role::User,
    };

    session.login(user.clone(), guest.access_token)?;
    tracing::info!(user_id = user.id, "logged in as guest");
    Ok(user)
}
