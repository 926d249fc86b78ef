use serde::{Deserialize, Serialize};

/// Role claim carried in the access token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Role {
    #[default]
    #[serde(rename = "ROLE_USER", alias = "USER")]
    User,
    #[serde(rename = "ROLE_ADMIN", alias = "ADMIN")]
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// The logged-in user, as decoded from the access token or built from a guest login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    #[serde(default)]
    pub role: Role,
}

/// Body of `GET /auth/guest`. This endpoint answers without the usual envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestLogin {
    pub access_token: String,
    pub nickname: Option<String>,
    pub id: Option<i64>,
}

pub const GUEST_EMAIL: &str = "guest@prism.com";
pub const GUEST_NICKNAME: &str = "Guest";
