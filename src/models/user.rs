use serde::Serialize;

/// An account. `credential` is the encoded Argon2id string, never the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential: String,
}
