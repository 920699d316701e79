//! Error classification shared by every service.
//!
//! Each service returns its own closed error enum; callers that only need to
//! decide *how* to react (status code, retry, re-login) switch on [`ErrorKind`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed caller input (username, email, password, path shape).
    InvalidInput,

    /// Missing or wrong credentials, or an unknown session.
    NotAuthenticated,

    /// Missing user, session, file row or file. Path escapes land here too.
    NotFound,

    /// Duplicate username, email or file path.
    Conflict,

    /// The session existed but is past its expiry.
    Expired,

    /// I/O or store failure, or corrupted stored data.
    Internal,
}
