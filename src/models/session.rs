use chrono::{DateTime, Utc};

/// A login session. The plaintext token is only handed out once, at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub expires: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        let session = Session {
            id: 1,
            token: "t".to_string(),
            user_id: 1,
            expires: now,
        };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - Duration::seconds(1)));
    }
}
