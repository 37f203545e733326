use chrono::{DateTime, Utc};

/// An operator's signed-in state. Created from a verified sign-in and dropped
/// on sign-out; nothing else grants access to the admin console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(username: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            expires_at,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}
