use std::fmt;

use chrono::{DateTime, Utc};

/// Session length requested from the web identity exchange.
pub const SESSION_DURATION_SECONDS: i32 = 3_600;
pub const ROLE_SESSION_NAME: &str = "workspace-backup-action";

/// Short-lived storage credentials for a single run.
///
/// `Debug` output never contains the secret key or session token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiry: DateTime<Utc>,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secrets() {
        let credentials = SessionCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: "session-token-value".to_string(),
            expiry: DateTime::<Utc>::UNIX_EPOCH,
        };

        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("ASIAEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("session-token-value"));
    }
}
