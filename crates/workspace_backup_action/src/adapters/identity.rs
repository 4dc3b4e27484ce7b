use crate::domain::credentials::SessionCredentials;

/// Holds the bearer token; not `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct WebIdentityRequest<'a> {
    pub role_arn: &'a str,
    pub region: &'a str,
    pub role_session_name: &'a str,
    pub web_identity_token: &'a str,
    pub duration_seconds: i32,
}

/// Federated "assume role with web identity" exchange.
pub trait IdentityExchange {
    fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest<'_>,
    ) -> Result<SessionCredentials, String>;
}
