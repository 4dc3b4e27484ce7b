use std::fs;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::adapters::identity::{IdentityExchange, WebIdentityRequest};
use crate::domain::credentials::{SessionCredentials, ROLE_SESSION_NAME, SESSION_DURATION_SECONDS};
use crate::error::BackupError;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    aud: Option<Audience>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(value) => value == expected,
            Self::Many(values) => values.iter().any(|value| value == expected),
        }
    }
}

/// Exchanges the platform identity token for short-lived storage credentials.
///
/// The exchange is attempted once. When `audience` is set and the token's
/// `aud` claim does not contain it, a warning is logged and the exchange still
/// runs; the identity provider trust policy decides whether the token is
/// accepted.
pub fn exchange_credentials(
    role_arn: &str,
    region: &str,
    audience: Option<&str>,
    token_file: &Path,
    exchange: &impl IdentityExchange,
) -> Result<SessionCredentials, BackupError> {
    let token = load_identity_token(token_file)?;
    if let Some(audience) = audience {
        if let Err(reason) = verify_audience(&token, audience) {
            tracing::warn!(
                component = "credential_broker",
                event = "audience_unverified",
                audience,
                reason = %reason,
            );
        }
    }

    let request = WebIdentityRequest {
        role_arn,
        region,
        role_session_name: ROLE_SESSION_NAME,
        web_identity_token: &token,
        duration_seconds: SESSION_DURATION_SECONDS,
    };
    let credentials = exchange
        .assume_role_with_web_identity(&request)
        .map_err(BackupError::Auth)?;

    tracing::info!(
        component = "credential_broker",
        event = "credentials_exchanged",
        role_arn,
        region,
        expiry = %credentials.expiry.to_rfc3339(),
    );
    Ok(credentials)
}

pub fn load_identity_token(path: &Path) -> Result<String, BackupError> {
    let contents = fs::read_to_string(path).map_err(|error| {
        BackupError::Auth(format!(
            "failed to read identity token from {}: {error}",
            path.display()
        ))
    })?;

    let token = contents.trim();
    if token.is_empty() {
        return Err(BackupError::Auth(format!(
            "identity token file {} is empty",
            path.display()
        )));
    }
    Ok(token.to_string())
}

/// Checks the token's `aud` claim without verifying its signature.
pub fn verify_audience(token: &str, audience: &str) -> Result<(), String> {
    let claims = decode_claims(token)?;
    match claims.aud {
        Some(aud) if aud.contains(audience) => Ok(()),
        Some(_) => Err(format!(
            "identity token was not issued for audience '{audience}'"
        )),
        None => Err("identity token carries no audience claim".to_string()),
    }
}

fn decode_claims(token: &str) -> Result<TokenClaims, String> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| "identity token is not a JWT".to_string())?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|error| format!("identity token payload is not base64: {error}"))?;

    serde_json::from_slice(&bytes)
        .map_err(|error| format!("identity token claims are malformed: {error}"))
}
