//! Request signature checks for GitHub (`X-Hub-Signature-256`) and Slack (`X-Slack-Signature`).

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Slack rejects requests whose timestamp is older than five minutes.
pub const SLACK_MAX_SKEW_SECS: i64 = 60 * 5;

fn verify_hex_hmac(secret: &SecretString, parts: &[&[u8]], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    for part in parts {
        mac.update(part);
    }
    mac.verify_slice(&expected).is_ok()
}

pub fn verify_github(secret: &SecretString, body: &[u8], header: Option<&str>) -> bool {
    let Some(signature_hex) = header.and_then(|value| value.strip_prefix("sha256=")) else {
        return false;
    };
    verify_hex_hmac(secret, &[body], signature_hex)
}

/// Checks `v0=HMAC(secret, "v0:{timestamp}:{body}")` and the timestamp window against `now`.
pub fn verify_slack(
    secret: &SecretString,
    body: &[u8],
    timestamp: Option<&str>,
    signature: Option<&str>,
    now: i64,
) -> bool {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };
    let Ok(sent_at) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now - sent_at).abs() > SLACK_MAX_SKEW_SECS {
        return false;
    }
    let Some(signature_hex) = signature.strip_prefix("v0=") else {
        return false;
    };
    verify_hex_hmac(secret, &[b"v0:", timestamp.as_bytes(), b":", body], signature_hex)
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, parts: &[&[u8]]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key");
    for part in parts {
        mac.update(part);
    }
    hex::encode(mac.finalize().into_bytes())
}
