//! OAuth 1.0a request signing (HMAC-SHA1, user context), as the X API expects it.
//!
//! Only query/form parameters take part in the signature. JSON and multipart
//! bodies are not signed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

use crate::error::PublishError;

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone)]
pub(crate) struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

/// RFC 3986 percent-encoding: everything except unreserved characters.
pub(crate) fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

pub(crate) fn nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn oauth_params(creds: &Credentials, nonce: &str, timestamp: i64) -> Vec<(&'static str, String)> {
    vec![
        ("oauth_consumer_key", creds.consumer_key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_token", creds.token.clone()),
        ("oauth_version", "1.0".to_string()),
    ]
}

/// `METHOD&enc(url)&enc(sorted params)`. `url` must not carry a query string.
pub(crate) fn signature_base(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&joined)
    )
}

pub(crate) fn sign(base: &str, creds: &Credentials) -> Result<String, PublishError> {
    let key = format!(
        "{}&{}",
        percent_encode(&creds.consumer_secret),
        percent_encode(&creds.token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| PublishError::Transport(format!("oauth signing key: {e}")))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Value for the `Authorization` header. `extra` are the request's query/form parameters.
pub(crate) fn authorization_header(
    method: &str,
    url: &str,
    extra: &[(&str, &str)],
    creds: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> Result<String, PublishError> {
    let oauth = oauth_params(creds, nonce, timestamp);
    let mut all: Vec<(String, String)> = oauth
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    all.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    let signature = sign(&signature_base(method, url, &all), creds)?;

    let mut fields: Vec<(&str, String)> = oauth;
    fields.push(("oauth_signature", signature));
    fields.sort_by(|a, b| a.0.cmp(b.0));
    let header = fields
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {header}"))
}
