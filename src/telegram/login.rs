use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const HASH_FIELD: &str = "hash";

/// Sorted `key=value` lines joined by `\n`, over every field except `hash`.
pub fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(key, _)| key.as_str() != HASH_FIELD)
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex HMAC-SHA256 of the check string, keyed with SHA-256 of the bot token.
pub fn sign_fields(fields: &BTreeMap<String, String>, bot_token: &str) -> AppResult<String> {
    let secret = Sha256::digest(bot_token.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&secret)
        .map_err(|err| AppError::internal(format!("invalid login secret: {err}")))?;
    mac.update(data_check_string(fields).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the `hash` the login widget attached to `fields`.
pub fn verify_login(fields: &BTreeMap<String, String>, bot_token: &str) -> AppResult<()> {
    if bot_token.is_empty() {
        return Err(AppError::authentication("telegram login is not configured"));
    }

    let provided = fields
        .get(HASH_FIELD)
        .map(String::as_str)
        .filter(|hash| !hash.is_empty())
        .ok_or_else(|| AppError::authentication("login payload is not signed"))?;

    let expected = sign_fields(fields, bot_token)?;
    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        return Ok(());
    }

    Err(AppError::authentication("invalid login signature"))
}
