use crate::errors::RecorderError;
use crate::runtime::Clock;
use sha2::{Digest, Sha256};
use std::time::UNIX_EPOCH;

pub const TOKEN_LEN: usize = 9;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub fn derive_token(run_id: &str, context_name: &str) -> String {
    let mut digest = Sha256::new();
    digest.update(run_id.as_bytes());
    digest.update([0u8]);
    digest.update(context_name.as_bytes());
    let bytes = digest.finalize();
    bytes
        .iter()
        .take(TOKEN_LEN)
        .map(|byte| ALPHABET[usize::from(*byte) % ALPHABET.len()] as char)
        .collect()
}

pub fn validate_token(token: &str) -> Result<(), RecorderError> {
    if token.is_empty() {
        return Err(RecorderError::InvalidConfig(
            "context token must not be empty".to_string(),
        ));
    }
    if let Some(bad) = token
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(RecorderError::InvalidConfig(format!(
            "context token `{token}` contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

pub fn default_run_id(clock: &dyn Clock) -> String {
    let secs = clock
        .now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("run-{secs}")
}
