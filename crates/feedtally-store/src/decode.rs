//! Payload decoding: base64 transport encoding, optional gzip, then lossy
//! UTF-8.

use std::io::Read;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use flate2::read::MultiGzDecoder;
use thiserror::Error;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("corrupt gzip payload: {0}")]
    Gzip(#[source] std::io::Error),
}

/// Decode a base64 payload. Standard alphabet first, URL-safe second;
/// embedded whitespace is ignored.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match STANDARD.decode(&compact) {
        Ok(bytes) => Ok(bytes),
        Err(first) => URL_SAFE.decode(&compact).map_err(|_| DecodeError::Base64(first)),
    }
}

pub fn has_gzip_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

fn has_gzip_suffix(name: &str) -> bool {
    name.trim().to_ascii_lowercase().ends_with(".gz")
}

/// Turn raw artifact bytes into text.
///
/// Bytes are gunzipped when they start with the gzip magic or the name ends
/// in `.gz`. A `.gz` name whose bytes do not decompress is read as plain
/// text (the store may already have inflated it); bytes that carry the magic
/// but fail to decompress are an error. Invalid UTF-8 is replaced, never
/// rejected.
pub fn decode_text(name: &str, bytes: &[u8]) -> Result<String, DecodeError> {
    let magic = has_gzip_magic(bytes);
    if magic || has_gzip_suffix(name) {
        match gunzip(bytes) {
            Ok(inflated) => return Ok(String::from_utf8_lossy(&inflated).into_owned()),
            Err(e) if magic => return Err(DecodeError::Gzip(e)),
            Err(e) => {
                tracing::debug!(file = %name, error = %e, "gz suffix without gzip payload; reading as text");
            }
        }
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len().saturating_mul(4));
    MultiGzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}
