// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lenient response decoding: take the first top-level JSON value off a
//! plugin's stdout and ignore anything the plugin wrote after it.

use thiserror::Error;

use crate::response::ProtocolResponse;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no JSON value found in plugin stdout")]
    NoValue,
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse the first JSON document in `stdout` as a [`ProtocolResponse`].
///
/// Plugins may write banner lines or trailing diagnostics before or
/// after the protocol document; this scans forward to the first byte
/// that starts a parseable JSON value and ignores everything after it.
pub fn decode_response(stdout: &[u8]) -> Result<ProtocolResponse, DecodeError> {
    let mut last_err = None;
    for (offset, byte) in stdout.iter().enumerate() {
        if *byte != b'{' {
            continue;
        }
        let mut stream =
            serde_json::Deserializer::from_slice(&stdout[offset..]).into_iter::<ProtocolResponse>();
        match stream.next() {
            Some(Ok(response)) => return Ok(response),
            Some(Err(e)) => last_err = Some(e),
            None => {}
        }
    }
    match last_err {
        Some(e) => Err(DecodeError::Malformed(e)),
        None => Err(DecodeError::NoValue),
    }
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
