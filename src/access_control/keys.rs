//! Authorized key handling
//!
//! Parses authorized_keys lines and compares key material. Signature
//! verification is the SSH layer's job; here keys are only compared.

use crate::error::KeyError;
use ssh_key::{HashAlg, PublicKey};
use std::fs;
use std::path::Path;

/// Parse one authorized_keys line
///
/// Accepts an optional options prefix and a trailing comment, as sshd does.
/// Fields may be separated by spaces or tabs.
pub fn parse_authorized_key(text: &str) -> Result<PublicKey, KeyError> {
    let line = text.trim();
    if line.is_empty() {
        return Err(KeyError::Empty);
    }

    let fields = split_fields(line);
    match PublicKey::from_openssh(&fields.join(" ")) {
        Ok(key) => Ok(key),
        // The leading field may be an options list such as `restrict` or
        // `from="10.0.0.1",no-pty`
        Err(err) if fields.len() > 1 => PublicKey::from_openssh(&fields[1..].join(" "))
            .map_err(|_| KeyError::malformed(line, err)),
        Err(err) => Err(KeyError::malformed(line, err)),
    }
}

/// Split a line on unquoted whitespace
///
/// Double-quoted option values (`command="ls -l"`) stay in one field.
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = None;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if let Some(s) = start.take() {
                    fields.push(&line[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        fields.push(&line[s..]);
    }
    fields
}

/// Key lines of an authorized_keys document
///
/// Blank lines and `#` comments are skipped; every other line is returned
/// trimmed, whether or not it parses.
pub fn key_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Read the first public key from an authorized_keys style file
pub fn read_public_key_file(path: &Path) -> Result<PublicKey, KeyError> {
    let contents = fs::read_to_string(path).map_err(|source| KeyError::Read {
        path: path.display().to_string(),
        source,
    })?;
    match key_lines(&contents).next() {
        Some(line) => parse_authorized_key(line),
        None => Err(KeyError::Empty),
    }
}

/// Compare key material, ignoring comments
pub fn keys_equal(a: &PublicKey, b: &PublicKey) -> bool {
    a.key_data() == b.key_data()
}

/// SHA256 fingerprint in OpenSSH notation, for logging
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}
