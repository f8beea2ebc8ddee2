//! Identifier escaping for file names.
//!
//! File names are restricted: separators are forbidden, some filesystems fold case,
//! and leading dots hide files. [`KeyEscaper`] maps any identifier to a name made of
//! lowercase ASCII letters, digits, `-` and `_`, percent-encoding every other UTF-8
//! byte as `%XX` with uppercase hex digits.
//!
//! The mapping is a bijection onto the keys it produces: [`KeyEscaper::unescape`]
//! accepts exactly those keys and rejects anything else (lowercase hex digits,
//! truncated escapes, characters that would have been escaped, invalid UTF-8).

use quarry_core::error::{DocumentStoreError, DocumentStoreResult};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

pub(crate) struct KeyEscaper;

impl KeyEscaper {
    fn is_plain(byte: u8) -> bool {
        byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' || byte == b'_'
    }

    fn hex_value(byte: u8) -> Option<u8> {
        match byte {
            b'0'..=b'9' => Some(byte - b'0'),
            b'A'..=b'F' => Some(byte - b'A' + 10),
            _ => None,
        }
    }

    /// Escapes an identifier into a file stem.
    pub(crate) fn escape(id: &str) -> String {
        let mut escaped = String::with_capacity(id.len());

        for &byte in id.as_bytes() {
            if Self::is_plain(byte) {
                escaped.push(byte as char);
            } else {
                escaped.push('%');
                escaped.push(HEX[(byte >> 4) as usize] as char);
                escaped.push(HEX[(byte & 0x0F) as usize] as char);
            }
        }

        escaped
    }

    /// Restores the identifier a file stem was escaped from.
    pub(crate) fn unescape(key: &str) -> DocumentStoreResult<String> {
        let invalid = || DocumentStoreError::InvalidIdentifier(key.to_string());

        if key.is_empty() {
            return Err(invalid());
        }

        let bytes = key.as_bytes();
        let mut decoded = Vec::with_capacity(bytes.len());
        let mut position = 0;

        while position < bytes.len() {
            let byte = bytes[position];

            if byte == b'%' {
                let high = bytes.get(position + 1).copied().and_then(Self::hex_value);
                let low = bytes.get(position + 2).copied().and_then(Self::hex_value);
                let (Some(high), Some(low)) = (high, low) else {
                    return Err(invalid());
                };

                let value = (high << 4) | low;
                // A plain byte would never have been escaped.
                if Self::is_plain(value) {
                    return Err(invalid());
                }

                decoded.push(value);
                position += 3;
            } else if Self::is_plain(byte) {
                decoded.push(byte);
                position += 1;
            } else {
                return Err(invalid());
            }
        }

        String::from_utf8(decoded).map_err(|_| invalid())
    }
}
