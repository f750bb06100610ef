// src/exec/encoding.rs

//! Decoding of captured process output.
//!
//! Resolution order for the encoding of a Command:
//! 1. explicit `encoding` on the Command,
//! 2. `CMDPIPE_CMD_ENCODING` (process-wide default, read once),
//! 3. UTF-8.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::warn;

pub const ENCODING_ENV_VAR: &str = "CMDPIPE_CMD_ENCODING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
}

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Ascii => "ascii",
        }
    }

    /// Strict decode. The error string describes the first offending byte.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| e.to_string()),
            TextEncoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            TextEncoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            TextEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(format!(
                    "byte 0x{:02x} in position {pos}: ordinal not in range(128)",
                    bytes[pos]
                )),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err(format!("truncated data: odd length {}", bytes.len()));
    }
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| e.to_string())
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "utf8" | "u8" | "cp65001" => Ok(TextEncoding::Utf8),
            "utf16le" => Ok(TextEncoding::Utf16Le),
            "utf16be" => Ok(TextEncoding::Utf16Be),
            "latin1" | "iso88591" | "l1" => Ok(TextEncoding::Latin1),
            "ascii" | "usascii" => Ok(TextEncoding::Ascii),
            _ => Err(format!(
                "unsupported encoding: {s} (expected one of utf-8, utf-16le, utf-16be, latin-1, ascii)"
            )),
        }
    }
}

/// Process-wide default, from the environment or UTF-8.
pub fn default_encoding() -> TextEncoding {
    static DEFAULT: OnceLock<TextEncoding> = OnceLock::new();
    *DEFAULT.get_or_init(|| match std::env::var(ENCODING_ENV_VAR) {
        Ok(label) if !label.trim().is_empty() => label.parse().unwrap_or_else(|err| {
            warn!(%label, error = %err, "ignoring invalid CMDPIPE_CMD_ENCODING; falling back to utf-8");
            TextEncoding::Utf8
        }),
        _ => TextEncoding::Utf8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_labels() {
        assert_eq!("UTF-8".parse::<TextEncoding>(), Ok(TextEncoding::Utf8));
        assert_eq!("utf_16_le".parse::<TextEncoding>(), Ok(TextEncoding::Utf16Le));
        assert_eq!("ISO-8859-1".parse::<TextEncoding>(), Ok(TextEncoding::Latin1));
        assert_eq!(" ascii ".parse::<TextEncoding>(), Ok(TextEncoding::Ascii));
        assert!("shift-jis".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn decodes_strictly() {
        assert_eq!(TextEncoding::Utf8.decode("héllo".as_bytes()), Ok("héllo".into()));
        assert!(TextEncoding::Utf8.decode(&[0xff, 0xfe]).is_err());
        assert_eq!(TextEncoding::Latin1.decode(&[0x68, 0xe9]), Ok("hé".into()));
        assert!(TextEncoding::Ascii.decode(&[0x68, 0xe9]).is_err());
        assert_eq!(TextEncoding::Utf16Le.decode(&[0x68, 0x00, 0x69, 0x00]), Ok("hi".into()));
        assert_eq!(TextEncoding::Utf16Be.decode(&[0x00, 0x68]), Ok("h".into()));
        assert!(TextEncoding::Utf16Le.decode(&[0x68]).is_err());
    }
}
