//! Text encoding for delimited, plain text and JSON outputs

use crate::error::{RecorderError, Result};
use encoding_rs::Encoding;
use std::fs;
use std::path::Path;

/// Look up an encoding by its WHATWG label (`"utf-8"`, `"gbk"`, `"windows-1252"`, ...)
pub fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| RecorderError::InvalidConfig(format!("unknown encoding '{}'", label)))
}

pub fn encode(encoding: &'static Encoding, text: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// Decode, dropping a leading byte order mark
pub fn decode(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Whole file as text; a missing file reads as empty
pub fn read_to_string(path: &Path, encoding: &'static Encoding) -> Result<String> {
    match fs::read(path) {
        Ok(bytes) => Ok(decode(encoding, &bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_legacy_encoding() {
        let enc = lookup("windows-1252").unwrap();
        let bytes = encode(enc, "café");
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(decode(enc, &bytes), "café");
    }

    #[test]
    fn test_unknown_label() {
        assert!(lookup("klingon").is_err());
    }
}
