//! Plain text passthrough with encoding detection.

use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::debug;

use crate::error::Result;
use crate::registry::Extractor;

/// Re-encodes plain text files as UTF-8.
///
/// A byte order mark wins, valid UTF-8 is kept as is, and anything else is
/// decoded with the encoding `chardetng` guesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Extensions handled by this extractor in the default registry.
    pub const EXTENSIONS: &'static [&'static str] = &[".txt", ".md", ".csv", ".log"];
}

impl Extractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        Ok(decode(&bytes))
    }
}

fn decode(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    debug!("Decoding text as {}", encoding.name());

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!("Replaced malformed sequences while decoding as {}", encoding.name());
    }
    text.into_owned()
}
