//! Incremental UTF-8 decoding for byte fragments read off the wire.
//!
//! A response body arrives in arbitrarily sized pieces, so a multi-byte
//! character can be cut in half by a read boundary. [`Utf8Decoder`] keeps the
//! incomplete tail of one fragment and prepends it to the next, which makes
//! the decoded text independent of where the reads happened to split.

use bytes::{Buf, BytesMut};

/// Byte order mark, stripped once if it opens the stream.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Streaming UTF-8 decoder.
///
/// Invalid input is replaced with U+FFFD, one per maximal invalid subpart
/// (the same convention as [`String::from_utf8_lossy`]). A sequence that is
/// only incomplete is held back instead, until more bytes arrive or
/// [`finish`](Utf8Decoder::finish) is called. A leading byte order mark is
/// dropped, even when it arrives split over several fragments.
///
/// # Example
/// ```
/// use ssechat::utf8::Utf8Decoder;
///
/// let mut decoder = Utf8Decoder::new();
/// let bytes = "é".as_bytes();
///
/// assert_eq!(decoder.decode(&bytes[..1]), "");
/// assert_eq!(decoder.decode(&bytes[1..]), "é");
/// ```
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: BytesMut,
    bom_checked: bool,
}

impl Utf8Decoder {
    /// Create a decoder with nothing held back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next fragment.
    ///
    /// Returns the longest decodable text. A trailing incomplete sequence
    /// (at most three bytes) stays buffered for the next call.
    pub fn decode(&mut self, fragment: &[u8]) -> String {
        self.pending.extend_from_slice(fragment);

        if !self.bom_checked {
            if self.pending.len() < BOM.len() && BOM.starts_with(&self.pending) {
                return String::new();
            }
            if self.pending.starts_with(BOM) {
                self.pending.advance(BOM.len());
            }
            self.bom_checked = true;
        }

        let complete = self.pending.len() - incomplete_tail_len(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..complete]).into_owned();
        self.pending.advance(complete);
        text
    }

    /// Flush whatever is still held back.
    ///
    /// An incomplete sequence at end of input is genuinely invalid, so it
    /// decodes to a single replacement character.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }

    /// Number of bytes currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Length of a truncated but so far valid sequence at the end of `bytes`.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    (start..bytes.len())
        .find(|&at| {
            matches!(
                std::str::from_utf8(&bytes[at..]),
                Err(err) if err.valid_up_to() == 0 && err.error_len().is_none()
            )
        })
        .map_or(0, |at| bytes.len() - at)
}
