use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};

use crate::error::{ChannelError, Result};

/// Text encoding a channel uses to turn bytes into characters and back.
///
/// The encoding is fixed for the life of a channel. All supported encodings
/// are stateless on the encode side, so encoding texts one at a time and
/// concatenating the bytes is the same as encoding their concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl TextEncoding {
    /// Canonical name, as used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Ascii => "US-ASCII",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Append the encoded form of `text` to `dst`.
    ///
    /// Nothing is written if `text` contains a character the encoding cannot
    /// represent.
    pub fn encode(self, text: &str, dst: &mut BytesMut) -> Result<()> {
        match self {
            TextEncoding::Utf8 => {
                dst.extend_from_slice(text.as_bytes());
            }
            TextEncoding::Ascii => {
                if let Some(ch) = text.chars().find(|ch| !ch.is_ascii()) {
                    return Err(self.unencodable(ch));
                }
                dst.extend_from_slice(text.as_bytes());
            }
            TextEncoding::Latin1 => {
                if let Some(ch) = text.chars().find(|ch| u32::from(*ch) > 0xFF) {
                    return Err(self.unencodable(ch));
                }
                dst.reserve(text.len());
                for ch in text.chars() {
                    dst.put_u8(u32::from(ch) as u8);
                }
            }
        }
        Ok(())
    }

    /// A fresh incremental decoder for this encoding.
    pub fn decoder(self) -> Decoder {
        Decoder {
            encoding: self,
            carry: Vec::new(),
        }
    }

    fn unencodable(self, ch: char) -> ChannelError {
        ChannelError::Unencodable {
            encoding: self.name(),
            ch,
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(TextEncoding::Latin1),
            other => Err(format!("unsupported text encoding: {other}")),
        }
    }
}

/// Incremental byte-to-text decoder.
///
/// A multi-byte sequence cut off at the end of one read is carried over and
/// completed by the next. [`finish`](Decoder::finish) marks the end of input.
#[derive(Debug)]
pub struct Decoder {
    encoding: TextEncoding,
    carry: Vec<u8>,
}

impl Decoder {
    /// Decode `bytes`, appending complete characters to `out`.
    ///
    /// Returns the number of characters appended. On malformed input the
    /// characters before the bad sequence are appended, the bad sequence is
    /// dropped, and the bytes after it are held back; call again (with an
    /// empty slice if nothing new arrived) to continue past it.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String) -> Result<usize> {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(bytes);

        let (decoded, consumed, malformed) = match self.encoding {
            TextEncoding::Utf8 => decode_utf8(&data, out),
            TextEncoding::Ascii => {
                let valid = data.iter().take_while(|b| b.is_ascii()).count();
                out.extend(data[..valid].iter().map(|b| char::from(*b)));
                if valid < data.len() {
                    (valid, valid + 1, true)
                } else {
                    (valid, valid, false)
                }
            }
            TextEncoding::Latin1 => {
                out.extend(data.iter().map(|b| char::from(*b)));
                (data.len(), data.len(), false)
            }
        };

        self.carry = data.split_off(consumed);
        if malformed {
            return Err(ChannelError::Decode {
                encoding: self.encoding.name(),
            });
        }
        Ok(decoded)
    }

    /// Bytes held back: an unfinished multi-byte character, or input after a
    /// malformed sequence that has not been decoded yet.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// End of input. Bytes still held back can never complete a character,
    /// so they are dropped and reported as malformed.
    pub fn finish(&mut self) -> Result<()> {
        if self.carry.is_empty() {
            return Ok(());
        }
        self.carry.clear();
        Err(ChannelError::Decode {
            encoding: self.encoding.name(),
        })
    }
}

/// Returns `(chars appended, bytes consumed, hit a malformed sequence)`.
fn decode_utf8(data: &[u8], out: &mut String) -> (usize, usize, bool) {
    let (valid_len, malformed_len) = match std::str::from_utf8(data) {
        Ok(_) => (data.len(), None),
        Err(err) => (err.valid_up_to(), err.error_len()),
    };

    let valid = std::str::from_utf8(&data[..valid_len]).unwrap_or_default();
    out.push_str(valid);
    let chars = valid.chars().count();

    match malformed_len {
        Some(bad) => (chars, valid_len + bad, true),
        // An incomplete trailing sequence stays for the next read.
        None => (chars, valid_len, false),
    }
}
