//! IRC line codec.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::common::PierError;

/// Maximum length of a line on the wire, CRLF included.
pub const MAX_LINE_LENGTH: usize = 512;

/// Inbound lines longer than this (tags included) are treated as a broken stream.
const MAX_INBOUND_LENGTH: usize = 8191 + MAX_LINE_LENGTH;

/// Codec for CRLF terminated IRC lines.
///
/// Servers are not required to send valid UTF-8, so decoding is lossy.
/// Outgoing lines are cut to fit [`MAX_LINE_LENGTH`], and any CR, LF or NUL
/// left inside them is replaced with a space.
#[derive(Debug, Default)]
pub struct IrcLineCodec {
    /// Bytes already scanned for a newline.
    next_index: usize,
}

impl IrcLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for IrcLineCodec {
    type Item = String;
    type Error = PierError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_INBOUND_LENGTH {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "IRC line exceeds maximum length",
                    )
                    .into());
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            if end == 0 {
                continue;
            }

            return Ok(Some(String::from_utf8_lossy(&line[..end]).into_owned()));
        }
    }
}

impl Encoder<String> for IrcLineCodec {
    type Error = PierError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let item = item.trim_end_matches(['\r', '\n']);
        let mut end = item.len().min(MAX_LINE_LENGTH - 2);
        while !item.is_char_boundary(end) {
            end -= 1;
        }

        dst.reserve(end + 2);
        for byte in item[..end].bytes() {
            dst.put_u8(match byte {
                b'\r' | b'\n' | b'\0' => b' ',
                other => other,
            });
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// A framed IRC connection.
pub type IrcConnection<S> = Framed<S, IrcLineCodec>;

/// Create a new IRC connection from a stream.
pub fn new_irc_connection<S: AsyncRead + AsyncWrite>(stream: S) -> IrcConnection<S> {
    Framed::new(stream, IrcLineCodec::new())
}
