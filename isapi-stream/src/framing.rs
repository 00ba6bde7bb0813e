//! Incremental framing of the multipart alert stream body.
//!
//! The body is `multipart/x-mixed-replace`: boundary lines and part headers
//! around one XML document per notification. Network reads split and merge
//! parts arbitrarily, so the splitter buffers bytes and cuts out each
//! complete `EventNotificationAlert` element, ignoring everything between
//! documents. Boundaries are not trusted because firmware versions disagree
//! on them.

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

use isapi_parser::alert::ROOT_ELEMENT;

/// Longest namespace prefix recognised in front of the root element.
const MAX_PREFIX_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RootTag {
    /// Offset of the `<`
    start: usize,
    /// Offset just past the tag
    end: usize,
    closing: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Scan {
    Found(RootTag),
    /// A candidate tag runs off the end of the buffer
    Incomplete,
    NotFound,
}

/// Splits raw body chunks into complete alert documents.
#[derive(Debug)]
pub struct FrameSplitter {
    buffer: BytesMut,
    max_frame_bytes: usize,
    dropped: u64,
}

impl FrameSplitter {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame_bytes,
            dropped: 0,
        }
    }

    /// Append a chunk and return every document it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let open = match find_root_tag(&self.buffer, 0) {
                Scan::Found(tag) if !tag.closing => tag,
                Scan::Found(tag) => {
                    // stray closing tag outside any document
                    self.buffer.advance(tag.end);
                    continue;
                }
                Scan::Incomplete | Scan::NotFound => {
                    self.discard_preamble();
                    break;
                }
            };

            if open.start > 0 {
                self.buffer.advance(open.start);
            }
            let body_from = open.end - open.start;

            match find_root_tag(&self.buffer, body_from) {
                Scan::Found(tag) if tag.closing => {
                    frames.push(self.buffer.split_to(tag.end).freeze());
                }
                Scan::Found(tag) => {
                    debug!("Discarding unterminated alert document ({} bytes)", tag.start);
                    self.dropped += 1;
                    self.buffer.advance(tag.start);
                }
                Scan::Incomplete | Scan::NotFound => {
                    if self.buffer.len() > self.max_frame_bytes {
                        warn!(
                            "Discarding alert document larger than {} bytes",
                            self.max_frame_bytes
                        );
                        self.dropped += 1;
                        self.buffer.clear();
                    }
                    break;
                }
            }
        }

        frames
    }

    /// Bytes held while waiting for the rest of a document.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Documents thrown away as unterminated or oversized.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Drop bytes that cannot belong to a document, keeping a short tail
    /// that may be the beginning of the next root tag.
    fn discard_preamble(&mut self) {
        let keep_from = self
            .buffer
            .iter()
            .rposition(|&b| b == b'<')
            .filter(|&pos| self.buffer.len() - pos <= ROOT_ELEMENT.len() + MAX_PREFIX_LEN + 2);

        match keep_from {
            Some(pos) => self.buffer.advance(pos),
            None => self.buffer.clear(),
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.')
}

/// Find the next opening or closing root tag at or after `from`.
fn find_root_tag(haystack: &[u8], from: usize) -> Scan {
    let name = ROOT_ELEMENT.as_bytes();
    let mut pos = from;

    while pos + name.len() <= haystack.len() {
        let Some(offset) = haystack[pos..]
            .windows(name.len())
            .position(|window| window == name)
        else {
            return Scan::NotFound;
        };
        let at = pos + offset;
        let after = at + name.len();
        pos = at + 1;

        // walk back over an optional `prefix:`
        let mut back = at;
        if back > 0 && haystack[back - 1] == b':' {
            back -= 1;
            while back > 0 && is_name_byte(haystack[back - 1]) && at - back <= MAX_PREFIX_LEN {
                back -= 1;
            }
        }

        let (start, closing) = if back > 0 && haystack[back - 1] == b'<' {
            (back - 1, false)
        } else if back > 1 && haystack[back - 1] == b'/' && haystack[back - 2] == b'<' {
            (back - 2, true)
        } else {
            continue;
        };

        // the tag name may continue in the next chunk
        match haystack.get(after) {
            None => return Scan::Incomplete,
            Some(&b) if b == b'>' || b == b'/' || b.is_ascii_whitespace() => {}
            Some(_) => continue,
        }

        if !closing {
            return Scan::Found(RootTag {
                start,
                end: after,
                closing,
            });
        }

        return match haystack[after..].iter().position(|&b| b == b'>') {
            Some(gt) => Scan::Found(RootTag {
                start,
                end: after + gt + 1,
                closing,
            }),
            None => Scan::Incomplete,
        };
    }

    if pos < haystack.len() && name.starts_with(&haystack[pos..]) {
        Scan::Incomplete
    } else {
        Scan::NotFound
    }
}
