//! Incremental assembly of delimited text frames from a raw byte stream.
//!
//! The wire format carries two kinds of frames, distinguished by their start
//! byte:
//!
//!  * **forward** frames: `|` + payload + `|`, relayed to the opposite
//!    channel,
//!  * **log** frames: `!` + payload + line-feed, recorded locally only.
//!
//! There is no length prefix, no checksum and no escaping; a payload
//! containing its own terminator byte ends the frame early. Anything on the
//! wire before a start byte is line noise and is discarded.
//!
//! The [`Framer`] is a byte-at-a-time state machine: feed it one byte per
//! call and it hands back a completed [`Frame`] when the terminator (or the
//! capacity limit) is reached. It never reads ahead and never backtracks,
//! which makes it usable directly on top of a serial port that delivers
//! bytes at its own pace.

use std::mem;

// =============================================================================
// Public Interface
// =============================================================================

/// Fixed capacity of a channel's frame buffer. A frame never grows beyond
/// this many bytes; see [`Frame::is_truncated`].
pub const BUFFER_SIZE: usize = 1024;

/// Start byte (and terminator) of a forward frame.
pub const FORWARD_DELIMITER: u8 = b'|';
/// Start byte of a log frame.
pub const LOG_START: u8 = b'!';
/// Terminator of a log frame.
pub const LOG_TERMINATOR: u8 = b'\n';

/// What the dispatcher should do with a completed frame, derived from its
/// first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Starts with `|`: relay to the opposite channel (and log it).
    Forward,
    /// Starts with `!`: record locally, never relayed.
    Log,
    /// Anything else: dropped without further processing.
    Unclassified,
}
impl FrameKind {
    /// Classify a frame from its first byte. An empty buffer classifies as
    /// `Unclassified`.
    pub fn classify(bytes: &[u8]) -> FrameKind {
        match bytes.first() {
            Some(&FORWARD_DELIMITER) => FrameKind::Forward,
            Some(&LOG_START) => FrameKind::Log,
            _ => FrameKind::Unclassified,
        }
    }
}

/// One complete delimited message extracted from a channel's byte stream.
///
/// The captured bytes include the start byte and exclude the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    truncated: bool,
}
impl Frame {
    /// The captured bytes: start byte included, terminator excluded.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload: everything after the start byte.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or(&[])
    }

    pub fn kind(&self) -> FrameKind {
        FrameKind::classify(&self.bytes)
    }

    /// `true` when the frame hit [`BUFFER_SIZE`] before a terminator was
    /// seen and was force-completed.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Build a frame straight from captured bytes, bypassing the framer.
    #[cfg(test)]
    pub(crate) fn from_captured(bytes: Vec<u8>, truncated: bool) -> Frame {
        Frame { bytes, truncated }
    }

    /// Re-emit the frame in its wire form: start byte, payload and the
    /// terminator matching the frame kind. This is what gets relayed to the
    /// opposite channel for forward frames.
    pub fn to_wire(&self) -> Vec<u8> {
        let terminator = match self.kind() {
            FrameKind::Log => LOG_TERMINATOR,
            _ => FORWARD_DELIMITER,
        };
        let mut wire = Vec::with_capacity(self.bytes.len() + 1);
        wire.extend_from_slice(&self.bytes);
        wire.push(terminator);
        wire
    }
}

/// Byte-at-a-time frame assembler.
///
/// Push bytes with [`push_byte`](Framer::push_byte); every call either
/// returns a completed frame or `None`. After a frame is returned the framer
/// is back in its scan-for-start state, ready for the next frame.
#[derive(Debug)]
pub struct Framer {
    buf: Vec<u8>,
    state: FramerState,
}

// =============================================================================
// Private stuff
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    /// Discarding bytes until a start marker (`|` or `!`) is seen.
    ScanForStart,
    /// Accumulating payload bytes until `terminator` or capacity.
    Accumulate { terminator: u8 },
}

impl Framer {
    pub fn new() -> Self {
        Framer {
            buf: Vec::with_capacity(BUFFER_SIZE),
            state: FramerState::ScanForStart,
        }
    }

    /// Feed one byte to the assembler. Returns a completed frame when
    /// `byte` is the terminator of the frame in progress, or when the
    /// accumulated frame reaches [`BUFFER_SIZE`] (truncation).
    ///
    /// The start byte is retained as the first buffer byte; the terminator
    /// is consumed but not stored.
    pub fn push_byte(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            FramerState::ScanForStart => {
                match byte {
                    FORWARD_DELIMITER => {
                        self.buf.push(byte);
                        self.state = FramerState::Accumulate {
                            terminator: FORWARD_DELIMITER,
                        };
                    }
                    LOG_START => {
                        self.buf.push(byte);
                        self.state = FramerState::Accumulate {
                            terminator: LOG_TERMINATOR,
                        };
                    }
                    // Leading junk before a start marker.
                    _ => {}
                }
                None
            }
            FramerState::Accumulate { terminator } => {
                if byte == terminator {
                    return Some(self.complete(false));
                }
                self.buf.push(byte);
                if self.buf.len() >= BUFFER_SIZE {
                    return Some(self.complete(true));
                }
                None
            }
        }
    }

    fn complete(&mut self, truncated: bool) -> Frame {
        self.state = FramerState::ScanForStart;
        Frame {
            bytes: mem::replace(&mut self.buf, Vec::with_capacity(BUFFER_SIZE)),
            truncated,
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Framer::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
fn feed(framer: &mut Framer, stream: &[u8]) -> Option<Frame> {
    for &b in stream {
        if let Some(frame) = framer.push_byte(b) {
            return Some(frame);
        }
    }
    None
}

#[test]
fn forward_frame_between_delimiters() {
    let mut framer = Framer::new();
    let frame = feed(&mut framer, b"|hello|").unwrap();
    assert_eq!(frame.kind(), FrameKind::Forward);
    assert_eq!(frame.as_bytes(), b"|hello");
    assert_eq!(frame.payload(), b"hello");
    assert!(!frame.is_truncated());
}

#[test]
fn log_frame_until_line_feed() {
    let mut framer = Framer::new();
    let frame = feed(&mut framer, b"!debug\n").unwrap();
    assert_eq!(frame.kind(), FrameKind::Log);
    assert_eq!(frame.payload(), b"debug");
    assert!(!frame.is_truncated());
}

#[test]
fn leading_junk_is_discarded() {
    let mut framer = Framer::new();
    let frame = feed(&mut framer, b"\r\n garbage |ping|").unwrap();
    assert_eq!(frame.payload(), b"ping");
}

#[test]
fn log_frame_may_contain_pipe_bytes() {
    let mut framer = Framer::new();
    let frame = feed(&mut framer, b"!a|b\n").unwrap();
    assert_eq!(frame.kind(), FrameKind::Log);
    assert_eq!(frame.payload(), b"a|b");
}

#[test]
fn forward_frame_ends_at_first_pipe() {
    // No escaping on the wire; an embedded terminator ends the frame early.
    let mut framer = Framer::new();
    let frame = feed(&mut framer, b"|a!b|c|").unwrap();
    assert_eq!(frame.payload(), b"a!b");
}

#[test]
fn empty_payload_frame() {
    let mut framer = Framer::new();
    let frame = feed(&mut framer, b"||").unwrap();
    assert_eq!(frame.kind(), FrameKind::Forward);
    assert_eq!(frame.payload(), b"");
}

#[test]
fn truncates_at_buffer_size_without_terminator() {
    let mut framer = Framer::new();
    let mut stream = vec![FORWARD_DELIMITER];
    stream.extend(std::iter::repeat(b'x').take(2 * BUFFER_SIZE));
    let frame = feed(&mut framer, &stream).unwrap();
    assert_eq!(frame.as_bytes().len(), BUFFER_SIZE);
    assert!(frame.is_truncated());
}

#[test]
fn resets_after_completed_frame() {
    let mut framer = Framer::new();
    assert_eq!(feed(&mut framer, b"|one|").unwrap().payload(), b"one");
    assert_eq!(feed(&mut framer, b"!two\n").unwrap().payload(), b"two");
}

#[test]
fn classification_from_first_byte() {
    assert_eq!(FrameKind::classify(b"|fwd"), FrameKind::Forward);
    assert_eq!(FrameKind::classify(b"!log"), FrameKind::Log);
    assert_eq!(FrameKind::classify(b"xother"), FrameKind::Unclassified);
    assert_eq!(FrameKind::classify(b""), FrameKind::Unclassified);
}

#[test]
fn wire_form_restores_terminator() {
    let mut framer = Framer::new();
    let frame = feed(&mut framer, b"|hello|").unwrap();
    assert_eq!(frame.to_wire(), b"|hello|");
    let frame = feed(&mut framer, b"!note\n").unwrap();
    assert_eq!(frame.to_wire(), b"!note\n");
}
