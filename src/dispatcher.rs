//! Central frame dispatch loop.
//!
//! The dispatcher owns both channels' frame buffers and their worker
//! endpoints, and waits on a single event queue fed by all four workers
//! (one reader and one writer per channel). Compared to polling each
//! channel's event with its own short timeout, the shared queue is a
//! wait-on-any: whichever channel completes first gets served first, and
//! outbound write completions are drained from the same wait.
//!
//! Per completed frame, the dispatcher:
//!
//!  1. copies the captured bytes into the owning channel's frame buffer
//!     (bounded copy, the buffer never grows past
//!     [`BUFFER_SIZE`](crate::framer::BUFFER_SIZE)),
//!  2. classifies the frame by its first byte and routes it: `Forward`
//!     frames are printed and relayed to the opposite channel in full wire
//!     form, `Log` frames are printed only, anything else is dropped,
//!  3. clears the buffer and re-arms the channel's reader exactly once.
//!
//! Frame payloads are printed to stdout verbatim (written as raw bytes,
//! never run through the formatting machinery) so frame contents cannot
//! inject into format strings.
//!
//! The loop polls with a short timeout so it observes the process-wide
//! shutdown flag promptly; on shutdown it stops polling and drops its
//! endpoints, which disconnects and terminates every worker.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use hexplay::HexViewBuilder;
use log::{debug, error, info, log_enabled, trace, warn, Level::Debug};

use crate::channel::ChannelRole;
use crate::error::BridgeError;
use crate::framer::{Frame, FrameKind, BUFFER_SIZE};

// =============================================================================
// Public Interface
// =============================================================================

/// Request a bridge shutdown. Safe to call from any thread (typically the
/// ctrl-c handler); the dispatcher observes the flag on its next poll
/// iteration, stops polling and releases its resources.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// How long one poll iteration waits for a completion before re-checking
/// the shutdown flag. Bounds responsiveness, not correctness: a completion
/// arriving late is simply picked up on a later iteration.
pub(crate) const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Depth of the shared completion queue. Two channels with at most one
/// frame and one outbound write in flight each never need more.
pub(crate) const EVENT_QUEUE_DEPTH: usize = 4;

pub(crate) fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Completion events published by the per-channel workers.
#[derive(Debug)]
pub(crate) enum BridgeEvent {
    /// A reader assembled one complete frame.
    FrameReady { role: ChannelRole, frame: Frame },
    /// A writer finished one outbound write. The result is logged but does
    /// not otherwise steer the loop (fire-and-forget write semantics).
    WriteComplete {
        role: ChannelRole,
        result: io::Result<()>,
    },
    /// A reader's wait for incoming data failed; its channel is stalled.
    ReaderError { role: ChannelRole, error: io::Error },
}

/// The dispatcher-side endpoints of one channel: where outbound frames and
/// re-arm tokens go, plus the channel's own frame buffer.
pub(crate) struct ChannelEndpoint {
    role: ChannelRole,
    outbound: SyncSender<Vec<u8>>,
    rearm: SyncSender<()>,
    frame_buf: Vec<u8>,
    stalled: bool,
}
impl ChannelEndpoint {
    pub(crate) fn new(
        role: ChannelRole,
        outbound: SyncSender<Vec<u8>>,
        rearm: SyncSender<()>,
    ) -> Self {
        ChannelEndpoint {
            role,
            outbound,
            rearm,
            frame_buf: Vec::with_capacity(BUFFER_SIZE),
            stalled: false,
        }
    }
}

pub(crate) struct Dispatcher {
    usb: ChannelEndpoint,
    bt: ChannelEndpoint,
    events: Receiver<BridgeEvent>,
}
impl Dispatcher {
    pub(crate) fn new(
        usb: ChannelEndpoint,
        bt: ChannelEndpoint,
        events: Receiver<BridgeEvent>,
    ) -> Self {
        Dispatcher { usb, bt, events }
    }

    /// Run the dispatch loop until shutdown is requested or both channels
    /// are stalled. Returns `true` when the loop terminated with errors.
    pub(crate) fn run(&mut self) -> bool {
        // Arm both readers for their first frame cycle.
        self.arm(ChannelRole::Usb);
        self.arm(ChannelRole::Bt);

        loop {
            if shutdown_requested() {
                info!("shutdown requested, stopping dispatch");
                return false;
            }
            if self.usb.stalled && self.bt.stalled {
                error!("both channels stalled, stopping dispatch");
                return true;
            }
            match self.events.recv_timeout(POLL_TIMEOUT) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {
                    // Nothing completed within the poll window; loop to
                    // re-check the shutdown flag.
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("all workers terminated unexpectedly");
                    return true;
                }
            }
        }
    }

    pub(crate) fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::FrameReady { role, frame } => self.handle_frame(role, frame),
            BridgeEvent::WriteComplete { role, result } => match result {
                Ok(()) => trace!("{}: outbound write complete", role),
                Err(e) => warn!("{}: outbound write failed: {}", role, e),
            },
            BridgeEvent::ReaderError { role, error } => {
                error!("{}", BridgeError::Wait { role, source: error });
                self.endpoint_mut(role).stalled = true;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Private stuff
    // -------------------------------------------------------------------------

    /// One complete frame cycle: buffer, classify, route, clear, re-arm.
    fn handle_frame(&mut self, role: ChannelRole, frame: Frame) {
        if frame.is_truncated() {
            warn!(
                "{}: frame exceeded {} bytes before a terminator, truncated",
                role, BUFFER_SIZE
            );
        }

        let (endpoint, opposite) = self.pair_mut(role);

        // Bounded copy into the channel's own frame buffer. The framer
        // already enforces the capacity; the copy enforces it again so an
        // oversized frame can never overrun the destination.
        endpoint.frame_buf.clear();
        let len = frame.as_bytes().len().min(BUFFER_SIZE);
        endpoint.frame_buf.extend_from_slice(&frame.as_bytes()[..len]);

        if log_enabled!(Debug) {
            let view = HexViewBuilder::new(&endpoint.frame_buf)
                .address_offset(0)
                .row_width(16)
                .finish();
            println!("{}", view);
        }

        match FrameKind::classify(&endpoint.frame_buf) {
            FrameKind::Forward => {
                print_payload(&endpoint.frame_buf[1..]);
                // Relay the complete wire frame so the far side can parse
                // it again: start byte, payload and terminator.
                if opposite.outbound.send(frame.to_wire()).is_err() {
                    warn!("{}: writer terminated, dropping outbound frame", opposite.role);
                }
            }
            FrameKind::Log => {
                print_payload(&endpoint.frame_buf[1..]);
            }
            FrameKind::Unclassified => {
                debug!("{}: dropping unclassified frame", role);
            }
        }

        endpoint.frame_buf.clear();

        // Re-arm the reader for the next cycle, exactly once. A failed
        // send means the reader is gone and the channel is stalled.
        let armed = endpoint.rearm.send(()).is_ok();
        if !armed {
            warn!("{}: reader terminated, channel stalled", endpoint.role);
            endpoint.stalled = true;
        }
    }

    fn arm(&mut self, role: ChannelRole) {
        let endpoint = self.endpoint_mut(role);
        if endpoint.rearm.send(()).is_err() {
            warn!("{}: reader terminated before first arm", role);
            endpoint.stalled = true;
        }
    }

    fn endpoint_mut(&mut self, role: ChannelRole) -> &mut ChannelEndpoint {
        match role {
            ChannelRole::Usb => &mut self.usb,
            ChannelRole::Bt => &mut self.bt,
        }
    }

    /// The endpoint owning `role` plus the opposite channel's endpoint.
    fn pair_mut(&mut self, role: ChannelRole) -> (&mut ChannelEndpoint, &mut ChannelEndpoint) {
        match role {
            ChannelRole::Usb => (&mut self.usb, &mut self.bt),
            ChannelRole::Bt => (&mut self.bt, &mut self.usb),
        }
    }
}

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Print a frame payload verbatim to stdout.
fn print_payload(payload: &[u8]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = write_payload(&mut out, payload);
}

/// Write a frame payload verbatim, one line per frame. The bytes are
/// written raw, not handed to the formatting machinery, so payload
/// contents cannot inject into a format string.
fn write_payload<W: Write>(out: &mut W, payload: &[u8]) -> io::Result<()> {
    out.write_all(payload)?;
    out.write_all(b"\n")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::Framer;
    use std::sync::mpsc::{self, Receiver};

    struct Plumbing {
        dispatcher: Dispatcher,
        usb_out: Receiver<Vec<u8>>,
        bt_out: Receiver<Vec<u8>>,
        usb_rearm: Receiver<()>,
        bt_rearm: Receiver<()>,
    }

    fn plumbing() -> Plumbing {
        let (usb_out_tx, usb_out) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let (bt_out_tx, bt_out) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let (usb_rearm_tx, usb_rearm) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let (bt_rearm_tx, bt_rearm) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let (_events_tx, events) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        Plumbing {
            dispatcher: Dispatcher::new(
                ChannelEndpoint::new(ChannelRole::Usb, usb_out_tx, usb_rearm_tx),
                ChannelEndpoint::new(ChannelRole::Bt, bt_out_tx, bt_rearm_tx),
                events,
            ),
            usb_out,
            bt_out,
            usb_rearm,
            bt_rearm,
        }
    }

    fn frame_from(stream: &[u8]) -> Frame {
        let mut framer = Framer::new();
        for &b in stream {
            if let Some(frame) = framer.push_byte(b) {
                return frame;
            }
        }
        panic!("stream did not complete a frame");
    }

    #[test]
    fn forward_frame_is_relayed_to_opposite_channel() {
        let mut p = plumbing();
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Usb,
            frame: frame_from(b"|hello|"),
        });
        assert_eq!(p.bt_out.try_recv().unwrap(), b"|hello|");
        assert!(p.usb_out.try_recv().is_err());
    }

    #[test]
    fn forwarding_is_symmetric() {
        let mut p = plumbing();
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Bt,
            frame: frame_from(b"|pong|"),
        });
        assert_eq!(p.usb_out.try_recv().unwrap(), b"|pong|");
        assert!(p.bt_out.try_recv().is_err());
    }

    #[test]
    fn log_frame_is_never_relayed() {
        let mut p = plumbing();
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Usb,
            frame: frame_from(b"!debug\n"),
        });
        assert!(p.bt_out.try_recv().is_err());
        assert!(p.usb_out.try_recv().is_err());
        // The cycle still completes and re-arms the reader.
        assert!(p.usb_rearm.try_recv().is_ok());
    }

    #[test]
    fn unclassified_frame_is_dropped() {
        let mut p = plumbing();
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Usb,
            frame: Frame::from_captured(b"xjunk".to_vec(), false),
        });
        assert!(p.bt_out.try_recv().is_err());
        assert!(p.usb_rearm.try_recv().is_ok());
    }

    #[test]
    fn rearms_exactly_once_per_cycle() {
        let mut p = plumbing();
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Usb,
            frame: frame_from(b"|ping|"),
        });
        assert!(p.usb_rearm.try_recv().is_ok());
        assert!(p.usb_rearm.try_recv().is_err());
        // The other channel's cycle is untouched.
        assert!(p.bt_rearm.try_recv().is_err());
    }

    #[test]
    fn interleaved_cycles_do_not_corrupt_each_other() {
        let mut p = plumbing();
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Usb,
            frame: frame_from(b"|ping|"),
        });
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Bt,
            frame: frame_from(b"!note\n"),
        });
        // A's forward went to B untouched by B's log frame, and B's log
        // frame produced no outbound traffic at all.
        assert_eq!(p.bt_out.try_recv().unwrap(), b"|ping|");
        assert!(p.usb_out.try_recv().is_err());
        assert!(p.usb_rearm.try_recv().is_ok());
        assert!(p.bt_rearm.try_recv().is_ok());
    }

    #[test]
    fn truncated_frame_is_still_routed() {
        let mut p = plumbing();
        let mut stream = vec![crate::framer::FORWARD_DELIMITER];
        stream.extend(std::iter::repeat(b'x').take(2 * BUFFER_SIZE));
        let frame = frame_from(&stream);
        assert!(frame.is_truncated());
        p.dispatcher.handle_event(BridgeEvent::FrameReady {
            role: ChannelRole::Usb,
            frame,
        });
        let relayed = p.bt_out.try_recv().unwrap();
        assert_eq!(relayed.len(), BUFFER_SIZE + 1);
    }

    #[test]
    fn payloads_are_logged_verbatim() {
        let mut console: Vec<u8> = Vec::new();
        write_payload(&mut console, frame_from(b"|hello|").payload()).unwrap();
        write_payload(&mut console, frame_from(b"!debug\n").payload()).unwrap();
        assert_eq!(console, b"hello\ndebug\n");
    }

    #[test]
    fn format_like_payloads_are_not_interpreted() {
        // Payload bytes that look like format directives must come out
        // untouched.
        let mut console: Vec<u8> = Vec::new();
        write_payload(&mut console, frame_from(b"|{}%s{:>8}|").payload()).unwrap();
        assert_eq!(console, b"{}%s{:>8}\n");
    }

    #[test]
    fn reader_error_stalls_the_channel() {
        let mut p = plumbing();
        p.dispatcher.handle_event(BridgeEvent::ReaderError {
            role: ChannelRole::Usb,
            error: io::Error::new(io::ErrorKind::BrokenPipe, "gone"),
        });
        assert!(p.dispatcher.usb.stalled);
        assert!(!p.dispatcher.bt.stalled);
    }

    #[test]
    fn run_exits_with_error_when_all_workers_are_gone() {
        // The events sender is dropped inside `plumbing()`, so the first
        // poll observes a disconnected queue.
        let mut p = plumbing();
        assert!(p.dispatcher.run());
        // The initial arming still happened, once per channel.
        assert!(p.usb_rearm.try_recv().is_ok());
        assert!(p.bt_rearm.try_recv().is_ok());
    }
}
