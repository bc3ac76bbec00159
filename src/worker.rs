//! Per-channel worker loops.
//!
//! Each channel gets two long-lived workers on their own threads:
//!
//!  * a **reader** that produces exactly one frame per cycle: it waits for
//!    a re-arm token from the dispatcher, pulls bytes off the transport one
//!    at a time, drives the [`Framer`](crate::framer::Framer) to a complete
//!    frame and publishes it as a [`BridgeEvent::FrameReady`];
//!  * a **writer** that drains outbound frames queued by the dispatcher,
//!    writes them to the transport and publishes
//!    [`BridgeEvent::WriteComplete`].
//!
//! The dispatcher never joins a worker. Workers terminate on their own when
//! their channels disconnect (dispatcher dropped its endpoints on shutdown)
//! or when the transport fails. The re-arm token bounds the readers to a
//! single frame in flight per channel: a reader will not touch the
//! transport again until the dispatcher has consumed the previous frame.
//!
//! Both loops are generic over the raw transport (`io::Read` / `io::Write`)
//! so they can be exercised against scripted streams; production code hands
//! them the serial port handles.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use log::trace;

use crate::channel::{read_byte, Channel, ChannelRole};
use crate::dispatcher::{shutdown_requested, BridgeEvent, ChannelEndpoint, EVENT_QUEUE_DEPTH};
use crate::error::BridgeError;
use crate::framer::Framer;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Split a channel into its read and write transports and start its two
/// workers. Returns the dispatcher-side endpoints for the channel.
///
/// The worker threads are detached; the dispatcher coordinates with them
/// only through completion signaling, never by joining.
pub(crate) fn spawn_channel_workers(
    channel: Channel,
    events: SyncSender<BridgeEvent>,
) -> Result<ChannelEndpoint, BridgeError> {
    let role = channel.role();
    let writer = channel.try_clone_transport()?;
    let reader = channel.into_transport();

    let (outbound_tx, outbound_rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
    let (rearm_tx, rearm_rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);

    let reader_events = events.clone();
    thread::spawn(move || reader_loop(role, reader, reader_events, rearm_rx));
    thread::spawn(move || writer_loop(role, writer, outbound_rx, events));

    Ok(ChannelEndpoint::new(role, outbound_tx, rearm_tx))
}

/// Reader worker loop. One iteration is one frame cycle:
/// re-arm token -> bytes -> frame -> `FrameReady`.
///
/// Terminates when the re-arm channel or the event channel disconnects
/// (dispatcher shut down), when shutdown is requested, or when the
/// transport fails — in which case a `ReaderError` is published first and
/// the channel stays stalled.
pub(crate) fn reader_loop<R: Read>(
    role: ChannelRole,
    mut transport: R,
    events: SyncSender<BridgeEvent>,
    rearm: Receiver<()>,
) {
    let mut framer = Framer::new();
    loop {
        // Wait to be armed by the dispatcher. Disconnection means the
        // dispatcher released its endpoints and we are done.
        if rearm.recv().is_err() {
            trace!("{} reader: dispatcher gone, terminating", role);
            return;
        }

        let frame = loop {
            if shutdown_requested() {
                return;
            }
            match read_byte(&mut transport) {
                // No byte delivered yet; the accumulation state must not
                // advance. The transport's read timeout paces this loop.
                Ok(None) => continue,
                Ok(Some(byte)) => {
                    if let Some(frame) = framer.push_byte(byte) {
                        break frame;
                    }
                }
                Err(error) => {
                    // Report upward and terminate without signaling a
                    // frame. The dispatcher marks the channel stalled.
                    let _ = events.send(BridgeEvent::ReaderError { role, error });
                    return;
                }
            }
        };

        trace!("{} reader: frame complete ({} bytes)", role, frame.as_bytes().len());
        if events.send(BridgeEvent::FrameReady { role, frame }).is_err() {
            return;
        }
    }
}

/// Writer worker loop: drain outbound wire frames and report each write's
/// completion. Write results are fire-and-forget for the dispatcher; this
/// loop only has to make sure a completion event is published per write.
pub(crate) fn writer_loop<W: Write>(
    role: ChannelRole,
    mut transport: W,
    outbound: Receiver<Vec<u8>>,
    events: SyncSender<BridgeEvent>,
) {
    while let Ok(wire) = outbound.recv() {
        let result = write_all_flushed(&mut transport, &wire);
        if events.send(BridgeEvent::WriteComplete { role, result }).is_err() {
            return;
        }
    }
    trace!("{} writer: dispatcher gone, terminating", role);
}

// =============================================================================
// Private stuff
// =============================================================================

fn write_all_flushed<W: Write>(transport: &mut W, wire: &[u8]) -> io::Result<()> {
    transport.write_all(wire)?;
    transport.flush()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::FrameKind;
    use std::sync::mpsc;

    /// Scripted transport: yields its bytes one at a time, interleaved with
    /// "nothing available yet" timeouts, then fails with `BrokenPipe`.
    struct Scripted {
        bytes: Vec<u8>,
        pos: usize,
        starve: bool,
    }
    impl Scripted {
        fn new(bytes: &[u8]) -> Self {
            Scripted {
                bytes: bytes.to_vec(),
                pos: 0,
                starve: false,
            }
        }
    }
    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            // Every other call delivers nothing, exercising the
            // "zero bytes delivered => not advanced" contract.
            self.starve = !self.starve;
            if self.starve {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "starved"));
            }
            if self.pos >= self.bytes.len() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "script over"));
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    fn armed_once() -> Receiver<()> {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(()).unwrap();
        // Sender dropped here: the loop exits after its first cycle.
        rx
    }

    #[test]
    fn reader_publishes_one_frame_per_arm() {
        let (events_tx, events_rx) = mpsc::sync_channel(4);
        reader_loop(
            ChannelRole::Usb,
            Scripted::new(b"|ping|"),
            events_tx,
            armed_once(),
        );
        match events_rx.try_recv().unwrap() {
            BridgeEvent::FrameReady { role, frame } => {
                assert_eq!(role, ChannelRole::Usb);
                assert_eq!(frame.kind(), FrameKind::Forward);
                assert_eq!(frame.payload(), b"ping");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn reader_does_not_read_until_armed() {
        let (events_tx, events_rx) = mpsc::sync_channel(4);
        let (rearm_tx, rearm_rx) = mpsc::sync_channel::<()>(1);
        // Never armed: dropping the sender must terminate the loop without
        // the transport ever being touched.
        drop(rearm_tx);
        reader_loop(ChannelRole::Bt, Scripted::new(b"|x|"), events_tx, rearm_rx);
        assert!(events_rx.try_recv().is_err());
    }

    #[test]
    fn reader_reports_transport_failure() {
        let (events_tx, events_rx) = mpsc::sync_channel(4);
        // Script ends before the terminator: the next read breaks the pipe.
        reader_loop(
            ChannelRole::Bt,
            Scripted::new(b"|trunca"),
            events_tx,
            armed_once(),
        );
        match events_rx.try_recv().unwrap() {
            BridgeEvent::ReaderError { role, error } => {
                assert_eq!(role, ChannelRole::Bt);
                assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn writer_writes_and_reports_completion() {
        let (events_tx, events_rx) = mpsc::sync_channel(4);
        let (out_tx, out_rx) = mpsc::sync_channel(1);
        out_tx.send(b"|hello|".to_vec()).unwrap();
        drop(out_tx);

        let mut sink: Vec<u8> = Vec::new();
        writer_loop(ChannelRole::Bt, &mut sink, out_rx, events_tx);

        assert_eq!(sink, b"|hello|");
        match events_rx.try_recv().unwrap() {
            BridgeEvent::WriteComplete { role, result } => {
                assert_eq!(role, ChannelRole::Bt);
                assert!(result.is_ok());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
