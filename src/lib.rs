//! Combridge is a bidirectional bridge between two independent serial
//! channels, historically a USB serial controller on one side and a
//! Bluetooth serial adapter on the other. It relays delimited text frames
//! from each channel to the opposite one and records out-of-band frames
//! locally on the console.
//!
//! The wire format is deliberately minimal: a frame starts with `|`
//! (forward to the other channel) or `!` (log locally), carries a raw
//! payload, and ends with `|` or a line-feed respectively. No length
//! prefix, no checksum, no escaping.
//!
//! The heart of combridge is the per-channel framing and dispatch engine.
//! Each channel has a long-lived reader worker that assembles the incoming
//! byte stream into frames one byte at a time and hands each completed
//! frame to a central dispatcher over a bounded completion queue; the
//! dispatcher classifies the frame, routes it (relay, log, or drop) and
//! re-arms the reader for the next frame. Each channel carries at most one
//! frame in flight, which is the only flow control the bridge does.
//!
//! The bridge lifecycle is implemented as a state machine. State machines
//! are implemented in terms of **states** and **transitions** between them
//! with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * It is possible to have some shared data between **all** states.
//! * Transitions between states are triggered via typed **events** and
//!   follow defined semantics.
//! * Only explicitly defined transitions should be permitted and as many
//!   errors should be detected at **compile-time**.
//! * Transitioning from one state to another consumes the original state
//!   and renders it unusable. Any transition back to that state would
//!   create a new state.
//! * Data can be transferred from one state to the next by attaching it to
//!   the transition event. Such data is statically defined as part of the
//!   event type.
//!
//! The implementation of state transitions leverages `rust`'s `From` and
//! `Into` pattern. The `From` trait allows for a type to define how to
//! create itself from another type, hence providing us an intuitive and
//! simple mechanism for converting `events` into new `states`. Only
//! transitions for which the `From` trait is implemented are authorized and
//! any other transition would be detected at compile-time as an error.

mod bridge;
mod channel;
mod dispatcher;
mod error;
mod framer;
mod settings;
mod utils;
mod worker;

pub use bridge::{singleton, BridgeManager};
pub use dispatcher::request_shutdown;
pub use settings::{Settings, SettingsBuilder};
