//! Events for the `combridge` bridge lifecycle state machine.
//!
//! This module is private and restricted to the [`bridge`](crate::bridge)
//! scope. The public interface of the state machine is provided by
//! [`bridge`](crate::bridge).
//!
//! ```ignore
//! use super::events::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an
//! overview of states, events and transitions.

use std::fmt;

use crate::channel::Channel;
use crate::Settings;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// SwitchToRelayEvent ==========================================================

/// Event fired to trigger a transition to [`RelayState`].
///
/// Fired from the [`InitState`] after both channels have been successfully
/// opened and configured. Both channels are consumed and moved to the next
/// state.
pub(crate) struct SwitchToRelayEvent {
    pub settings: Settings,
    /// The USB-side channel, open and configured.
    pub usb: Channel,
    /// The BT-side channel, open and configured.
    pub bt: Channel,
}
impl fmt::Debug for SwitchToRelayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchToRelayEvent")
            .field("usb", &self.usb)
            .field("bt", &self.bt)
            .finish()
    }
}

// DoneEvent ===================================================================

/// Event fired when the bridge execution completes and is about to
/// terminate. It triggers a transition to the `Done` state.
///
/// This event can happen at any state due to normal termination (shutdown
/// requested), initialization failure or an unrecoverable error on both
/// channels.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    pub settings: Settings,
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_errors: bool,
}

// ExitEvent ===================================================================

/// The last event that can be triggered in the bridge state machine and
/// will result in the event loop terminating with an `exit status`, handing
/// back the control to the original caller that started the state machine
/// event loop.
///
/// The returned `status code` can be interpreted as whether the completion
/// was normal or abnormal.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub settings: Settings,
    pub with_error: bool,
}

// Events enum =================================================================

/// Events that can be triggered within the bridge lifecycle state machine
/// of `combridge`.
///
/// Each possible value holds an `event`, which in turn may hold additional
/// data for the state transition. Such data is passed by the origin state
/// for potential use by the target state.
#[derive(Debug)]
pub(crate) enum Event {
    SwitchToRelay(SwitchToRelayEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}
