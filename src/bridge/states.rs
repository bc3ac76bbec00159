//! States for the `combridge` bridge lifecycle state machine.
//!
//! This module is private and restricted to the [`bridge`](crate::bridge)
//! scope. The public interface of the state machine is provided by
//! [`bridge`](crate::bridge).
//!
//! ```ignore
//! use super::states::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an
//! overview of states, events and transitions.

use std::fmt;
use std::sync::mpsc;

use console::style;
use log::{error, info};

use super::events::*;

use crate::channel::{Channel, ChannelRole};
use crate::dispatcher::{Dispatcher, EVENT_QUEUE_DEPTH};
use crate::error::BridgeError;
use crate::settings::Settings;
use crate::worker::spawn_channel_workers;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into
/// it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state can do any work that needs to be done
    /// and when finished, requests a transition to a new state by returning
    /// the appropriate `event`. The `event` is then consumed to create the
    /// new `state` using the corresponding `From` trait implementation if
    /// available.
    fn run(&mut self, settings: &Settings) -> Event;
}

// Init State ==================================================================

/// The initial state of the bridge state machine.
///
/// Both serial channels are opened and configured here, exactly once. From
/// the `InitState`, the state machine can evolve via the following
/// transitions:
///
///  * **[`SwitchToRelayEvent`] => [`RelayState`]** after both channels are
///    open and configured,
///  * **[`DoneEvent`] => [`DoneState`]** when either channel fails to open
///    or to take its configuration. Initialization failures are fatal and
///    terminate `combridge` with exit code `1`.
#[derive(Debug)]
pub(crate) struct InitState {}
impl Runnable for InitState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!("=> Init");

        let usb = match Channel::open(ChannelRole::Usb, settings) {
            Ok(channel) => channel,
            Err(e) => return init_failed(settings, e),
        };
        let bt = match Channel::open(ChannelRole::Bt, settings) {
            Ok(channel) => channel,
            Err(e) => return init_failed(settings, e),
        };

        Event::SwitchToRelay(SwitchToRelayEvent {
            settings: settings.clone(),
            usb,
            bt,
        })
    }
}

// Relay State =================================================================

/// The steady state of the bridge: both channels are open and the frame
/// dispatch engine is running.
///
/// Each channel gets a reader and a writer worker on their own threads,
/// all publishing completions into one shared queue drained by the
/// [`Dispatcher`]. The dispatcher is never joined with the workers; they
/// terminate on their own when it releases its endpoints.
///
/// This state can transition as follows:
///
///  * **[`DoneEvent`] => [`DoneState`]** when the dispatch loop terminates,
///    either normally (shutdown requested) or because both channels
///    stalled.
pub(crate) struct RelayState {
    /// The USB-side channel. Consumed when the relay plumbing is built.
    pub usb: Option<Channel>,
    /// The BT-side channel. Consumed when the relay plumbing is built.
    pub bt: Option<Channel>,
}
impl Runnable for RelayState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!("=> Relay");

        if let (Some(usb), Some(bt)) = (self.usb.take(), self.bt.take()) {
            let with_errors = match relay(usb, bt) {
                Ok(with_errors) => with_errors,
                Err(e) => {
                    error!("{}", e);
                    true
                }
            };
            return Event::Done(DoneEvent {
                settings: settings.clone(),
                with_errors,
            });
        }

        // We should never reach here!
        unreachable!()
    }
}
impl fmt::Debug for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayState")
            .field("usb", &self.usb)
            .field("bt", &self.bt)
            .finish()
    }
}

// Done State ==================================================================

/// Reached when the bridge state machine completes its execution and is
/// about to terminate (normally or abnormally).
///
/// This state goes into a 2-phase execution. During the initial phase, it
/// runs like any other state to report the outcome, then triggers the
/// [`ExitEvent`] to cause the bridge state machine to terminate and exit.
///
/// Termination due to errors is indicated with the `with_error` field in
/// the state. This condition sets the exit code returned from the bridge
/// state machine event loop.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_error: bool,
    /// When `true` instructs the bridge state machine to exit its event
    /// loop.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, settings: &Settings) -> Event {
        info!(
            "=> Done with{}errors",
            if self.with_error { " " } else { " no " }
        );
        if self.with_error {
            println!(
                "{}",
                style("[CB] 💥 Unrecoverable error on the serial channels!").red()
            );
            println!("[CB] 🔌 Check both devices and restart combridge!");
        }

        Event::Exit(ExitEvent {
            settings: settings.clone(),
            with_error: self.with_error,
        })
    }
}

// =============================================================================
// Private stuff
// =============================================================================

fn init_failed(settings: &Settings, e: BridgeError) -> Event {
    error!("{}", e);
    println!("{}", style(format!("[CB] 💥 {}", e)).red());
    Event::Done(DoneEvent {
        settings: settings.clone(),
        with_errors: true,
    })
}

/// Build the relay plumbing and run the dispatch loop to completion.
/// Returns whether the loop terminated with errors.
fn relay(usb: Channel, bt: Channel) -> Result<bool, BridgeError> {
    let (events_tx, events_rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);

    let usb_endpoint = spawn_channel_workers(usb, events_tx.clone())?;
    let bt_endpoint = spawn_channel_workers(bt, events_tx)?;

    let mut dispatcher = Dispatcher::new(usb_endpoint, bt_endpoint, events_rx);
    Ok(dispatcher.run())
}
