//! `combridge` bridge lifecycle state machine.
//!
//! The bridge goes through a simple lifecycle: both serial channels are
//! opened and configured at startup, then the frame relay runs as the
//! steady state until a shutdown is requested or both channels stall.
//!
//! The following state diagram summarizes the different states and
//! transitions the bridge goes through:
//!
//! ```text
//!               START
//!                 |
//!                 v
//!             .-------.
//!             | Init  |
//!             '-------'
//!            /         \
//!      both open      open/config
//!           |          failure
//!           v             |
//!       .-------.         |
//!       | Relay |         |
//!       '-------'         |
//!           |             |
//!     shutdown or         |
//!     both stalled        |
//!           \             /
//!            v           v
//!             .---------.
//!             |  Done   |
//!             '---------'
//!                  |
//!                  v
//!                 END
//! ```

use std::sync::{Arc, Mutex, Once};

use super::events::*;
use super::states::*;
use crate::settings::Settings;

// =============================================================================
// Public Interface
// =============================================================================

// -----------------------------------------------------------------------------
// Bridge Manager Singleton
// -----------------------------------------------------------------------------

pub trait BridgeManager {
    fn run(&mut self) -> i8;
}

/// Encapsulate the state machine creation and event loop to provide a
/// concise and simple public interface to the module users.
///
/// Only one instance of this struct exists, using the `singleton` pattern,
/// and which can be accessed by calling the `singleton()` function.
#[derive(Clone)]
pub struct SingletonBridge {
    // Since this can be used in many threads, we need to protect concurrent
    // access
    inner: Arc<Mutex<BridgeStates>>,
}
impl BridgeManager for SingletonBridge {
    /// The bridge manager event loop runs until the `Done` state is reached
    /// and its `should_exit` flag is set. At such point, the event loop
    /// terminates and returns an exit code indicating no errors when equal
    /// to **`0`**; otherwise a termination with error.
    ///
    /// The returned status code could be used as an exit code from
    /// `combridge`.
    fn run(&mut self) -> i8 {
        loop {
            let mut data = self.inner.lock().unwrap();
            *data = data.step();
            if let BridgeStates::Done(sm) = &*data {
                if sm.state.should_exit {
                    return if sm.state.with_error { 1 } else { 0 };
                }
            }
        }
    }
}

/// Returns the single instance of the bridge manager.
///
/// In order to use the singleton instance, proper locking needs to be
/// observed. The example below demonstrates an example usage scenario:
///
/// ```ignore
///     let settings = SettingsBuilder::new().finalize();
///     let mut bridge = singleton(settings);
///     bridge.run();
/// ```
pub fn singleton(settings: Settings) -> SingletonBridge {
    // Initialize it to a null value
    static mut BRIDGE_SINGLETON: *const SingletonBridge = 0 as *const SingletonBridge;
    static BRIDGE_ONCE: Once = Once::new();

    unsafe {
        BRIDGE_ONCE.call_once(|| {
            // Make it
            let singleton = SingletonBridge {
                inner: Arc::new(Mutex::new(BridgeStates::Init(BridgeStateMachine::new(
                    settings,
                )))),
            };

            // Put it in the heap so it can outlive this call
            BRIDGE_SINGLETON = std::mem::transmute(Box::new(singleton));
        });

        // Now we give out a copy of the data that is safe to use concurrently.
        (*BRIDGE_SINGLETON).clone()
    }
}

// =============================================================================
// Private stuff
// =============================================================================

// -----------------------------------------------------------------------------
// The State Machine
// -----------------------------------------------------------------------------

/// The state machine implementing `combridge`'s bridge lifecycle.
///
/// Note that using a generic type that holds the current state serves two
/// purposes. It allows for also having shared data by all states that is
/// not really part of state data (e.g. state machine parameters,
/// statistics, etc...). Additionally, it's nicer when debugging to see the
/// state machine and the current state it is holding at any time.
#[derive(Debug)]
struct BridgeStateMachine<S: Runnable> {
    settings: Settings,
    state: S,
}
impl<S: Runnable> BridgeStateMachine<S> {
    fn run(&mut self) -> Event {
        self.state.run(&self.settings)
    }
}

/// The bridge state machine starts in the `InitState`.
impl BridgeStateMachine<InitState> {
    fn new(settings: Settings) -> Self {
        BridgeStateMachine {
            settings,
            state: InitState {},
        }
    }
}

/// Wraps the state machine and its various states into a simple enum, which
/// can also be used for pattern matching during state transitions.
enum BridgeStates {
    Init(BridgeStateMachine<InitState>),
    Relay(BridgeStateMachine<RelayState>),
    Done(BridgeStateMachine<DoneState>),
}
impl BridgeStates {
    fn step(&mut self) -> Self {
        match self {
            BridgeStates::Init(sm) => {
                let event = sm.run();
                match event {
                    Event::SwitchToRelay(ev) => BridgeStates::Relay(ev.into()),
                    Event::Done(ev) => BridgeStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            BridgeStates::Relay(sm) => {
                let event = sm.run();
                match event {
                    Event::Done(ev) => BridgeStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            BridgeStates::Done(sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(ev) => BridgeStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<SwitchToRelayEvent> for BridgeStateMachine<RelayState> {
    fn from(event: SwitchToRelayEvent) -> BridgeStateMachine<RelayState> {
        // ... Logic prior to transition
        BridgeStateMachine {
            // ... attr: val.attr
            settings: event.settings,
            state: RelayState {
                usb: Some(event.usb),
                bt: Some(event.bt),
            },
        }
    }
}

impl From<DoneEvent> for BridgeStateMachine<DoneState> {
    fn from(event: DoneEvent) -> BridgeStateMachine<DoneState> {
        // ... Logic prior to transition
        BridgeStateMachine {
            // ... attr: val.attr
            settings: event.settings,
            state: DoneState {
                with_error: event.with_errors,
                should_exit: false,
            },
        }
    }
}
impl From<ExitEvent> for BridgeStateMachine<DoneState> {
    fn from(event: ExitEvent) -> BridgeStateMachine<DoneState> {
        // ... Logic prior to transition
        BridgeStateMachine {
            // ... attr: val.attr
            settings: event.settings,
            state: DoneState {
                with_error: event.with_error,
                should_exit: true,
            },
        }
    }
}
