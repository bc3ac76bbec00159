//! `combridge` bridge lifecycle state machine.
//!
//! **Example** - Importing the public interfaces through bridge:
//! ```ignore
//! use crate::{
//!     bridge::{self, BridgeManager},
//!     settings::Settings,
//! };
//! ```
//!
//! **Example** - Executing the state machine event loop:
//! ```ignore
//! let settings = SettingsBuilder::new()
//!     .usb_path("/dev/ttyUSB0")
//!     .bt_path("/dev/rfcomm0")
//!     .finalize();
//! let mut bridge = bridge::singleton(settings);
//! bridge.run();
//! ```

#[macro_use]
mod macros;

mod events;
mod state_machine;
mod states;

pub use state_machine::{singleton, BridgeManager};
