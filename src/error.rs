//! Error taxonomy for the bridge.
//!
//! Initialization and configuration failures are fatal: they abort startup
//! with exit code `1`. Steady-state failures (a channel's readiness wait
//! going bad) are reported and stall the affected channel only; the bridge
//! keeps serving the other side.

use thiserror::Error;

use crate::channel::ChannelRole;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The channel's serial device could not be opened.
    #[error("failed to open channel {role}: {source}")]
    Init {
        role: ChannelRole,
        source: serialport::Error,
    },

    /// The serial device opened but the fixed configuration (baud rate,
    /// framing, timeouts) could not be applied.
    #[error("failed to configure channel {role}: {source}")]
    Config {
        role: ChannelRole,
        source: serialport::Error,
    },

    /// A channel's wait for incoming data failed; the channel is stalled
    /// until the bridge is restarted.
    #[error("wait for incoming data failed on channel {role}: {source}")]
    Wait {
        role: ChannelRole,
        source: std::io::Error,
    },

    /// The transport handle could not be duplicated for the write side.
    #[error("failed to clone the transport of channel {role}: {source}")]
    Clone {
        role: ChannelRole,
        source: serialport::Error,
    },
}
