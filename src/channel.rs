//! The two serial endpoints of the bridge.
//!
//! Each [`Channel`] owns one open serial transport, configured exactly once
//! at open time with the settings in [`Settings`](crate::Settings). The
//! bridge has exactly two channels, identified by their [`ChannelRole`];
//! a frame received on one is relayed to the `opposite()` one.

use std::fmt;
use std::io::{self, Read};

use serialport::SerialPort;

use crate::debug_fmt_serialport;
use crate::error::BridgeError;
use crate::settings::Settings;
use crate::utils::{open_port, setup_port};

// =============================================================================
// Public Interface
// =============================================================================

/// Identity of a bridge endpoint. The names reflect the physical links of
/// the original deployment (a USB serial controller and a Bluetooth serial
/// adapter); the bridge treats both identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Usb,
    Bt,
}
impl ChannelRole {
    /// The other endpoint, i.e. where forward frames received on `self` go.
    pub fn opposite(self) -> ChannelRole {
        match self {
            ChannelRole::Usb => ChannelRole::Bt,
            ChannelRole::Bt => ChannelRole::Usb,
        }
    }
}
impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Usb => write!(f, "USB"),
            ChannelRole::Bt => write!(f, "BT"),
        }
    }
}

/// One serial endpoint: its role and the open, configured transport.
pub struct Channel {
    role: ChannelRole,
    port: Box<dyn SerialPort>,
}
impl Channel {
    /// Open and configure the serial device for `role`, using the path in
    /// `settings` matching the role. The device configuration is applied
    /// exactly once here; nothing reconfigures the transport afterwards.
    pub fn open(role: ChannelRole, settings: &Settings) -> Result<Channel, BridgeError> {
        let path = match role {
            ChannelRole::Usb => settings.usb_path.as_ref(),
            ChannelRole::Bt => settings.bt_path.as_ref(),
        };
        // The CLI requires both paths; reaching here without one is a
        // programming error, reported as a port open failure.
        let path = path.ok_or_else(|| BridgeError::Init {
            role,
            source: serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                "no device path configured for this channel",
            ),
        })?;

        let mut port =
            open_port(path, settings).map_err(|source| BridgeError::Init { role, source })?;
        setup_port(&mut port, settings)
            .map_err(|source| BridgeError::Config { role, source })?;
        Ok(Channel { role, port })
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Duplicate the transport handle for the write side of the channel.
    /// The original handle stays with the reader; the clone is handed to
    /// the writer worker so reads and outbound writes never contend.
    pub fn try_clone_transport(&self) -> Result<Box<dyn SerialPort>, BridgeError> {
        self.port.try_clone().map_err(|source| BridgeError::Clone {
            role: self.role,
            source,
        })
    }

    /// Consume the channel, yielding the read-side transport.
    pub fn into_transport(self) -> Box<dyn SerialPort> {
        self.port
    }
}
impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = &self.port;
        debug_fmt_serialport!(port, f).field(&self.role).finish()
    }
}

/// Pull at most one byte from the transport.
///
/// The port is configured with a short read timeout so this returns
/// promptly. A timed-out read, a would-block read or a zero-length read all
/// mean "no byte was delivered yet" and yield `Ok(None)`; the caller must
/// not advance its accumulation state in that case. Only real transport
/// failures surface as errors.
pub(crate) fn read_byte(transport: &mut dyn Read) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match transport.read(&mut byte) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(byte[0])),
        Err(ref e)
            if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
        {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn opposite_roles() {
    assert_eq!(ChannelRole::Usb.opposite(), ChannelRole::Bt);
    assert_eq!(ChannelRole::Bt.opposite(), ChannelRole::Usb);
}

#[test]
fn read_byte_maps_timeouts_to_none() {
    struct TimedOut;
    impl Read for TimedOut {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
        }
    }
    assert!(read_byte(&mut TimedOut).unwrap().is_none());
}

#[test]
fn read_byte_maps_zero_length_reads_to_none() {
    struct Empty;
    impl Read for Empty {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }
    assert!(read_byte(&mut Empty).unwrap().is_none());
}

#[test]
fn read_byte_delivers_one_byte_at_a_time() {
    let mut stream: &[u8] = b"ab";
    assert_eq!(read_byte(&mut stream).unwrap(), Some(b'a'));
    assert_eq!(read_byte(&mut stream).unwrap(), Some(b'b'));
    assert_eq!(read_byte(&mut stream).unwrap(), None);
}

#[test]
fn debug_format_reports_port_parameters() {
    use crate::settings::{DataBits, FlowControl, Parity, StopBits};

    struct FakePort;
    impl FakePort {
        fn name(&self) -> Option<String> {
            Some("/dev/ttyUSB0".into())
        }
        fn baud_rate(&self) -> u32 {
            9_600
        }
        fn data_bits(&self) -> DataBits {
            DataBits::Eight
        }
        fn stop_bits(&self) -> StopBits {
            StopBits::One
        }
        fn parity(&self) -> Parity {
            Parity::None
        }
        fn flow_control(&self) -> FlowControl {
            FlowControl::None
        }
    }

    struct Formatted(FakePort);
    impl fmt::Debug for Formatted {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let port = &self.0;
            debug_fmt_serialport!(port, f).finish()
        }
    }

    let rendered = format!("{:?}", Formatted(FakePort));
    assert!(rendered.contains("/dev/ttyUSB0"));
    assert!(rendered.contains("9600"));
}

#[test]
fn read_byte_propagates_real_errors() {
    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }
    assert!(read_byte(&mut Broken).is_err());
}
