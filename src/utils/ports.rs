//! Serial port device manipulation.

use log::{debug, info};
use serialport::SerialPort;

use std::time::Duration;

use crate::Settings;

/// How long a single byte read may block before reporting "no data yet".
/// Short enough that the reader workers observe shutdown promptly, long
/// enough to not spin while the line is idle.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

//==============================================================================
// Crate-Public Interface
//==============================================================================

/// Open the serial device at `path`, retrying a few times with a fixed
/// delay to ride out a device that is still enumerating.
pub(crate) fn open_port(
    path: &str,
    settings: &Settings,
) -> Result<Box<dyn SerialPort>, serialport::Error> {
    use retry::{delay, retry_with_index};

    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(4),
        |index| -> Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to connect to {} ({})", path, index);
            // Open the port
            let builder = serialport::new(path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control);
            builder.open()
        },
    );
    match result {
        Ok(port) => Ok(port),
        Err(err) => match err {
            retry::Error::Operation {
                error,
                total_delay,
                tries,
            } => {
                info!(
                    "Failed to open {} after {:?} and {} tries: {}",
                    path, total_delay, tries, error,
                );
                Err(error)
            }
            retry::Error::Internal(_) => {
                info!("Internal retry error while opening {}", path);
                Err(serialport::Error::new(
                    serialport::ErrorKind::Unknown,
                    "internal error while retrying to open the port",
                ))
            }
        },
    }
}

/// Apply the line configuration from `settings` to an open port, exactly
/// once. The read timeout is set so that byte reads return promptly with
/// whatever is available instead of waiting for a minimum amount of data.
pub(crate) fn setup_port(
    port: &mut Box<dyn SerialPort>,
    settings: &Settings,
) -> Result<(), serialport::Error> {
    // Configure the port with the values in `settings`. TODO: This is
    // probably temporary until `serialport` configures the port after
    // `open` by itself.
    port.set_baud_rate(settings.baud_rate)?;
    port.set_data_bits(settings.data_bits)?;
    port.set_stop_bits(settings.stop_bits)?;
    port.set_parity(settings.parity)?;
    port.set_flow_control(settings.flow_control)?;
    port.set_timeout(READ_TIMEOUT)?;

    info!(
        "Connected to {} at {} baud",
        port.name().unwrap_or_else(|| "<unnamed>".into()),
        port.baud_rate()?
    );
    debug!("data_bits    : {:#?}", port.data_bits()?);
    debug!("stop_bits    : {:#?}", port.stop_bits()?);
    debug!("parity       : {:#?}", port.parity()?);
    debug!("flow control : {:#?}", port.flow_control()?);

    Ok(())
}
