//! Helper functions to deal with serial ports.

mod ports;

pub(crate) use ports::{open_port, setup_port};
