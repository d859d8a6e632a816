//! CMUX/AT cellular modem driver core.
//!
//! Framing, DLCI routing, and the mode/command state machine for talking
//! to a cellular module over a multiplexed serial link. The physical
//! UART and the vendor AT dialect are out of scope; [`Transport`] and
//! [`ProtocolDriver`] are the seams a board/module integration fills in.

#![cfg_attr(not(test), no_std)]

mod buffer;
mod channel;
mod config;
mod controller;
mod dce;
mod error;
mod events;
mod framer;
mod intake;
mod result_code;
mod transport;

pub use channel::ChannelState;
pub use config::{Config, FlowControl as ConfigFlowControl, Parity, StopBits, timeout_ms};
pub use controller::{Driver, DriverMode};
pub use dce::{FlowControl, ProtocolDriver, WorkingMode};
pub use error::{Error, Result};
pub use events::{Event, EventKind, Handler};
pub use transport::{Transport, TransportEvent};
