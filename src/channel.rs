//! Channel (DLCI) state table and the inbound routing decision (§4.C).
//!
//! `route()` is a pure decision function: it looks at a parsed frame and
//! which one-shot/persistent handlers the controller currently has
//! installed, and says which one should run. The controller (which owns
//! the handlers) is responsible for actually invoking them, keeping
//! the routing table itself free of side effects and directly testable.

use crate::framer::{FrameType, ParsedFrame};

pub const DLCI_CONTROL: u8 = 0;
pub const DLCI_DATA: u8 = 1;
pub const DLCI_COMMAND: u8 = 2;

pub const MAX_INFO_FRAGMENT: usize = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum ChannelState {
    Closed,
    Opening,
    Open,
    Closing,
}

pub struct ChannelTable {
    states: [ChannelState; 3],
}

impl ChannelTable {
    pub const fn new() -> Self {
        ChannelTable {
            states: [ChannelState::Closed; 3],
        }
    }

    pub fn state(&self, dlci: u8) -> ChannelState {
        self.states.get(dlci as usize).copied().unwrap_or(ChannelState::Closed)
    }

    pub fn set_state(&mut self, dlci: u8, state: ChannelState) {
        if let Some(slot) = self.states.get_mut(dlci as usize) {
            *slot = state;
        }
    }

    pub fn all_open(&self) -> bool {
        self.states.iter().all(|s| *s == ChannelState::Open)
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Routing decision for one inbound frame. Borrows the frame's `info`.
#[derive(Debug)]
pub enum Route<'a> {
    /// A one-shot frame handler is installed; it completes a SABM/UA/DM
    /// handshake regardless of DLCI.
    FrameHandler,
    /// DLCI 1, a line handler is pending, and the info is long enough to
    /// be a CONNECT/result-code line.
    ConnectLine(&'a [u8]),
    /// DLCI 2, a line handler is pending, and the info (after skipping a
    /// leading CR/LF) is long enough to be a result-code line.
    CommandLine(&'a [u8]),
    /// DLCI 1, non-empty info, no pending line handler, a persistent
    /// data callback is installed.
    Data(&'a [u8]),
    /// DLCI 0: multiplexer control-channel frame (MSC, PN, CLD, ...).
    Control,
    /// Any other DLCI.
    Unknown,
    /// Nothing currently installed wants this frame.
    Drop,
}

fn skip_leading_crlf(info: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < info.len() && (info[i] == b'\r' || info[i] == b'\n') {
        i += 1;
    }
    &info[i..]
}

pub fn route<'a>(
    frame: &ParsedFrame<'a>,
    frame_handler_installed: bool,
    line_handler_installed: bool,
    data_callback_installed: bool,
) -> Route<'a> {
    if frame_handler_installed {
        return Route::FrameHandler;
    }

    if frame.dlci == DLCI_DATA
        && frame.ty == FrameType::Uih
        && line_handler_installed
        && frame.info.len() > 2
    {
        return Route::ConnectLine(frame.info);
    }

    if frame.dlci == DLCI_COMMAND && frame.ty == FrameType::Uih && line_handler_installed {
        return if skip_leading_crlf(frame.info).len() > 2 {
            Route::CommandLine(frame.info)
        } else {
            Route::Drop
        };
    }

    if frame.dlci == DLCI_DATA
        && frame.ty == FrameType::Uih
        && !frame.info.is_empty()
        && data_callback_installed
    {
        return Route::Data(frame.info);
    }

    if frame.dlci == DLCI_CONTROL {
        return Route::Control;
    }

    Route::Unknown
}

/// Splits `bytes` into chunks no larger than [`MAX_INFO_FRAGMENT`],
/// preserving order; each chunk becomes one UIH frame (P6).
pub fn fragment(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes.chunks(MAX_INFO_FRAGMENT)
}
