//! CMUX frame constants, FCS, and the streaming parser/builder.
//!
//! Wire format: `SOF address control length [info...] fcs SOF`. The
//! parser pulls complete frames off the head of a [`RxBuffer`] and
//! reports how many bytes to drop, so it never reallocates or owns the
//! buffer itself.

use crate::buffer::RxBuffer;
use crate::error::{Error, Result};

pub const SOF: u8 = 0xF9;

pub const FT_SABM: u8 = 0x2F;
pub const FT_UA: u8 = 0x63;
pub const FT_DM: u8 = 0x0F;
pub const FT_DISC: u8 = 0x43;
pub const FT_UIH: u8 = 0xEF;

pub const PF: u8 = 0x10;
pub const EA: u8 = 0x01;
pub const CR: u8 = 0x02;

const FCS_POLYNOMIAL: u8 = 0xE0;
const FCS_INIT_VALUE: u8 = 0xFF;
pub const FCS_GOOD_VALUE: u8 = 0xCF;

pub const MAX_INFO_LEN: usize = 127;

/// Reflected CRC-8 (poly `0xE0`, init `0xFF`) over header bytes, matching
/// the 3GPP 27.010 FCS and `original_source/esp_modem.c::crc8`.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = FCS_INIT_VALUE;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ FCS_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum FrameType {
    Sabm,
    Ua,
    Dm,
    Disc,
    Uih,
    Unknown(u8),
}

impl FrameType {
    fn from_control_byte(control: u8) -> FrameType {
        match control & !PF {
            FT_SABM => FrameType::Sabm,
            FT_UA => FrameType::Ua,
            FT_DM => FrameType::Dm,
            FT_DISC => FrameType::Disc,
            FT_UIH => FrameType::Uih,
            other => FrameType::Unknown(other),
        }
    }

    fn to_control_byte(self) -> u8 {
        match self {
            FrameType::Sabm => FT_SABM,
            FrameType::Ua => FT_UA,
            FrameType::Dm => FT_DM,
            FrameType::Disc => FT_DISC,
            FrameType::Uih => FT_UIH,
            FrameType::Unknown(b) => b,
        }
    }
}

/// A parsed CMUX frame. `info` borrows from the caller-owned receive
/// buffer; its lifetime ends at the next `drain()` call.
#[derive(Debug)]
pub struct ParsedFrame<'a> {
    pub dlci: u8,
    pub ty: FrameType,
    pub poll_final: bool,
    pub info: &'a [u8],
    /// Total bytes this frame occupied in the source buffer, including
    /// both SOF markers; the caller drops exactly this many bytes.
    pub consumed: usize,
}

/// Outcome of one parse attempt against the head of the buffer.
pub enum DrainEvent<'a> {
    /// A well-formed frame was found; `frame.consumed` bytes should be
    /// dropped from the buffer afterward.
    Frame(ParsedFrame<'a>),
    /// Not enough bytes buffered yet for a complete frame.
    NeedMore,
    /// The stream was misaligned; exactly one byte must be dropped and
    /// parsing retried (§9 open question #2 / P4).
    Resync,
    /// A candidate frame was found but failed FCS or field validation;
    /// `drop_len` bytes (up to and including the trailing SOF, or just
    /// one byte if no trailing SOF was found) should be dropped.
    Invalid { drop_len: usize, error: Error },
}

/// Attempt to parse a single frame from the head of `data`.
///
/// This is a pure function over a byte slice so it can be unit tested
/// independently of the buffer's storage; [`Framer::drain`] drives it in
/// a loop and performs the corresponding `drop_front` calls.
pub fn parse_one(data: &[u8]) -> DrainEvent<'_> {
    if data.len() < 5 {
        return DrainEvent::NeedMore;
    }
    if data[0] != SOF {
        return DrainEvent::Resync;
    }

    let length_field = data[3];
    if length_field & EA == 0 {
        // Multi-byte length form: not supported by this core (§9 #4).
        return DrainEvent::Invalid {
            drop_len: 1,
            error: Error::ProtocolError,
        };
    }
    let info_len = (length_field >> 1) as usize;
    if info_len > MAX_INFO_LEN {
        return DrainEvent::Invalid {
            drop_len: 1,
            error: Error::ProtocolError,
        };
    }

    let full = info_len + 6;
    if data.len() < full {
        return DrainEvent::NeedMore;
    }
    if data[full - 1] != SOF {
        // Missing end marker: drop just the leading SOF and resync.
        return DrainEvent::Invalid {
            drop_len: 1,
            error: Error::ProtocolError,
        };
    }

    let header = &data[1..4];
    let fcs = data[4 + info_len];
    let mut check = [0u8; 4];
    check[..3].copy_from_slice(header);
    check[3] = fcs;
    if crc8(&check) != FCS_GOOD_VALUE {
        return DrainEvent::Invalid {
            drop_len: full,
            error: Error::ProtocolError,
        };
    }

    let address = data[1];
    let control = data[2];
    let dlci = address >> 2;
    let info = &data[4..4 + info_len];

    DrainEvent::Frame(ParsedFrame {
        dlci,
        ty: FrameType::from_control_byte(control),
        poll_final: control & PF != 0,
        info,
        consumed: full,
    })
}

/// Emit a frame into `out`, returning the number of bytes written.
/// `out` must be at least `info.len() + 6` bytes; `info.len()` must be
/// `<= MAX_INFO_LEN`.
pub fn build(dlci: u8, ty: FrameType, command: bool, poll_final: bool, info: &[u8], out: &mut [u8]) -> Result<usize> {
    if info.len() > MAX_INFO_LEN {
        return Err(Error::InvalidArgument);
    }
    let total = info.len() + 6;
    if out.len() < total {
        return Err(Error::InvalidArgument);
    }

    let address = (dlci << 2) | EA | if command { CR } else { 0 };
    let mut control = ty.to_control_byte();
    if poll_final {
        control |= PF;
    }
    let length = ((info.len() as u8) << 1) | EA;

    out[0] = SOF;
    out[1] = address;
    out[2] = control;
    out[3] = length;
    out[4..4 + info.len()].copy_from_slice(info);
    let fcs = 0xFFu8.wrapping_sub(crc8(&out[1..4]));
    out[4 + info.len()] = fcs;
    out[5 + info.len()] = SOF;

    Ok(total)
}

/// Drives [`parse_one`] against an [`RxBuffer`], dispatching each
/// well-formed frame to `on_frame` and shifting the buffer as it goes.
/// Invalid candidates and resyncs are reported to `on_error` but never
/// stop the drain; it always consumes everything it can before
/// returning.
pub struct Framer;

impl Framer {
    pub fn drain<const N: usize>(
        buf: &mut RxBuffer<N>,
        mut on_frame: impl FnMut(&ParsedFrame<'_>),
        mut on_error: impl FnMut(Error),
    ) {
        loop {
            let consumed = {
                match parse_one(buf.as_slice()) {
                    DrainEvent::Frame(frame) => {
                        on_frame(&frame);
                        frame.consumed
                    }
                    DrainEvent::NeedMore => break,
                    DrainEvent::Resync => {
                        on_error(Error::Resync);
                        1
                    }
                    DrainEvent::Invalid { drop_len, error } => {
                        on_error(error);
                        drop_len
                    }
                }
            };
            buf.drop_front(consumed);
            if buf.len() < 5 {
                break;
            }
        }
    }
}
