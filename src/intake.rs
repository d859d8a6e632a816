//! Byte Intake (§4.A): decides line-mode vs. frame-mode and feeds the
//! receive buffer accordingly. Driven by the inbound task in response to
//! transport events.

use crate::buffer::RxBuffer;
use crate::transport::Transport;
use embassy_time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum IntakeMode {
    /// CommandDirect, before CMUX bring-up: newline-terminated AT lines.
    Line,
    /// CmuxSetup / CmuxRunning / DataMode: raw framed bytes.
    Frame,
}

/// What the caller should do with what intake produced.
pub enum IntakeEvent {
    /// A complete, non-empty, not-pure-CR/LF line is ready in
    /// `line_buf[..len]` (NUL-terminated at `len`).
    Line { len: usize },
    /// Frame-mode bytes were appended to the shared receive buffer; the
    /// caller should run the framer's drain routine over it.
    FramesPending,
    /// The receive buffer would have overflowed; the tail that didn't fit
    /// was dropped. The stream resyncs at the next start marker once the
    /// framer drains what did fit.
    Overflow,
    /// Nothing actionable (empty/CR-LF-only line, or no bytes read).
    Nothing,
}

/// Line-mode intake: `on_line_pattern`. Reads `pos + 1` bytes into
/// `line_buf`, NUL-terminates, and reports whether it is worth handing to
/// the line handler.
pub async fn on_line_pattern<const N: usize>(
    transport: &mut impl Transport,
    line_buf: &mut [u8; N],
    pos: usize,
) -> IntakeEvent {
    let want = pos + 1;
    let clamp = want.min(N.saturating_sub(1));
    let n = transport
        .read(&mut line_buf[..clamp], Duration::from_millis(0))
        .await
        .unwrap_or(0);
    if n < line_buf.len() {
        line_buf[n] = 0;
    }
    if n == 0 {
        return IntakeEvent::Nothing;
    }
    let is_only_crlf = line_buf[..n].iter().all(|&b| b == b'\r' || b == b'\n');
    if is_only_crlf {
        IntakeEvent::Nothing
    } else {
        IntakeEvent::Line { len: n }
    }
}

/// Frame-mode intake: `on_bytes_available`. Queries the transport for
/// how many bytes are buffered *first*, then clamps to `line_buffer_size`
/// (§9 open question #1: the clamp is applied to the query result, not
/// the other way around), reads them into a scratch slice, and appends
/// them to the shared receive buffer.
pub async fn on_bytes_available<const N: usize>(
    transport: &mut impl Transport,
    buf: &mut RxBuffer<N>,
    scratch: &mut [u8],
    line_buffer_size: usize,
) -> IntakeEvent {
    let available = transport.bytes_available();
    let want = available.min(line_buffer_size).min(scratch.len());
    if want == 0 {
        return IntakeEvent::Nothing;
    }
    let n = transport
        .read(&mut scratch[..want], Duration::from_millis(0))
        .await
        .unwrap_or(0);
    if n == 0 {
        return IntakeEvent::Nothing;
    }
    let appended = buf.append(&scratch[..n]);
    if appended < n {
        return IntakeEvent::Overflow;
    }
    IntakeEvent::FramesPending
}
