//! Mode & Command Controller (§4.D): the state machine that ties the
//! framer, channel dispatch, and result-code classification together
//! into the upward API a caller actually uses.
//!
//! Two tasks touch a [`Driver`] concurrently: whichever task calls
//! `send_command`/`send_sabm`/`send_data`/`change_mode`, and the single
//! inbound task running [`Driver::run_inbound`]. Shared state lives
//! behind `embassy_sync::mutex::Mutex` guards; the receive buffer does
//! not, because only `run_inbound` ever touches it (it's a local
//! variable of that one task's loop, never a struct field).
//!
//! A command in flight is represented by one `Option` in [`SharedState`]
//! (which one-shot handler is pending) plus a `Signal` that the inbound
//! task fires once a terminal line or handshake frame arrives. `Busy` is
//! enforced by a separate, non-blocking `try_lock()` on `command_lock`:
//! at most one command is ever admitted at a time (P5).

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

use crate::buffer::RxBuffer;
use crate::channel::{self, ChannelState, ChannelTable, Route, DLCI_COMMAND, DLCI_CONTROL, DLCI_DATA};
use crate::config::Config;
use crate::dce::ProtocolDriver;
use crate::error::{Error, Result};
use crate::events::{Event, EventKind, EventRegistry, Handler};
use crate::framer::{self, FrameType, ParsedFrame};
use crate::intake::{self, IntakeEvent};
use crate::result_code::{classify, Classification};
use crate::transport::{Transport, TransportEvent};

/// Receive buffer capacity for the inbound task's local CMUX stream.
pub const RX_BUFFER_CAP: usize = 512;
/// Line buffer capacity for the inbound task's pre-CMUX AT line reads.
pub const LINE_BUFFER_CAP: usize = 256;

/// How long `run_inbound` holds the transport lock waiting on one event
/// poll before releasing it and trying again. Keeps the lock from being
/// held indefinitely while idle, so a command's write can always get in.
const EVENT_POLL_INTERVAL_MS: u64 = 50;

/// Mask off the C/R and EA bits (bottom two) of a multiplexer
/// control-channel command byte.
const CONTROL_CMD_MASK: u8 = 0xFC;
/// The CLD (multiplexer close-down) command byte, taken directly from
/// the worked `C3 01` example on DLCI 0 in spec.md §6; the general
/// MSC/PN command set is out of scope, only close-down needs honoring.
const CONTROL_CMD_CLD: u8 = 0xC3 & CONTROL_CMD_MASK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum DriverMode {
    CommandDirect,
    CmuxSetup,
    CmuxRunning,
    DataMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
enum Outcome {
    Ok,
    Fail,
}

/// Which one-shot line-level expectation is pending, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
enum LineExpectation {
    CommandReply,
}

/// Which one-shot frame-level expectation is pending, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
enum FrameExpectation {
    Handshake,
}

/// One frame's fields, copied out of the receive buffer so the buffer
/// can be shifted (and its borrow released) before dispatch runs.
struct CopiedFrame {
    dlci: u8,
    ty: FrameType,
    poll_final: bool,
    info: heapless::Vec<u8, { framer::MAX_INFO_LEN }>,
    consumed: usize,
}

struct SharedState {
    mode: DriverMode,
    channels: ChannelTable,
    line_handler: Option<LineExpectation>,
    frame_handler: Option<FrameExpectation>,
    data_callback: Option<fn(&[u8])>,
    events: EventRegistry,
}

/// The driver core: framing, channel dispatch, and the mode/command
/// state machine, generic over a caller-supplied [`Transport`] and
/// [`ProtocolDriver`]. Shared across tasks by reference (`&'static` or
/// an executor-provided equivalent), never moved once `run_inbound` has
/// started.
pub struct Driver<T: Transport, P: ProtocolDriver> {
    transport: Mutex<CriticalSectionRawMutex, T>,
    protocol: Mutex<CriticalSectionRawMutex, Option<P>>,
    config: Config,
    state: Mutex<CriticalSectionRawMutex, SharedState>,
    command_lock: Mutex<CriticalSectionRawMutex, ()>,
    completion: Signal<CriticalSectionRawMutex, Outcome>,
}

impl<T: Transport, P: ProtocolDriver> Driver<T, P> {
    pub fn new(transport: T, config: Config) -> Self {
        Driver {
            transport: Mutex::new(transport),
            protocol: Mutex::new(None),
            config,
            state: Mutex::new(SharedState {
                mode: DriverMode::CommandDirect,
                channels: ChannelTable::new(),
                line_handler: None,
                frame_handler: None,
                data_callback: None,
                events: EventRegistry::new(),
            }),
            command_lock: Mutex::new(()),
            completion: Signal::new(),
        }
    }

    /// Attaches the module-specific command dialect. Must be called
    /// before `start_cmux`/`start_ppp`.
    pub async fn bind_protocol(&self, protocol: P) {
        *self.protocol.lock().await = Some(protocol);
    }

    pub async fn mode(&self) -> DriverMode {
        self.state.lock().await.mode
    }

    pub async fn register_event_handler(&self, kind: EventKind, handler: Handler) -> Result<()> {
        let mut st = self.state.lock().await;
        if st.events.register(kind, handler) {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }

    pub async fn remove_event_handler(&self, handler: Handler) {
        self.state.lock().await.events.remove(handler);
    }

    pub async fn set_rx_cb(&self, cb: fn(&[u8])) {
        self.state.lock().await.data_callback = Some(cb);
    }

    // ---- outbound operations -------------------------------------------

    /// Sends one AT command line (CommandDirect) or wraps it in a UIH
    /// frame on DLCI 2 (CmuxRunning), and waits for a terminal result
    /// code. Only one command may be outstanding at a time (P5).
    pub async fn send_command(&self, text: &str, timeout: Duration) -> Result<()> {
        let _guard = self.command_lock.try_lock().map_err(|_| Error::Busy)?;

        {
            let mut st = self.state.lock().await;
            st.line_handler = Some(LineExpectation::CommandReply);
        }
        self.completion.reset();

        let mode = self.mode().await;
        let write_result = match mode {
            DriverMode::CommandDirect => self.write_bytes(text.as_bytes()).await,
            DriverMode::CmuxRunning => self.write_uih(DLCI_COMMAND, text.as_bytes()).await,
            _ => Err(Error::StateError),
        };
        if let Err(e) = write_result {
            self.state.lock().await.line_handler = None;
            return Err(e);
        }

        self.await_completion(timeout, |st| st.line_handler = None).await
    }

    /// Sends an SABM on `dlci` and waits for the UA/DM handshake,
    /// updating the channel table accordingly.
    pub async fn send_sabm(&self, dlci: u8, timeout: Duration) -> Result<()> {
        let _guard = self.command_lock.try_lock().map_err(|_| Error::Busy)?;

        {
            let mut st = self.state.lock().await;
            st.frame_handler = Some(FrameExpectation::Handshake);
            st.channels.set_state(dlci, ChannelState::Opening);
        }
        self.completion.reset();

        let mut out = [0u8; 6];
        let n = framer::build(dlci, FrameType::Sabm, true, true, &[], &mut out)
            .map_err(|_| Error::InvalidArgument)?;
        if let Err(e) = self.write_bytes(&out[..n]).await {
            let mut st = self.state.lock().await;
            st.frame_handler = None;
            st.channels.set_state(dlci, ChannelState::Closed);
            return Err(e);
        }

        let result = self.await_completion(timeout, |st| st.frame_handler = None).await;
        let mut st = self.state.lock().await;
        st.channels.set_state(dlci, if result.is_ok() { ChannelState::Open } else { ChannelState::Closed });
        result
    }

    /// Fragments `bytes` into UIH frames on DLCI 1 (P6) and writes them
    /// contiguously; only valid once `DataMode` is entered.
    pub async fn send_data(&self, bytes: &[u8]) -> Result<usize> {
        if self.mode().await != DriverMode::DataMode {
            return Err(Error::StateError);
        }
        let _guard = self.command_lock.try_lock().map_err(|_| Error::Busy)?;

        let mut written = 0;
        for chunk in channel::fragment(bytes) {
            if self.write_uih(DLCI_DATA, chunk).await.is_err() {
                return Ok(written);
            }
            written += chunk.len();
        }
        Ok(written)
    }

    /// Brings the multiplexer up: runs the vendor `AT+CMUX` exchange via
    /// the bound protocol driver, switches the transport to raw mode,
    /// then opens DLCI 0, 1, and 2 in order with SABM/UA handshakes.
    pub async fn start_cmux(&self) -> Result<()> {
        if self.mode().await != DriverMode::CommandDirect {
            return Err(Error::StateError);
        }
        self.state.lock().await.mode = DriverMode::CmuxSetup;

        {
            let mut proto = self.protocol.lock().await;
            let proto = proto.as_mut().ok_or(Error::NotBound)?;
            if let Err(e) = proto.setup_cmux().await {
                self.state.lock().await.mode = DriverMode::CommandDirect;
                return Err(e);
            }
        }
        self.transport.lock().await.enable_raw_mode();

        for &dlci in &[DLCI_CONTROL, DLCI_DATA, DLCI_COMMAND] {
            if let Err(e) = self.send_sabm(dlci, Duration::from_millis(crate::config::timeout_ms::MODE_CHANGE)).await {
                self.state.lock().await.mode = DriverMode::CommandDirect;
                return Err(e);
            }
        }

        self.state.lock().await.mode = DriverMode::CmuxRunning;
        Ok(())
    }

    /// Dials on DLCI 1, awaits the CONNECT line, and on success promotes
    /// DLCI 1 to a raw byte pipe for PPP.
    pub async fn start_ppp(&self, dial_command: &str, timeout: Duration) -> Result<()> {
        if self.mode().await != DriverMode::CmuxRunning {
            return Err(Error::StateError);
        }
        let _guard = self.command_lock.try_lock().map_err(|_| Error::Busy)?;

        {
            let mut st = self.state.lock().await;
            st.line_handler = Some(LineExpectation::CommandReply);
        }
        self.completion.reset();
        if let Err(e) = self.write_uih(DLCI_DATA, dial_command.as_bytes()).await {
            self.state.lock().await.line_handler = None;
            return Err(e);
        }

        self.await_completion(timeout, |st| st.line_handler = None).await?;
        self.state.lock().await.mode = DriverMode::DataMode;
        Ok(())
    }

    /// Hangs up via the protocol driver and demotes DLCI 1 back to a
    /// command channel.
    pub async fn stop_ppp(&self) -> Result<()> {
        if self.mode().await != DriverMode::DataMode {
            return Err(Error::StateError);
        }
        {
            let mut proto = self.protocol.lock().await;
            let proto = proto.as_mut().ok_or(Error::NotBound)?;
            proto.hang_up().await?;
        }
        self.state.lock().await.mode = DriverMode::CmuxRunning;
        Ok(())
    }

    /// Convenience wrapper naming the target mode directly (§4.D). Dialing
    /// into `DataMode` needs a dial string, so that transition goes
    /// through `start_ppp` directly instead of through this wrapper.
    pub async fn change_mode(&self, target: DriverMode) -> Result<()> {
        match target {
            DriverMode::CmuxSetup | DriverMode::CmuxRunning if self.mode().await == DriverMode::CommandDirect => {
                self.start_cmux().await
            }
            DriverMode::CmuxRunning if self.mode().await == DriverMode::DataMode => self.stop_ppp().await,
            _ => Err(Error::StateError),
        }
    }

    /// Powers the module down and releases every DLCI, in reverse bring-up
    /// order. Tolerant of a protocol driver that is already unresponsive:
    /// `power_down`/`deinit` errors are logged to the event channel but do
    /// not stop teardown.
    pub async fn deinit(&self) -> Result<()> {
        {
            let mut proto = self.protocol.lock().await;
            if let Some(p) = proto.as_mut() {
                if p.power_down().await.is_err() {
                    self.dispatch_event(Event::ProtocolError { detail: "power_down failed during deinit" }).await;
                }
                if p.deinit().await.is_err() {
                    self.dispatch_event(Event::ProtocolError { detail: "deinit failed" }).await;
                }
            }
        }
        let mut st = self.state.lock().await;
        for &dlci in &[DLCI_COMMAND, DLCI_DATA, DLCI_CONTROL] {
            st.channels.set_state(dlci, ChannelState::Closed);
        }
        st.mode = DriverMode::CommandDirect;
        Ok(())
    }

    // ---- inbound task ----------------------------------------------------

    /// Runs forever, driving transport events through intake, the
    /// framer, and channel dispatch. Owns the receive buffer and line
    /// buffer as locals; no other task ever touches them.
    pub async fn run_inbound(&self) -> ! {
        let mut rx: RxBuffer<RX_BUFFER_CAP> = RxBuffer::new();
        let mut line_buf = [0u8; LINE_BUFFER_CAP];
        let mut scratch = [0u8; RX_BUFFER_CAP];

        loop {
            let event = self.next_transport_event().await;
            match event {
                TransportEvent::DataAvailable => {
                    if self.mode().await == DriverMode::CommandDirect {
                        // CommandDirect expects a PatternAt event to mark
                        // a complete line; a bare DataAvailable here isn't
                        // actionable.
                        continue;
                    }
                    let ev = {
                        let mut t = self.transport.lock().await;
                        intake::on_bytes_available(&mut *t, &mut rx, &mut scratch, self.config.line_buffer_size).await
                    };
                    match ev {
                        IntakeEvent::FramesPending => self.drain_frames(&mut rx).await,
                        IntakeEvent::Overflow => {
                            self.drain_frames(&mut rx).await;
                            self.dispatch_event(Event::UnknownInput { line: "<rx overflow>" }).await;
                        }
                        IntakeEvent::Line { .. } | IntakeEvent::Nothing => {}
                    }
                }
                TransportEvent::PatternAt(pos) => {
                    if self.mode().await != DriverMode::CommandDirect {
                        continue;
                    }
                    let ev = {
                        let mut t = self.transport.lock().await;
                        intake::on_line_pattern(&mut *t, &mut line_buf, pos).await
                    };
                    if let IntakeEvent::Line { len } = ev {
                        self.process_line(&line_buf[..len]).await;
                    }
                }
                TransportEvent::FifoOverflow | TransportEvent::BufferFull | TransportEvent::ParityError | TransportEvent::FrameError => {
                    {
                        let mut t = self.transport.lock().await;
                        t.flush().await;
                    }
                    rx.clear();
                    self.dispatch_event(Event::ProtocolError { detail: "transport signaled overflow/line error" }).await;
                }
                TransportEvent::Break | TransportEvent::Unknown(_) => {}
            }
        }
    }

    async fn drain_frames(&self, buf: &mut RxBuffer<RX_BUFFER_CAP>) {
        loop {
            if buf.len() < 5 {
                break;
            }

            let copied: Option<CopiedFrame> = match framer::parse_one(buf.as_slice()) {
                framer::DrainEvent::Frame(f) => {
                    let mut info = heapless::Vec::new();
                    let _ = info.extend_from_slice(f.info);
                    Some(CopiedFrame { dlci: f.dlci, ty: f.ty, poll_final: f.poll_final, info, consumed: f.consumed })
                }
                framer::DrainEvent::NeedMore => None,
                framer::DrainEvent::Resync => {
                    buf.drop_front(1);
                    self.dispatch_event(Event::Resync).await;
                    continue;
                }
                framer::DrainEvent::Invalid { drop_len, .. } => {
                    buf.drop_front(drop_len);
                    self.dispatch_event(Event::ProtocolError { detail: "frame failed validation" }).await;
                    continue;
                }
            };

            let Some(c) = copied else { break };
            buf.drop_front(c.consumed);
            self.dispatch_frame(c.dlci, c.ty, c.poll_final, &c.info).await;
        }
    }

    async fn dispatch_frame(&self, dlci: u8, ty: FrameType, poll_final: bool, info: &[u8]) {
        let (frame_handler_installed, line_handler_installed, data_cb) = {
            let st = self.state.lock().await;
            (st.frame_handler.is_some(), st.line_handler.is_some(), st.data_callback)
        };
        let synthetic = ParsedFrame { dlci, ty, poll_final, info, consumed: 0 };

        match channel::route(&synthetic, frame_handler_installed, line_handler_installed, data_cb.is_some()) {
            Route::FrameHandler => self.complete_frame_handler(ty).await,
            Route::ConnectLine(line) | Route::CommandLine(line) => self.process_line(line).await,
            Route::Data(bytes) => {
                if let Some(cb) = data_cb {
                    cb(bytes);
                }
            }
            Route::Control => self.handle_control_frame(ty, info).await,
            Route::Unknown => {
                if dlci == DLCI_COMMAND && ty == FrameType::Uih {
                    self.emit_unknown_input(info).await;
                }
            }
            Route::Drop => {}
        }
    }

    async fn complete_frame_handler(&self, ty: FrameType) {
        let had_handler = {
            let mut st = self.state.lock().await;
            st.frame_handler.take().is_some()
        };
        if !had_handler {
            return;
        }
        match ty {
            FrameType::Ua => self.completion.signal(Outcome::Ok),
            FrameType::Dm => self.completion.signal(Outcome::Fail),
            _ => {}
        }
    }

    async fn handle_control_frame(&self, ty: FrameType, info: &[u8]) {
        if ty != FrameType::Uih {
            return;
        }
        if info.first().map(|&b| b & CONTROL_CMD_MASK) == Some(CONTROL_CMD_CLD) {
            self.dispatch_event(Event::CmuxClosed).await;
            self.state.lock().await.channels.set_state(DLCI_CONTROL, ChannelState::Closed);
        }
    }

    /// Classifies one result-code line (from either a raw CommandDirect
    /// read or a DLCI 1/2 frame's info) and acts on it: completes a
    /// pending command, raises `Ring`, or (if nothing is waiting for it)
    /// raises `UnknownInput`.
    async fn process_line(&self, raw: &[u8]) {
        let line = core::str::from_utf8(raw).unwrap_or("");
        match classify(line) {
            Classification::Ring => self.dispatch_event(Event::Ring).await,
            Classification::Success => {
                if self.take_line_handler().await {
                    self.completion.signal(Outcome::Ok);
                } else {
                    self.emit_unknown_input(raw).await;
                }
            }
            Classification::Failure => {
                if self.take_line_handler().await {
                    self.completion.signal(Outcome::Fail);
                } else {
                    self.emit_unknown_input(raw).await;
                }
            }
            Classification::Informational => {
                let pending = self.state.lock().await.line_handler.is_some();
                if !pending {
                    self.emit_unknown_input(raw).await;
                }
            }
        }
    }

    async fn take_line_handler(&self) -> bool {
        self.state.lock().await.line_handler.take().is_some()
    }

    async fn emit_unknown_input(&self, raw: &[u8]) {
        let line = core::str::from_utf8(raw).unwrap_or("?");
        self.dispatch_event(Event::UnknownInput { line }).await;
    }

    async fn dispatch_event(&self, event: Event<'_>) {
        let handlers = {
            let st = self.state.lock().await;
            st.events.handlers_for(event.kind())
        };
        for h in handlers {
            h(&event);
        }
    }

    /// Races the completion slot against `timeout`; on timeout, clears
    /// whichever one-shot handler `clear` names so a stale expectation
    /// can't complete a later command.
    async fn await_completion(&self, timeout: Duration, clear: impl FnOnce(&mut SharedState)) -> Result<()> {
        match select(self.completion.wait(), Timer::after(timeout)).await {
            Either::First(Outcome::Ok) => Ok(()),
            Either::First(Outcome::Fail) => Err(Error::ProtocolError),
            Either::Second(_) => {
                clear(&mut self.state.lock().await);
                Err(Error::Timeout)
            }
        }
    }

    /// Waits for the next transport event without holding `transport`'s
    /// mutex for the whole wait: each poll takes the lock only for
    /// `EVENT_POLL_INTERVAL`, so a writer queued behind it always gets a
    /// turn between polls instead of starving behind an idle inbound task.
    async fn next_transport_event(&self) -> TransportEvent {
        loop {
            let mut t = self.transport.lock().await;
            match select(t.next_event(), Timer::after(Duration::from_millis(EVENT_POLL_INTERVAL_MS))).await {
                Either::First(event) => return event,
                Either::Second(()) => continue,
            }
        }
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let n = self.transport.lock().await.write(bytes).await?;
        if n != bytes.len() {
            return Err(Error::TransportError);
        }
        Ok(())
    }

    async fn write_uih(&self, dlci: u8, info: &[u8]) -> Result<()> {
        if info.len() > framer::MAX_INFO_LEN {
            return Err(Error::InvalidArgument);
        }
        let mut out = [0u8; framer::MAX_INFO_LEN + 6];
        let n = framer::build(dlci, FrameType::Uih, true, false, info, &mut out)?;
        self.write_bytes(&out[..n]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    /// An in-memory transport double: an inbound queue the test feeds,
    /// and an outbound log the test asserts against. Assumes each test
    /// pushes at most one line/byte run into an otherwise-empty queue, so
    /// `pending_line_end` can be the line's own length minus one.
    struct FakeTransport {
        inbound: heapless::Deque<u8, 1024>,
        outbound: heapless::Vec<u8, 1024>,
        line_mode: bool,
        pending_line_end: Option<usize>,
        /// Number of `write()` calls left to succeed before every
        /// subsequent one fails with `TransportError`. `None` never fails.
        fail_writes_after: Option<usize>,
    }

    impl FakeTransport {
        fn new() -> Self {
            FakeTransport {
                inbound: heapless::Deque::new(),
                outbound: heapless::Vec::new(),
                line_mode: true,
                pending_line_end: None,
                fail_writes_after: None,
            }
        }

        fn push_line(&mut self, line: &[u8]) {
            for &b in line {
                self.inbound.push_back(b).unwrap();
            }
            self.pending_line_end = Some(line.len() - 1);
        }

        fn fail_writes_after(&mut self, count: usize) {
            self.fail_writes_after = Some(count);
        }
    }

    impl Transport for FakeTransport {
        async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
            if let Some(remaining) = self.fail_writes_after.as_mut() {
                if *remaining == 0 {
                    return Err(Error::TransportError);
                }
                *remaining -= 1;
            }
            let _ = self.outbound.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        async fn read(&mut self, into: &mut [u8], _timeout: Duration) -> Result<usize> {
            let mut n = 0;
            while n < into.len() {
                match self.inbound.pop_front() {
                    Some(b) => {
                        into[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }

        fn bytes_available(&self) -> usize {
            self.inbound.len()
        }

        fn enable_line_mode(&mut self) {
            self.line_mode = true;
        }

        fn enable_raw_mode(&mut self) {
            self.line_mode = false;
        }

        async fn flush(&mut self) {
            self.inbound.clear();
        }

        async fn next_event(&mut self) -> TransportEvent {
            if self.line_mode {
                if let Some(pos) = self.pending_line_end.take() {
                    return TransportEvent::PatternAt(pos);
                }
            } else if !self.inbound.is_empty() {
                return TransportEvent::DataAvailable;
            }
            core::future::pending::<TransportEvent>().await
        }
    }

    struct NullProtocol;

    impl ProtocolDriver for NullProtocol {
        async fn sync(&mut self) -> Result<()> {
            Ok(())
        }
        async fn echo_mode(&mut self, _on: bool) -> Result<()> {
            Ok(())
        }
        async fn set_flow_control(&mut self, _kind: crate::dce::FlowControl) -> Result<()> {
            Ok(())
        }
        async fn get_signal_quality(&mut self) -> Result<(u32, u32)> {
            Ok((0, 0))
        }
        async fn define_pdp_context(&mut self, _cid: u32, _ty: &str, _apn: &str) -> Result<()> {
            Ok(())
        }
        async fn set_working_mode(&mut self, _mode: crate::dce::WorkingMode) -> Result<()> {
            Ok(())
        }
        async fn hang_up(&mut self) -> Result<()> {
            Ok(())
        }
        async fn power_down(&mut self) -> Result<()> {
            Ok(())
        }
        async fn deinit(&mut self) -> Result<()> {
            Ok(())
        }
        async fn setup_cmux(&mut self) -> Result<()> {
            Ok(())
        }
    }

    // Scenario 1: command/reply round trip in CommandDirect.
    #[test]
    fn send_command_completes_on_ok_line() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            {
                let mut t = driver.transport.lock().await;
                t.push_line(b"\r\nOK\r\n");
            }

            let inbound = async {
                // Drive exactly one PatternAt round through the inbound
                // machinery without looping forever.
                let ev = {
                    let mut t = driver.transport.lock().await;
                    t.next_event().await
                };
                if let TransportEvent::PatternAt(pos) = ev {
                    let mut line_buf = [0u8; LINE_BUFFER_CAP];
                    let line_ev = {
                        let mut t = driver.transport.lock().await;
                        intake::on_line_pattern(&mut *t, &mut line_buf, pos).await
                    };
                    if let IntakeEvent::Line { len } = line_ev {
                        driver.process_line(&line_buf[..len]).await;
                    }
                }
            };

            let command = driver.send_command("AT\r", Duration::from_millis(1000));
            let (result, _) = embassy_futures::join::join(command, inbound).await;
            assert!(result.is_ok());
        });
    }

    // Scenario: terminal failure code completes the command as an error.
    #[test]
    fn send_command_completes_on_error_line() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            {
                let mut t = driver.transport.lock().await;
                t.push_line(b"\r\nERROR\r\n");
            }

            let inbound = async {
                let ev = {
                    let mut t = driver.transport.lock().await;
                    t.next_event().await
                };
                if let TransportEvent::PatternAt(pos) = ev {
                    let mut line_buf = [0u8; LINE_BUFFER_CAP];
                    let line_ev = {
                        let mut t = driver.transport.lock().await;
                        intake::on_line_pattern(&mut *t, &mut line_buf, pos).await
                    };
                    if let IntakeEvent::Line { len } = line_ev {
                        driver.process_line(&line_buf[..len]).await;
                    }
                }
            };

            let command = driver.send_command("AT+XYZ\r", Duration::from_millis(1000));
            let (result, _) = embassy_futures::join::join(command, inbound).await;
            assert_eq!(result, Err(Error::ProtocolError));
        });
    }

    // P5: a second command while one is outstanding is rejected as Busy
    // without perturbing the first one's pending slot.
    #[test]
    fn overlapping_commands_return_busy() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            let _guard = driver.command_lock.try_lock().unwrap();
            let second = driver.send_command("AT\r", Duration::from_millis(10)).await;
            assert_eq!(second, Err(Error::Busy));
        });
    }

    // No reply within the deadline surfaces as Timeout and clears the
    // pending handler so a later command isn't completed by a stale line.
    #[test]
    fn send_command_times_out_when_nothing_arrives() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            let result = driver.send_command("AT\r", Duration::from_millis(1)).await;
            assert_eq!(result, Err(Error::Timeout));
            assert!(driver.state.lock().await.line_handler.is_none());
        });
    }

    // Regression: the inbound task's idle wait must not hold the
    // transport lock indefinitely, or a concurrent command write starves
    // behind it. `FakeTransport::next_event` blocks forever when nothing
    // is queued, so if `run_inbound` held the lock across that wait,
    // `send_command` could never acquire it to write and would hang
    // instead of timing out.
    #[test]
    fn command_write_is_not_starved_by_an_idle_inbound_task() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            let inbound = driver.run_inbound();
            let command = driver.send_command("AT\r", Duration::from_millis(50));
            match select(inbound, command).await {
                Either::Second(result) => assert_eq!(result, Err(Error::Timeout)),
                Either::First(_) => unreachable!("run_inbound never returns"),
            }
        });
    }

    // Scenario 4 (frame mode): an OK completes the pending command; a
    // second, unsolicited informational line with no handler pending
    // raises UnknownInput instead of silently dropping.
    #[test]
    fn unsolicited_line_after_completion_raises_unknown_input() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            driver.state.lock().await.line_handler = Some(LineExpectation::CommandReply);
            driver.process_line(b"\r\nOK\r\n").await;
            assert!(driver.state.lock().await.line_handler.is_none());

            static HIT: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);
            fn mark(_e: &Event<'_>) {
                HIT.store(true, core::sync::atomic::Ordering::SeqCst);
            }
            driver.register_event_handler(EventKind::UnknownInput, mark).await.unwrap();
            driver.process_line(b"+CSQ: 19,0").await;
            assert!(HIT.load(core::sync::atomic::Ordering::SeqCst));
        });
    }

    // SABM/UA handshake opens a DLCI.
    #[test]
    fn send_sabm_ua_opens_channel() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            let opened = driver.send_sabm(DLCI_CONTROL, Duration::from_millis(50));
            let signal_ua = async { driver.complete_frame_handler(FrameType::Ua).await };
            let (result, _) = embassy_futures::join::join(opened, signal_ua).await;
            assert!(result.is_ok());
            assert_eq!(driver.state.lock().await.channels.state(DLCI_CONTROL), ChannelState::Open);
        });
    }

    // SABM/DM closes the DLCI instead of opening it.
    #[test]
    fn send_sabm_dm_closes_channel() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            let opened = driver.send_sabm(DLCI_DATA, Duration::from_millis(50));
            let signal_dm = async { driver.complete_frame_handler(FrameType::Dm).await };
            let (result, _) = embassy_futures::join::join(opened, signal_dm).await;
            assert_eq!(result, Err(Error::ProtocolError));
            assert_eq!(driver.state.lock().await.channels.state(DLCI_DATA), ChannelState::Closed);
        });
    }

    #[test]
    fn fragmented_send_data_requires_data_mode() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            let result = driver.send_data(&[1, 2, 3]).await;
            assert_eq!(result, Err(Error::StateError));
        });
    }

    // §7: a transport failure partway through a fragmented send_data must
    // not lose the count of whole chunks already written.
    #[test]
    fn send_data_partial_failure_returns_bytes_actually_written() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            driver.state.lock().await.mode = DriverMode::DataMode;
            {
                let mut t = driver.transport.lock().await;
                // Two chunks' worth of frames succeed, the third fails.
                t.fail_writes_after(2);
            }

            let payload = [0xAAu8; 300]; // fragments into 127 + 127 + 46
            let result = driver.send_data(&payload).await;
            assert_eq!(result, Ok(254));
        });
    }

    #[test]
    fn cld_control_frame_closes_dlci0_and_raises_event() {
        embassy_futures::block_on(async {
            let driver = Driver::new(FakeTransport::new(), Config::default());
            driver.state.lock().await.channels.set_state(DLCI_CONTROL, ChannelState::Open);

            static HIT_ATOMIC: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);
            fn mark(_e: &Event<'_>) {
                HIT_ATOMIC.store(true, core::sync::atomic::Ordering::SeqCst);
            }
            driver.register_event_handler(EventKind::CmuxClosed, mark).await.unwrap();

            driver.handle_control_frame(FrameType::Uih, &[0xC3, 0x01]).await;
            assert!(HIT_ATOMIC.load(core::sync::atomic::Ordering::SeqCst));
            assert_eq!(driver.state.lock().await.channels.state(DLCI_CONTROL), ChannelState::Closed);
        });
    }
}
