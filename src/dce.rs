//! Protocol driver contract (§6): the vendor-specific AT dialect.
//!
//! Specific command text (dial strings, PDP context syntax, signal
//! quality parsing) is out of scope (§1); this trait is the seam a
//! concrete module driver implements; the core only calls it.

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum WorkingMode {
    CommandMode,
    CmuxMode,
    PppMode,
}

pub trait ProtocolDriver {
    async fn sync(&mut self) -> Result<()>;
    async fn echo_mode(&mut self, on: bool) -> Result<()>;
    async fn set_flow_control(&mut self, kind: FlowControl) -> Result<()>;
    /// Returns `(rssi, ber)`.
    async fn get_signal_quality(&mut self) -> Result<(u32, u32)>;
    async fn define_pdp_context(&mut self, cid: u32, ty: &str, apn: &str) -> Result<()>;
    async fn set_working_mode(&mut self, mode: WorkingMode) -> Result<()>;
    async fn hang_up(&mut self) -> Result<()>;
    async fn power_down(&mut self) -> Result<()>;
    async fn deinit(&mut self) -> Result<()>;
    async fn setup_cmux(&mut self) -> Result<()>;
}
