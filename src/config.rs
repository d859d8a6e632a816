//! Driver configuration.
//!
//! Field names mirror the configuration keys this driver recognizes
//! (`line_buffer_size`, `baud_rate`, ... `apn`) rather than any particular
//! transport's native config type, so the same `Config` works regardless
//! of which `Transport` implementation is bound underneath.

use heapless::String;

pub const MAX_APN_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum CmuxSetting {
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, defmt::Format)]
pub struct Config {
    pub line_buffer_size: usize,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub tx_buffer_size: usize,
    pub rx_buffer_size: usize,
    pub event_queue_size: usize,
    pub event_task_stack_size: usize,
    pub event_task_priority: u8,
    pub pattern_queue_size: usize,
    pub cmux: CmuxSetting,
    pub apn: String<MAX_APN_LEN>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            line_buffer_size: 128,
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            tx_buffer_size: 512,
            rx_buffer_size: 1024,
            event_queue_size: 16,
            event_task_stack_size: 2048,
            event_task_priority: 5,
            pattern_queue_size: 16,
            cmux: CmuxSetting::Disabled,
            apn: String::new(),
        }
    }
}

/// Timeout constants, unit: milliseconds.
///
/// Carried over from `MODEM_COMMAND_TIMEOUT_*` in the original DCE header.
pub mod timeout_ms {
    pub const COMMAND_DEFAULT: u64 = 1500;
    pub const OPERATOR_QUERY: u64 = 75_000;
    pub const MODE_CHANGE: u64 = 5_000;
    pub const HANG_UP: u64 = 90_000;
    pub const POWER_OFF: u64 = 1_000;
}
