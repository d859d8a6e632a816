//! Terminal result-code classification.
//!
//! A pure function over a line slice (already CR/LF-stripped by the
//! caller), independent of any I/O, so it is directly testable. Mirrors
//! `MODEM_RESULT_CODE_*` from the original DCE header.

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Classification {
    /// Keep waiting: not a terminal line (e.g. an echo, an intermediate
    /// info line, or a `+CSQ:`-style response body).
    Informational,
    /// Terminal success: `OK` or `CONNECT`.
    Success,
    /// Terminal failure: `ERROR`, `NO CARRIER`, `NO DIALTONE`, `BUSY`,
    /// `NO ANSWER`.
    Failure,
    /// Unsolicited `RING`, routed to the event channel; never completes
    /// a pending command.
    Ring,
}

pub fn classify(line: &str) -> Classification {
    let line = line.trim_matches(|c| c == '\r' || c == '\n' || c == ' ');
    match line {
        "OK" | "CONNECT" => Classification::Success,
        "ERROR" | "NO CARRIER" | "NO DIALTONE" | "BUSY" | "NO ANSWER" => Classification::Failure,
        "RING" => Classification::Ring,
        _ => Classification::Informational,
    }
}
