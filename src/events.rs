//! Out-of-band event registry (SPEC_FULL §3.1).
//!
//! `register_event_handler`/`remove_event_handler` (§6 Upward API) need
//! somewhere to live; matching the teacher's avoidance of `dyn`/closures
//! on a microcontroller target, handlers are plain `fn` pointers kept in
//! a fixed-capacity vector.

use heapless::Vec;

pub const MAX_EVENT_HANDLERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum EventKind {
    Ring,
    UnknownInput,
    ProtocolError,
    Resync,
    CmuxClosed,
}

#[derive(Debug, Clone, Copy, defmt::Format)]
pub enum Event<'a> {
    Ring,
    UnknownInput { line: &'a str },
    ProtocolError { detail: &'a str },
    Resync,
    CmuxClosed,
}

impl<'a> Event<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ring => EventKind::Ring,
            Event::UnknownInput { .. } => EventKind::UnknownInput,
            Event::ProtocolError { .. } => EventKind::ProtocolError,
            Event::Resync => EventKind::Resync,
            Event::CmuxClosed => EventKind::CmuxClosed,
        }
    }
}

pub type Handler = fn(&Event<'_>);

#[derive(Default)]
pub struct EventRegistry {
    handlers: Vec<(EventKind, Handler), MAX_EVENT_HANDLERS>,
}

impl EventRegistry {
    pub const fn new() -> Self {
        EventRegistry { handlers: Vec::new() }
    }

    /// Registers `handler` for `kind`. Returns `false` if the registry is
    /// full; the caller is expected to surface that as `InvalidArgument`.
    pub fn register(&mut self, kind: EventKind, handler: Handler) -> bool {
        self.handlers.push((kind, handler)).is_ok()
    }

    /// Removes every registration of `handler`, regardless of kind.
    pub fn remove(&mut self, handler: Handler) {
        let mut i = 0;
        while i < self.handlers.len() {
            if self.handlers[i].1 as usize == handler as usize {
                self.handlers.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Dispatches `event` synchronously to every handler registered for
    /// its kind.
    pub fn dispatch(&self, event: &Event<'_>) {
        let kind = event.kind();
        for (k, h) in self.handlers.iter() {
            if *k == kind {
                h(event);
            }
        }
    }

    /// Copies out the handlers registered for `kind` without borrowing
    /// `self`, letting a caller release a lock before invoking them.
    pub fn handlers_for(&self, kind: EventKind) -> Vec<Handler, MAX_EVENT_HANDLERS> {
        self.handlers
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| *h)
            .collect()
    }
}
