//! MIDI transport capability
//!
//! The tally link needs very little from a MIDI stack: endpoint names,
//! opening an endpoint by index, sending a whole message and a callback per
//! inbound message. `MidiBackend` captures exactly that. Production uses
//! `midir` (see [`backend::MidirBackend`]).

pub mod backend;
#[cfg(test)]
pub(crate) mod fake;

use std::fmt;
use thiserror::Error;

pub use backend::MidirBackend;

/// Callback invoked with every complete inbound message
pub type InboundHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Endpoint direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Errors reported by a MIDI backend
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MIDI {direction} endpoint #{index} is not available")]
    PortUnavailable { direction: Direction, index: usize },

    #[error("MIDI {0} endpoint is not open")]
    NotOpen(Direction),

    #[error("MIDI backend: {0}")]
    Backend(String),
}

/// Abstract MIDI transport
///
/// Endpoint names are returned in enumeration order; the index of a name
/// is what `open_input`/`open_output` expect.
pub trait MidiBackend: Send {
    fn input_names(&self) -> Result<Vec<String>, TransportError>;

    fn output_names(&self) -> Result<Vec<String>, TransportError>;

    /// Open an input endpoint with SysEx enabled and timing clock/active
    /// sensing filtered out. Returns the endpoint name.
    fn open_input(&mut self, index: usize, handler: InboundHandler) -> Result<String, TransportError>;

    /// Open an output endpoint. Returns the endpoint name.
    fn open_output(&mut self, index: usize) -> Result<String, TransportError>;

    fn close_input(&mut self);

    fn close_output(&mut self);

    fn send(&mut self, message: &[u8]) -> Result<(), TransportError>;
}

/// Index of the first endpoint whose name contains `token` (case-sensitive)
pub fn find_port_by_substring(names: &[String], token: &str) -> Option<usize> {
    names.iter().position(|name| name.contains(token))
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_first_match() {
        let ports = names(&["Midi Through", "V-8HD MIDI 1", "V-8HD MIDI 2"]);
        assert_eq!(find_port_by_substring(&ports, "V-8HD"), Some(1));
    }

    #[test]
    fn test_find_is_case_sensitive() {
        let ports = names(&["v-8hd midi 1"]);
        assert_eq!(find_port_by_substring(&ports, "V-8HD"), None);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xF0, 0x41, 0x0C, 0xF7]), "F0 41 0C F7");
        assert_eq!(format_hex(&[]), "");
    }
}
