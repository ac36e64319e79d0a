//! Device link management
//!
//! Keeps exactly one input and one output endpoint bound to the switcher and
//! re-acquires them when the device disappears (powered off, unplugged,
//! still booting). Absence is a normal condition: the link simply stays
//! closed until a later `ensure_open` finds the device again.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::midi::{find_port_by_substring, Direction, MidiBackend, TransportError};

/// Receives every inbound message from the device's input endpoint
pub type ReplySink = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Open/closed state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Open,
}

/// An opened endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("device link is not open")]
    NotOpen,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Link to the switcher's MIDI endpoints
pub struct DeviceLink<B> {
    backend: B,
    token: String,
    sink: ReplySink,
    input: Option<Endpoint>,
    output: Option<Endpoint>,
    /// Set once the current absence has been reported at info level
    absence_reported: bool,
}

impl<B: MidiBackend> DeviceLink<B> {
    /// Create a closed link matching endpoints whose name contains `token`
    pub fn new(backend: B, token: impl Into<String>, sink: ReplySink) -> Self {
        Self {
            backend,
            token: token.into(),
            sink,
            input: None,
            output: None,
            absence_reported: false,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Both endpoints are bound
    pub fn is_open(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }

    pub fn state(&self) -> LinkState {
        if self.is_open() {
            LinkState::Open
        } else {
            LinkState::Closed
        }
    }

    pub fn input(&self) -> Option<&Endpoint> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&Endpoint> {
        self.output.as_ref()
    }

    /// Make sure both endpoints are open, rescanning and reopening if needed
    ///
    /// Does nothing when the link is open and the device is still
    /// enumerable on both sides. Otherwise closes whatever is open, rescans
    /// and opens the first matching input and output.
    pub fn ensure_open(&mut self) -> LinkState {
        let inputs = self.scan(Direction::Input);
        let outputs = self.scan(Direction::Output);
        let found_in = find_port_by_substring(&inputs, &self.token);
        let found_out = find_port_by_substring(&outputs, &self.token);

        if self.is_open() && found_in.is_some() && found_out.is_some() {
            return LinkState::Open;
        }

        self.close();

        let (Some(in_index), Some(out_index)) = (found_in, found_out) else {
            if self.absence_reported {
                debug!(
                    "{} still not connected (input: {}, output: {})",
                    self.token,
                    found_in.is_some(),
                    found_out.is_some()
                );
            } else {
                info!("{} not connected, waiting for device", self.token);
                self.absence_reported = true;
            }
            return LinkState::Closed;
        };

        if let Err(e) = self.open_input(in_index) {
            warn!("Failed to open {} input: {}", self.token, e);
            self.close();
            return LinkState::Closed;
        }

        if let Err(e) = self.open_output(out_index) {
            warn!("Failed to open {} output: {}", self.token, e);
            self.close();
            return LinkState::Closed;
        }

        self.absence_reported = false;
        info!(
            "Connected to {} - Input: '{}', Output: '{}'",
            self.token,
            self.input.as_ref().map(|e| e.name.as_str()).unwrap_or_default(),
            self.output.as_ref().map(|e| e.name.as_str()).unwrap_or_default()
        );
        LinkState::Open
    }

    /// Rescan output endpoints and report whether the device is listed
    ///
    /// Never cached: a stale output handle keeps accepting sends after the
    /// device is unplugged, so enumeration is the only reliable signal.
    pub fn is_output_healthy(&self) -> bool {
        match self.backend.output_names() {
            Ok(names) => find_port_by_substring(&names, &self.token).is_some(),
            Err(e) => {
                warn!("Failed to enumerate MIDI outputs: {}", e);
                false
            }
        }
    }

    /// Send a complete message through the output endpoint
    pub fn send(&mut self, message: &[u8]) -> Result<(), LinkError> {
        if self.output.is_none() {
            return Err(LinkError::NotOpen);
        }
        self.backend.send(message)?;
        Ok(())
    }

    /// Close both endpoints
    pub fn close(&mut self) {
        if let Some(endpoint) = self.input.take() {
            debug!("Closing MIDI input '{}'", endpoint.name);
            self.backend.close_input();
        }
        if let Some(endpoint) = self.output.take() {
            debug!("Closing MIDI output '{}'", endpoint.name);
            self.backend.close_output();
        }
    }

    fn scan(&self, direction: Direction) -> Vec<String> {
        let result = match direction {
            Direction::Input => self.backend.input_names(),
            Direction::Output => self.backend.output_names(),
        };
        result.unwrap_or_else(|e| {
            warn!("Failed to enumerate MIDI {}s: {}", direction, e);
            Vec::new()
        })
    }

    fn open_input(&mut self, index: usize) -> Result<(), TransportError> {
        let sink = self.sink.clone();
        let name = self
            .backend
            .open_input(index, Box::new(move |data: &[u8]| sink(data)))?;
        debug!("MIDI input opened: #{} '{}'", index, name);
        self.input = Some(Endpoint { index, name });
        Ok(())
    }

    fn open_output(&mut self, index: usize) -> Result<(), TransportError> {
        let name = self.backend.open_output(index)?;
        debug!("MIDI output opened: #{} '{}'", index, name);
        self.output = Some(Endpoint { index, name });
        Ok(())
    }
}
