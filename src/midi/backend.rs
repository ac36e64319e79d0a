//! `midir` implementation of the MIDI transport

use midir::{Ignore, MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::debug;

use super::{Direction, InboundHandler, MidiBackend, TransportError};

/// MIDI transport backed by the platform MIDI API through `midir`
pub struct MidirBackend {
    client_name: String,
    input_conn: Option<MidiInputConnection<()>>,
    output_conn: Option<MidiOutputConnection>,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            input_conn: None,
            output_conn: None,
        }
    }

    fn midi_input(&self, suffix: &str) -> Result<MidiInput, TransportError> {
        MidiInput::new(&format!("{}-{}", self.client_name, suffix)).map_err(backend_error)
    }

    fn midi_output(&self, suffix: &str) -> Result<MidiOutput, TransportError> {
        MidiOutput::new(&format!("{}-{}", self.client_name, suffix)).map_err(backend_error)
    }
}

fn backend_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Backend(e.to_string())
}

/// Port names in enumeration order; unreadable names stay as empty strings
/// so indices line up with `ports()`.
fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .map(|port| io.port_name(port).unwrap_or_default())
        .collect()
}

impl MidiBackend for MidirBackend {
    fn input_names(&self) -> Result<Vec<String>, TransportError> {
        let midi_in = self.midi_input("scan-in")?;
        let names = port_names(&midi_in);
        debug!("Found {} MIDI input ports", names.len());
        Ok(names)
    }

    fn output_names(&self) -> Result<Vec<String>, TransportError> {
        let midi_out = self.midi_output("scan-out")?;
        Ok(port_names(&midi_out))
    }

    fn open_input(&mut self, index: usize, mut handler: InboundHandler) -> Result<String, TransportError> {
        self.close_input();

        let mut midi_in = self.midi_input("in")?;
        // SysEx stays enabled; clock and active sensing never reach the handler
        midi_in.ignore(Ignore::TimeAndActiveSense);

        let port = midi_in
            .ports()
            .into_iter()
            .nth(index)
            .ok_or(TransportError::PortUnavailable { direction: Direction::Input, index })?;
        let name = midi_in.port_name(&port).unwrap_or_default();

        let conn = midi_in
            .connect(&port, &self.client_name, move |_timestamp, data, _| handler(data), ())
            .map_err(backend_error)?;

        self.input_conn = Some(conn);
        Ok(name)
    }

    fn open_output(&mut self, index: usize) -> Result<String, TransportError> {
        self.close_output();

        let midi_out = self.midi_output("out")?;
        let port = midi_out
            .ports()
            .into_iter()
            .nth(index)
            .ok_or(TransportError::PortUnavailable { direction: Direction::Output, index })?;
        let name = midi_out.port_name(&port).unwrap_or_default();

        let conn = midi_out.connect(&port, &self.client_name).map_err(backend_error)?;

        self.output_conn = Some(conn);
        Ok(name)
    }

    fn close_input(&mut self) {
        if let Some(conn) = self.input_conn.take() {
            conn.close();
        }
    }

    fn close_output(&mut self) {
        if let Some(conn) = self.output_conn.take() {
            conn.close();
        }
    }

    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let conn = self
            .output_conn
            .as_mut()
            .ok_or(TransportError::NotOpen(Direction::Output))?;
        conn.send(message).map_err(backend_error)
    }
}
