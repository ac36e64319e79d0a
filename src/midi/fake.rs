//! In-memory MIDI backend for tests

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

use super::{Direction, InboundHandler, MidiBackend, TransportError};

#[derive(Default)]
pub(crate) struct FakeState {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub sent: Vec<Vec<u8>>,
    pub open_input: Option<usize>,
    pub open_output: Option<usize>,
    pub input_scans: usize,
    pub output_scans: usize,
    pub fail_output_open: bool,
    pub fail_send: bool,
    handler: Option<InboundHandler>,
}

/// Cloneable handle; clones share the same state so a test can keep one
/// while the link owns another.
#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn with_ports(inputs: &[&str], outputs: &[&str]) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state();
            state.inputs = inputs.iter().map(|s| s.to_string()).collect();
            state.outputs = outputs.iter().map(|s| s.to_string()).collect();
        }
        backend
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    /// Simulate the transport delivering a message on the open input
    pub fn deliver(&self, data: &[u8]) {
        let handler = self.state.lock().handler.take();
        if let Some(mut handler) = handler {
            handler(data);
            self.state.lock().handler = Some(handler);
        }
    }

    pub fn unplug(&self) {
        let mut state = self.state();
        state.inputs.clear();
        state.outputs.clear();
    }
}

impl MidiBackend for FakeBackend {
    fn input_names(&self) -> Result<Vec<String>, TransportError> {
        let mut state = self.state.lock();
        state.input_scans += 1;
        Ok(state.inputs.clone())
    }

    fn output_names(&self) -> Result<Vec<String>, TransportError> {
        let mut state = self.state.lock();
        state.output_scans += 1;
        Ok(state.outputs.clone())
    }

    fn open_input(&mut self, index: usize, handler: InboundHandler) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        let name = state
            .inputs
            .get(index)
            .cloned()
            .ok_or(TransportError::PortUnavailable { direction: Direction::Input, index })?;
        state.open_input = Some(index);
        state.handler = Some(handler);
        Ok(name)
    }

    fn open_output(&mut self, index: usize) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        if state.fail_output_open {
            return Err(TransportError::Backend("device busy".to_string()));
        }
        let name = state
            .outputs
            .get(index)
            .cloned()
            .ok_or(TransportError::PortUnavailable { direction: Direction::Output, index })?;
        state.open_output = Some(index);
        Ok(name)
    }

    fn close_input(&mut self) {
        let mut state = self.state.lock();
        state.open_input = None;
        state.handler = None;
    }

    fn close_output(&mut self) {
        self.state.lock().open_output = None;
    }

    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.open_output.is_none() {
            return Err(TransportError::NotOpen(Direction::Output));
        }
        if state.fail_send {
            return Err(TransportError::Backend("send rejected".to_string()));
        }
        state.sent.push(message.to_vec());
        Ok(())
    }
}
