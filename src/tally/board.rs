//! Per-channel tally table with change detection

use tracing::{debug, warn};

use crate::output::TallyOutput;
use crate::sysex::{Channel, TallyReport, TallyState, CHANNEL_COUNT};

/// Tally status of every channel plus the lamp outputs it drives
///
/// `previous` starts as `None` for every channel so the first report of a
/// channel always counts as a change.
pub struct TallyBoard {
    status: [TallyState; CHANNEL_COUNT],
    previous: [Option<TallyState>; CHANNEL_COUNT],
    active: Option<Channel>,
    output: Box<dyn TallyOutput>,
}

impl TallyBoard {
    pub fn new(output: Box<dyn TallyOutput>) -> Self {
        Self {
            status: [TallyState::Off; CHANNEL_COUNT],
            previous: [None; CHANNEL_COUNT],
            active: None,
            output,
        }
    }

    /// Channel currently considered on air
    pub fn active(&self) -> Option<Channel> {
        self.active
    }

    pub fn status(&self, channel: Channel) -> TallyState {
        self.status[channel.index()]
    }

    /// Record a reported status; returns true when the lamps were redriven
    ///
    /// A report identical to the last one seen for its channel changes
    /// nothing. Otherwise the active channel is recomputed and every lamp
    /// is written, so the previously active lamp is always switched off.
    pub fn apply(&mut self, report: TallyReport) -> bool {
        let index = report.channel.index();
        self.status[index] = report.state;

        if self.previous[index] == Some(report.state) {
            return false;
        }
        self.previous[index] = Some(report.state);

        self.active = self.scan_active();
        debug!(
            "Channel {} -> {:?}, active tally: {:?}",
            report.channel, report.state, self.active
        );

        self.drive_lamps();
        true
    }

    /// Switch every lamp off without touching the status table
    pub fn all_off(&mut self) {
        for channel in Channel::all() {
            self.set_lamp(channel, false);
        }
    }

    /// Switch every lamp off and release the output lines
    pub fn shutdown(&mut self) {
        self.all_off();
        if let Err(e) = self.output.release() {
            warn!("Failed to release tally outputs: {}", e);
        }
    }

    /// Highest on-air channel; keeps the previous value when none is on air
    fn scan_active(&self) -> Option<Channel> {
        Channel::all()
            .filter(|channel| self.status[channel.index()].is_on_air())
            .last()
            .or(self.active)
    }

    fn drive_lamps(&mut self) {
        for channel in Channel::all() {
            let lit = self.active == Some(channel);
            self.set_lamp(channel, lit);
        }
    }

    fn set_lamp(&mut self, channel: Channel, lit: bool) {
        if let Err(e) = self.output.set_lamp(channel, lit) {
            warn!("Failed to drive tally lamp {}: {}", channel, e);
        }
    }
}
