//! Round-robin tally polling loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, trace, warn};

use crate::config::PollingConfig;
use crate::link::DeviceLink;
use crate::midi::{format_hex, MidiBackend};
use crate::sysex::{self, Channel};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Poll request sent for the channel
    Sent(Channel),
    /// The transport rejected the poll request for the channel
    SendFailed(Channel),
    /// Link closed; nothing sent
    LinkClosed,
    /// Output endpoint vanished; link re-acquired instead of sending
    Reacquired,
}

/// Polls the switcher for one channel's tally per tick
pub struct TallyPoller<B> {
    link: DeviceLink<B>,
    cursor: Channel,
    interval: Duration,
    /// Closed ticks between two reconnect attempts
    reconnect_ticks: u32,
    closed_ticks: u32,
}

impl<B: MidiBackend> TallyPoller<B> {
    pub fn new(link: DeviceLink<B>, config: &PollingConfig) -> Self {
        let interval = config.interval();
        let reconnect_ticks = (config.reconnect_interval().as_millis() / interval.as_millis().max(1)).max(1);

        Self {
            link,
            cursor: Channel::default(),
            interval,
            reconnect_ticks: u32::try_from(reconnect_ticks).unwrap_or(u32::MAX),
            closed_ticks: 0,
        }
    }

    /// Channel the next poll request will ask for
    pub fn cursor(&self) -> Channel {
        self.cursor
    }

    pub fn link(&self) -> &DeviceLink<B> {
        &self.link
    }

    /// Run one polling step
    pub fn tick(&mut self) -> TickOutcome {
        if !self.link.is_open() {
            self.closed_ticks += 1;
            if self.closed_ticks >= self.reconnect_ticks {
                self.closed_ticks = 0;
                self.link.ensure_open();
            }
            return TickOutcome::LinkClosed;
        }

        if !self.link.is_output_healthy() {
            info!("{} output disappeared, reconnecting", self.link.token());
            self.closed_ticks = 0;
            self.link.ensure_open();
            return TickOutcome::Reacquired;
        }

        let channel = self.cursor;
        let frame = sysex::build_poll_request(channel);
        let outcome = match self.link.send(&frame) {
            Ok(()) => {
                trace!("Poll ch{}: {}", channel, format_hex(&frame));
                TickOutcome::Sent(channel)
            }
            Err(e) => {
                warn!("Failed to poll tally {}: {}", channel, e);
                TickOutcome::SendFailed(channel)
            }
        };

        self.cursor = channel.next();
        outcome
    }

    /// Poll until `stop` is set, then hand the link back for cleanup
    ///
    /// Blocks the calling thread: endpoint enumeration is synchronous, so
    /// this runs on a dedicated worker (`spawn_blocking` in `main`). The
    /// flag is checked once per tick.
    pub fn run(mut self, stop: Arc<AtomicBool>) -> DeviceLink<B> {
        info!("Tally polling started ({:?} interval)", self.interval);

        while !stop.load(Ordering::Acquire) {
            self.tick();
            thread::sleep(self.interval);
        }

        info!("Tally polling stopped");
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{LinkState, ReplySink};
    use crate::midi::fake::FakeBackend;

    fn config(interval_ms: u64, reconnect_interval_ms: u64) -> PollingConfig {
        PollingConfig {
            interval_ms,
            reconnect_interval_ms,
        }
    }

    fn poller(backend: &FakeBackend, polling: PollingConfig) -> TallyPoller<FakeBackend> {
        let sink: ReplySink = Arc::new(|_: &[u8]| {});
        let mut link = DeviceLink::new(backend.clone(), "V-8HD", sink);
        link.ensure_open();
        TallyPoller::new(link, &polling)
    }

    fn device() -> FakeBackend {
        FakeBackend::with_ports(&["V-8HD MIDI 1"], &["V-8HD MIDI 1"])
    }

    #[test]
    fn test_round_robin_covers_all_channels() {
        let backend = device();
        let mut poller = poller(&backend, config(50, 1000));

        for expected in 0..8u8 {
            assert_eq!(poller.tick(), TickOutcome::Sent(Channel::new(expected).unwrap()));
        }
        assert_eq!(poller.tick(), TickOutcome::Sent(Channel::new(0).unwrap()));

        let queried: Vec<u8> = backend.state().sent.iter().map(|frame| frame[10]).collect();
        assert_eq!(queried, vec![0, 1, 2, 3, 4, 5, 6, 7, 0]);
    }

    #[test]
    fn test_sent_frames_are_poll_requests() {
        let backend = device();
        let mut poller = poller(&backend, config(50, 1000));

        poller.tick();
        let frame = backend.state().sent[0].clone();
        assert_eq!(frame, sysex::build_poll_request(Channel::new(0).unwrap()).to_vec());
    }

    #[test]
    fn test_unhealthy_output_reacquires_without_sending() {
        let backend = device();
        let mut poller = poller(&backend, config(50, 1000));
        poller.tick();

        backend.state().outputs.clear();
        let scans_before = backend.state().input_scans;

        assert_eq!(poller.tick(), TickOutcome::Reacquired);
        assert_eq!(backend.state().sent.len(), 1);
        // ensure_open scans inputs exactly once
        assert_eq!(backend.state().input_scans, scans_before + 1);
        assert_eq!(poller.cursor(), Channel::new(1).unwrap());
        assert_eq!(poller.link().state(), LinkState::Closed);
    }

    #[test]
    fn test_closed_link_retries_on_reconnect_interval() {
        let backend = FakeBackend::with_ports(&[], &[]);
        let mut poller = poller(&backend, config(50, 200));
        let scans_before = backend.state().input_scans;

        for _ in 0..3 {
            assert_eq!(poller.tick(), TickOutcome::LinkClosed);
        }
        assert_eq!(backend.state().input_scans, scans_before);

        // Device appears; the fourth closed tick reconnects
        {
            let mut state = backend.state();
            state.inputs = vec!["V-8HD MIDI 1".to_string()];
            state.outputs = vec!["V-8HD MIDI 1".to_string()];
        }
        assert_eq!(poller.tick(), TickOutcome::LinkClosed);
        assert_eq!(backend.state().input_scans, scans_before + 1);
        assert!(poller.link().is_open());

        assert_eq!(poller.tick(), TickOutcome::Sent(Channel::new(0).unwrap()));
    }

    #[test]
    fn test_failed_send_still_advances_cursor() {
        let backend = device();
        let mut poller = poller(&backend, config(50, 1000));
        backend.state().fail_send = true;

        let channel = Channel::new(0).unwrap();
        assert_eq!(poller.tick(), TickOutcome::SendFailed(channel));
        assert_eq!(poller.cursor(), channel.next());
        assert!(backend.state().sent.is_empty());

        backend.state().fail_send = false;
        assert_eq!(poller.tick(), TickOutcome::Sent(channel.next()));
    }

    #[test]
    fn test_run_stops_on_flag() {
        let backend = device();
        let poller = poller(&backend, config(1, 10));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let stop = stop.clone();
            thread::spawn(move || poller.run(stop))
        };
        thread::sleep(Duration::from_millis(30));
        stop.store(true, Ordering::Release);

        let link = worker.join().unwrap();
        assert!(link.is_open());
        assert!(!backend.state().sent.is_empty());
    }
}
