//! Roland V-8HD SysEx dialect
//!
//! Builds the tally poll request (RQ1) and decodes the data-set (DT1)
//! replies that carry one channel's tally status.
//!
//! Inbound replies are not checksum-verified. The switcher's own checksum
//! byte is ignored and a corrupted reply is taken at face value.

use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// SysEx start byte
pub const SYSEX_START: u8 = 0xF0;

/// SysEx terminator
pub const SYSEX_END: u8 = 0xF7;

/// Roland "request data" command
pub const CMD_RQ1: u8 = 0x11;

/// Roland "data set" command, used by tally status replies
pub const CMD_DT1: u8 = 0x12;

/// Number of tally channels on the switcher
pub const CHANNEL_COUNT: usize = 8;

/// Length of a poll request frame
pub const POLL_REQUEST_LEN: usize = 16;

/// Manufacturer (41), device (10), model (00 00 00 68), command (RQ1)
const REQUEST_HEADER: [u8; 8] = [SYSEX_START, 0x41, 0x10, 0x00, 0x00, 0x00, 0x68, CMD_RQ1];

/// Bytes covered by the checksum in a poll request (address + size)
const CHECKSUM_RANGE: RangeInclusive<usize> = 8..=13;

const COMMAND_OFFSET: usize = 7;
const CHANNEL_OFFSET: usize = 10;
const STATUS_OFFSET: usize = 11;

/// Errors raised by the codec
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("tally channel {0} out of range (must be 0-7)")]
    ChannelOutOfRange(u8),
}

/// One switcher input slot, always in `0..=7`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const MAX: u8 = (CHANNEL_COUNT - 1) as u8;

    pub fn new(index: u8) -> Result<Self, ProtocolError> {
        if index > Self::MAX {
            return Err(ProtocolError::ChannelOutOfRange(index));
        }
        Ok(Self(index))
    }

    /// Wire value of the channel
    pub fn value(self) -> u8 {
        self.0
    }

    /// Index into per-channel tables
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Next channel in round-robin order (7 wraps to 0)
    pub fn next(self) -> Self {
        Self((self.0 + 1) % CHANNEL_COUNT as u8)
    }

    /// All channels in ascending order
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNEL_COUNT as u8).map(Channel)
    }
}

impl TryFrom<u8> for Channel {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Channel::new(value)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tally status reported for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TallyState {
    #[default]
    Off,
    OnAir,
}

impl TallyState {
    /// Only 1 means on air; every other status byte reads as off
    pub fn from_byte(byte: u8) -> Self {
        if byte == 1 {
            TallyState::OnAir
        } else {
            TallyState::Off
        }
    }

    pub fn is_on_air(self) -> bool {
        self == TallyState::OnAir
    }
}

/// A decoded tally status reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyReport {
    pub channel: Channel,
    pub state: TallyState,
}

/// Roland checksum: `128 - (sum mod 128)`
///
/// A sum that is a multiple of 128 yields 0x80. Poll requests never hit
/// that case (their covered bytes sum to 20..=27).
pub fn roland_checksum(bytes: &[u8]) -> u8 {
    let sum: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
    (128 - sum % 128) as u8
}

/// Build the 16-byte tally poll request for `channel`
///
/// `F0 41 10 00 00 00 68 11 | 0C 00 <ch> | 00 00 08 | <checksum> F7`
pub fn build_poll_request(channel: Channel) -> [u8; POLL_REQUEST_LEN] {
    let mut frame = [0u8; POLL_REQUEST_LEN];
    frame[..REQUEST_HEADER.len()].copy_from_slice(&REQUEST_HEADER);
    // address 0C 00 <ch>, size 00 00 08
    frame[8..14].copy_from_slice(&[0x0C, 0x00, channel.value(), 0x00, 0x00, 0x08]);
    frame[14] = roland_checksum(&frame[CHECKSUM_RANGE]);
    frame[15] = SYSEX_END;
    frame
}

/// Decode a tally status reply
///
/// Returns `None` for anything that is not a complete DT1 tally report:
/// non-SysEx data, other SysEx traffic from the switcher, truncated frames
/// and out-of-range channel bytes.
pub fn parse_reply(data: &[u8]) -> Option<TallyReport> {
    if data.len() <= 1 || data.last() != Some(&SYSEX_END) {
        return None;
    }

    if data.get(COMMAND_OFFSET) != Some(&CMD_DT1) {
        return None;
    }

    // The status byte must come before the terminator
    if data.len() <= STATUS_OFFSET + 1 {
        return None;
    }

    let channel = Channel::new(data[CHANNEL_OFFSET]).ok()?;
    let state = TallyState::from_byte(data[STATUS_OFFSET]);

    Some(TallyReport { channel, state })
}

#[cfg(test)]
pub(crate) fn tally_reply(channel: u8, status: u8) -> Vec<u8> {
    let mut frame = vec![
        SYSEX_START, 0x41, 0x10, 0x00, 0x00, 0x00, 0x68, CMD_DT1, 0x0C, 0x00, channel, status,
    ];
    frame.push(roland_checksum(&frame[8..]));
    frame.push(SYSEX_END);
    frame
}
