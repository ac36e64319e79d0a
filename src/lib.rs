//! Tally GW
//!
//! Mirrors the on-air tally of a Roland V-8HD video switcher onto relay
//! lamps. The switcher is polled over MIDI System Exclusive, one channel per
//! tick, and every change in its replies is fanned out to the lamp outputs.

pub mod config;
pub mod link;
pub mod midi;
pub mod output;
pub mod ports;
pub mod sysex;
pub mod tally;
