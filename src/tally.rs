//! Tally state controller
//!
//! Two execution contexts meet here. The poller owns the device link and
//! sends one poll request per tick; the transport's callback thread feeds
//! every inbound message through [`reply_sink`] into the shared
//! [`TallyBoard`]. The board sits behind a mutex, so the callback and the
//! shutdown path never race on the status tables or the outputs.

mod board;
mod poller;

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

use crate::link::ReplySink;
use crate::midi::format_hex;
use crate::sysex;

pub use board::TallyBoard;
pub use poller::{TallyPoller, TickOutcome};

/// Board shared between the transport callback and the orchestrator
pub type SharedBoard = Arc<Mutex<TallyBoard>>;

/// Build the inbound handler: decode tally replies and apply them to `board`
///
/// Anything that is not a tally report is dropped.
pub fn reply_sink(board: SharedBoard) -> ReplySink {
    Arc::new(move |data: &[u8]| {
        trace!("SysEx in: {}", format_hex(data));
        match sysex::parse_reply(data) {
            Some(report) => {
                board.lock().apply(report);
            }
            None => trace!("Ignoring non-tally message ({} bytes)", data.len()),
        }
    })
}
