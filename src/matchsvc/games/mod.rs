//! The uniform game contract.
//!
//! A match service hosts exactly one [`MatchSim`]: the authoritative state
//! of a two-player game. The framework owns the sockets, the tick and
//! snapshot cadences, forfeit/disconnect handling, and end-of-match
//! reporting; the sim owns the rules. Both reference games (and any
//! uploaded artifact speaking the same wire contract) fit behind this
//! trait.

pub mod snake;
pub mod tetris;

use serde_json::{Map, Value};
use std::time::Duration;

use crate::protocol::{EndReason, PlayerSlot, Winner};

/// How a finished match came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub winner: Winner,
    pub reason: EndReason,
}

/// Per-player figures a sim reports at match end: `(score, lines)`.
pub type SlotScore = (i64, u32);

/// Authoritative state of one two-player match.
pub trait MatchSim: Send + 'static {
    /// Build the initial state. Both players observe the same seed via
    /// `WELCOME`, so local prediction can mirror the server's sequence.
    fn from_seed(seed: u64) -> Self
    where
        Self: Sized;

    /// Apply one input token from a player. Unknown tokens are ignored.
    fn apply_input(&mut self, slot: PlayerSlot, action: &str);

    /// Advance the simulation one step at [`MatchSim::tick_interval`].
    fn tick(&mut self);

    /// Terminal check after inputs and ticks; `None` while the match runs.
    fn outcome(&self) -> Option<Outcome>;

    /// Decision when the clock runs out.
    fn final_outcome(&self) -> Outcome;

    /// Full snapshot body broadcast to both players.
    fn snapshot(&self, remaining_secs: u64) -> Map<String, Value>;

    /// Final `(score, lines)` per slot, P1 first.
    fn scores(&self) -> [SlotScore; 2];

    /// Simulation step cadence.
    fn tick_interval(&self) -> Duration;

    /// Wall-clock length of a match.
    fn match_duration(&self) -> Duration;
}
