//! Match service framework.
//!
//! A match service is a short-lived process serving exactly one game
//! between two players. The lobby spawns it with the uniform CLI
//! (`--mode server --port N --p1 U1 --p2 U2 --room_id R`), players connect
//! and receive `WELCOME`, and the service runs the game to completion,
//! reports the log to storage, broadcasts `GAME_OVER`, and notifies the
//! lobby.
//!
//! - [`games`]: the [`games::MatchSim`] contract and the two reference
//!   games
//! - [`server`]: the authoritative server runner
//! - [`client`]: the thin terminal client

pub mod client;
pub mod games;
pub mod server;

pub use client::{run_client, ClientOptions, GameUi};
pub use games::{MatchSim, Outcome};
pub use server::{run_server, MatchOptions};
