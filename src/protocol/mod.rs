//! Wire protocol shared by every link in the control plane.
//!
//! - [`framing`]: the length-prefixed frame codec
//! - [`messages`]: request/response envelopes, pushes, match messages
//! - [`reason`]: the error-reason token taxonomy
//! - [`types`]: small shared wire types
//! - [`validation`]: per-action request shape checks

pub mod framing;
pub mod messages;
pub mod reason;
pub mod types;
pub mod validation;

pub use framing::{encode, read_frame, recv_message, send_message, write_frame, FrameError, MAX_FRAME_LEN};

pub use messages::{
    Envelope, MatchClientMessage, MatchServerMessage, Push, Reply, Status, StorageRequest,
};

pub use reason::Reason;

pub use types::{
    EndReason, PlayerResult, PlayerSlot, RoomStatus, RoomSummary, SessionStatus, UserProfile,
    UserSummary, Winner,
};
