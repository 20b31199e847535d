//! # Shared Protocol Library
//!
//! Types and helpers used by both the simulation server and its clients, so that both
//! ends agree on the shape of every document exchanged over the wire.
//!
//! ## Modules
//!
//! ### Vector Math (`vector`)
//! 2D vectors in `f64`, angle helpers working in degrees (anticlockwise, 0 = east) and
//! conversion between a body's local frame and the global frame.
//!
//! ### Protocol (`protocol`)
//! The `JOIN` / `UPDATE` request documents, user input, administrative commands and
//! the world-state views the server replies with.
//!
//! ### Framing (`framing`)
//! Every message travels as `"<byte length> <JSON body>"` over a short-lived TCP
//! connection: one request, one reply.

pub mod framing;
pub mod protocol;
pub mod vector;

pub use framing::{encode_frame, read_frame, write_frame, FrameError, MAX_FRAME_LEN};
pub use protocol::*;
pub use vector::{angle_diff, is_angle_between, normalize_angle, sign, BodyFrame, Vector2};

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 30300;

/// Reserved username of the administrator account.
pub const ADMIN_USERNAME: &str = "__admin__";

/// Single reply for every authentication failure, so account existence is not leaked.
pub const AUTH_FAILED_MSG: &str = "Either you have invalid credentials or have been blocked";

/// Reply sent to connections from blocked addresses.
pub const IP_BLOCKED_MSG: &str = "Your IP address has been blocked from this server";

/// Software version reported to joining clients as `[major, minor, patch]`.
pub fn software_version() -> Vec<String> {
    env!("CARGO_PKG_VERSION")
        .split('.')
        .map(str::to_string)
        .collect()
}
