//! # Sailing Simulation Client Library
//!
//! A headless participant for the sailing simulation server. It JOINs once, then
//! sends UPDATE requests on a fixed interval carrying rudder, sheeting and autopilot
//! input, and reads back the world state the server is willing to show it.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! One TCP connection per request, length-framed JSON, a timeout on every exchange
//! and typed errors distinguishing server refusals from transport failures.
//!
//! ### Input Module (`input`)
//! Turns command-line controls into the per-tick `UserInput` document.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::ServerConnection;
//! use shared::{Credentials, UserInput};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = ServerConnection::new(
//!         "127.0.0.1:30300",
//!         Credentials::new("alice", "secret"),
//!         Duration::from_secs(5),
//!     );
//!     connection.join().await?;
//!     let world = connection.update(UserInput::default(), 100.0, vec![]).await?;
//!     println!("wind: {:?}", world.global_data.wind);
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
