//! # Sailing Simulation Server Library
//!
//! This library provides the authoritative server for the multiplayer sailing
//! simulator. It owns every boat, the wind and the map, advances them one tick at a
//! time from the inputs clients send, and answers each client with the world state it
//! is allowed to see.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Boats are rigid bodies moved by hull drag, sail and rudder forces computed from
//! a thin-plate lift/drag model. All physics runs here; clients only render what the
//! server reports.
//!
//! ### Session Management
//! Each participant owns one session with a boat, an autopilot, a timer and a
//! lifecycle (sailing, paused, finished, shipwrecked). Sessions persist across runs
//! in simulation files.
//!
//! ### Administration
//! A reserved administrator account, authenticated with a per-run code, piggybacks
//! commands on its UPDATE requests: pausing, resetting, time scaling, blocking
//! addresses or users, moving and repairing boats, and quitting.
//!
//! ## Architecture Design
//!
//! ### Single Tick Loop
//! Connection tasks only read and parse requests. Every parsed request is queued to a
//! single loop that owns the simulation, so no simulation state is shared between
//! tasks. Each tick drains a batch, runs admin commands, steps the wind, advances every
//! session and resolves boat collisions, then replies to every request in the batch.
//!
//! ### TCP Request/Reply
//! Each connection carries exactly one length-framed JSON request and its reply.
//!
//! ## Module Organization
//!
//! ### Physics (`physics`, `surface`, `rudder`, `geometry`)
//! Drag laws, the flat lifting surface shared by sails and rudder, rudder input
//! arbitration and hull polygons.
//!
//! ### Boats and World (`boat`, `wind`, `map`, `autopilot`)
//! Boat specifications and integration, the drifting wind, landmasses with collision
//! and finish detection, and the upwind-aware autopilot.
//!
//! ### Sessions and Simulation (`session`, `simulation`, `timer`, `admin`)
//! Per-participant state machine, the tick itself, simulated-time stopwatches and
//! the administrator command set.
//!
//! ### Infrastructure (`network`, `resources`, `config`, `error`)
//! TCP serving, the resource directory, typed settings and the error type.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::admin::ServerControls;
//! use server::network::{Server, ServerConfig};
//! use server::resources::Resources;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resources = Resources::new("resources");
//!     let sim = resources.load_simulation("default", "1234")?;
//!     let server = Server::bind(ServerConfig::default(), sim, ServerControls::new(resources)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod autopilot;
pub mod boat;
pub mod config;
pub mod error;
pub mod geometry;
pub mod map;
pub mod network;
pub mod physics;
pub mod resources;
pub mod rudder;
pub mod session;
pub mod simulation;
pub mod surface;
pub mod timer;
pub mod wind;

pub use error::{Result, SimError};
