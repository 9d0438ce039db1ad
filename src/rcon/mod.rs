//! Remote administration of the game server over Source RCON.

mod client;
mod error;
pub mod markers;
pub mod packet;
mod session;

pub use client::RconClient;
pub use error::RconError;
pub use markers::{escape_broadcast, parse_player_count};
pub use session::{RconSession, RemoteControl};
