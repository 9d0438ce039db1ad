//! PZ Watchdog - restarts a Project Zomboid server over RCON when its
//! workshop mods need an update.

pub mod config;
pub mod daemon;
pub mod health;
pub mod logging;
pub mod notify;
pub mod rcon;
pub mod restart;
pub mod watcher;
