//! Commands sent to the server and the text markers its replies are
//! classified by.
//!
//! The server answers with free text only, so these constants are the
//! whole response contract. Bump [`MARKER_SET_VERSION`] whenever one of
//! them changes so log output can be correlated with the marker set in use.

use std::sync::LazyLock;

use regex::Regex;

/// Version of the marker set below.
pub const MARKER_SET_VERSION: u32 = 1;

/// Player-list query.
pub const STATUS_COMMAND: &str = "players";
/// Server-wide announcement; the quoted message follows.
pub const BROADCAST_COMMAND: &str = "servermsg";
/// Graceful save-and-quit.
pub const QUIT_COMMAND: &str = "quit";
/// Ask the server to look for workshop mod updates now.
pub const MOD_CHECK_COMMAND: &str = "checkModsNeedUpdate";

/// Present in a status reply when the server is up.
pub const ONLINE_MARKER: &str = "Players connected";
/// Present in a status reply relayed by a proxy when the server is down.
pub const REFUSED_MARKER: &str = "Connection refused";

/// Player count in a status reply, e.g. `Players connected (3):`.
static PLAYER_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\)").expect("player count pattern is valid"));

/// Extract the parenthesized player count from a status reply.
///
/// Returns 0 when no count is present or it does not fit in a `u32`.
#[must_use]
pub fn parse_player_count(status: &str) -> u32 {
    PLAYER_COUNT
        .captures(status)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Escape text for use inside a quoted `servermsg` argument.
#[must_use]
pub fn escape_broadcast(message: &str) -> String {
    message.replace('\\', "\\\\").replace('"', "\\\"")
}
