//! Log line trigger.

/// Server log text announcing that workshop mods are out of date.
pub const MOD_UPDATE_MARKER: &str = "CheckModsNeedUpdate: Mods need update";

/// True when `line` should arm a restart. Case-sensitive substring match.
#[must_use]
pub fn is_trigger_line(line: &str) -> bool {
    line.contains(MOD_UPDATE_MARKER)
}
