//! Restart sequence tests.


/// Verify the restart types are exported from the library.
#[test]
fn test_all_restart_types_exported() {
    use pz_watchdog::restart::{
        is_trigger_line, RestartError, RestartOutcome, RestartPhase, RestartSession,
        RestartTiming, MOD_UPDATE_MARKER,
    };

    assert!(is_trigger_line(MOD_UPDATE_MARKER));
    let _ = RestartSession::new(5);
    let _ = RestartTiming::default();
    let _ = RestartPhase::Idle;
    let _: fn() -> RestartOutcome = || RestartOutcome::Ignored;
    let _: fn() -> RestartError = || RestartError::Panicked(String::new());
}
