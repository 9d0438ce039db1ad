//! Watchdog loop tests over a real log directory.

mod watchdog_test;
