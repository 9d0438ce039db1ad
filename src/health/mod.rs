//! Server reachability probing.

mod prober;

pub use prober::*;
