//! Session lifecycle primitives.
//!
//! - `workspace`: the ephemeral output directory of one serve session
//! - `shutdown`: single-execution cleanup shared by every exit path
//! - `signal`: routes OS terminate requests into one handler

mod shutdown;
mod signal;
mod workspace;

pub use shutdown::ShutdownCoordinator;
pub use signal::{SignalBridge, SignalHandler};
pub use workspace::EphemeralWorkspace;
