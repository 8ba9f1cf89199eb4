mod core;
mod state;
mod streaming;
mod tools;
mod watchdog;


pub use self::core::{ChatSession, RunOutcome, SessionOptions};
pub use state::{ReducerEffect, RunFailure, RunPhase, StreamReducer, DEFAULT_FILE_URL_BASE};
pub use watchdog::{Heartbeat, Watchdog};
