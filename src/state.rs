pub mod conversation;
pub mod transcript;

pub use conversation::{
    ChatSession, ReducerEffect, RunFailure, RunOutcome, RunPhase, SessionOptions, StreamReducer,
};
pub use transcript::{Message, Role, Transcript};
