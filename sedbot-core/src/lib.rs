//! Sedbot - sed-style message correction for chat rooms.
//!
//! A user types `s/teh/the/` (or `... sed s#teh#the# ...`) and the bot
//! replies to the message that was meant with a corrected copy.
//!
//! ## Architecture
//!
//! ```text
//! ChatMessage → grammar → SedStatement
//!                              ↓
//!      HistoryTracker → SedHandler → ChatClient::reply_to
//! ```
//!
//! The chat transport is abstracted behind [`ChatClient`]; [`CliClient`]
//! is an in-memory implementation for local use.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod cli;
pub mod grammar;
pub mod handler;
pub mod history;
pub mod message;
pub mod statement;
pub mod traits;

// Re-export commonly used types
pub use cli::CliClient;
pub use grammar::{find_command, Matcher, RawCommand, LONG_FORM, MATCHERS, SHORT_FORM};
pub use handler::{Outcome, SedHandler};
pub use history::{HistoryTracker, RecentMessages, RecentRing};
pub use message::{ChatMessage, PassiveCommand};
pub use statement::{parse, SedError, SedStatement};
pub use traits::{ChannelError, ChannelResult, ChatClient};
