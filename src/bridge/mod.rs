//! Bot-side half of the bridge: account resolution, command submission and
//! result polling against the relay.

pub mod client;
pub mod identity;

pub use client::{CommandRelay, PollSettings, RelayClient, Submission, split_args};
pub use identity::AccountLinks;
