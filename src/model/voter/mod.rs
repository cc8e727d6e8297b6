pub use db::Voter;
pub use voter_core::VoterCore;

mod db;
mod voter_core;

/// A voter without an ID.
pub type NewVoter = VoterCore;
