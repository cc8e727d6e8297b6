pub use candidate_core::CandidateCore;
pub use db::Candidate;

mod candidate_core;
mod db;

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;
