//! Documents stored in the database and the types exchanged over the API.

pub mod api;
pub mod auth;
pub mod candidate;
pub mod election;
pub mod mongodb;
pub mod voter;
