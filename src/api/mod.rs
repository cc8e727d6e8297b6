use rocket::{Catcher, Route};

mod candidate;
mod catchers;
mod common;
mod election;
mod vote;
mod voter;

/// Every API route, to be mounted under `/api`.
pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(election::routes());
    routes.extend(candidate::routes());
    routes.extend(vote::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers::catchers()
}
