use rocket::Request;

/// The reason a request guard failed, remembered in the request-local cache
/// so that the error catchers can report it to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardFailure(Option<String>);

impl GuardFailure {
    /// Record the failure reason for this request. Only the first reason sticks.
    pub fn record(req: &Request<'_>, message: impl Into<String>) {
        let message = message.into();
        req.local_cache(|| GuardFailure(Some(message)));
    }

    /// The recorded failure reason, if any.
    pub fn of<'r>(req: &'r Request<'_>) -> Option<&'r str> {
        req.local_cache(GuardFailure::default).0.as_deref()
    }
}
