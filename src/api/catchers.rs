use rocket::{http::Status, response::status, serde::json::Json, Catcher, Request};

use crate::error::ErrorBody;
use crate::model::auth::GuardFailure;

pub fn catchers() -> Vec<Catcher> {
    catchers![not_found, unauthorized, default]
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody::new(format!("Not Found - {}", req.uri())))
}

#[catch(401)]
fn unauthorized(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody::new(
        GuardFailure::of(req).unwrap_or("Unauthorized."),
    ))
}

/// Failures Rocket produces before a handler runs, such as unparsable
/// bodies or oversized uploads.
#[catch(default)]
fn default(status: Status, req: &Request<'_>) -> status::Custom<Json<ErrorBody>> {
    let message = match GuardFailure::of(req) {
        Some(reason) => reason.to_string(),
        None => match status.code {
            400 => "Malformed request.".to_string(),
            413 => "Request is too large.".to_string(),
            422 => "Invalid request data.".to_string(),
            code if code >= 500 => "An unknown error occurred.".to_string(),
            _ => status.reason().unwrap_or("Request failed.").to_string(),
        },
    };
    status::Custom(status, Json(ErrorBody::new(message)))
}
