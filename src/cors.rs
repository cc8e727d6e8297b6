use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Header, Status},
    Build, Request, Response, Rocket, Route,
};

use crate::config::StringList;

/// Origins allowed to make credentialed cross-origin requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedOrigins(StringList);

impl AllowedOrigins {
    pub fn new(origins: StringList) -> Self {
        Self(origins)
    }

    /// Is a request from `origin` allowed? A configured `*` allows every origin.
    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.0
            .iter()
            .any(|allowed| allowed == "*" || allowed.trim_end_matches('/') == origin)
    }
}

pub fn routes() -> Vec<Route> {
    routes![preflight]
}

/// Answer every preflight request. The CORS headers themselves are added by [`CorsFairing`].
#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

/// A fairing that loads the allowed origins and adds CORS headers to the
/// responses to requests from those origins.
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Ignite | Kind::Response,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let origins = match rocket.figment().extract_inner::<StringList>("allowed_origins") {
            Ok(origins) => origins,
            Err(e) if e.missing() => StringList::default(),
            Err(e) => {
                error!("Failed to load allowed origins");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Allowing cross-origin requests from {:?}", &*origins);
        Ok(rocket.manage(AllowedOrigins::new(origins)))
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        // Same-origin and non-browser requests carry no `Origin`.
        let Some(origin) = req.headers().get_one("Origin") else {
            return;
        };
        let allowed = req
            .rocket()
            .state::<AllowedOrigins>()
            .map_or(false, |origins| origins.is_allowed(origin));
        if !allowed {
            warn!("Rejected cross-origin request from {origin}");
            return;
        }

        res.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
        res.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        res.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PATCH, PUT, DELETE, OPTIONS",
        ));
        res.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));
        res.set_header(Header::new("Vary", "Origin"));
    }
}
