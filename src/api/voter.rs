use log::info;
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    response::status::Custom,
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        election::Message,
        voter::{Credentials, LoginResponse, Registration, VoterDescription},
    },
    auth::{AuthToken, AUTH_TOKEN_COOKIE},
    mongodb::{is_duplicate_key_error, Coll, Id},
    voter::{NewVoter, Voter},
};

use super::common::inserted_id;

pub fn routes() -> Vec<Route> {
    routes![register, login, logout, get_voter]
}

#[post("/voters/register", data = "<registration>", format = "json")]
async fn register(
    registration: Json<Registration>,
    new_voters: Coll<NewVoter>,
    config: &State<Config>,
) -> Result<Custom<Json<VoterDescription>>> {
    let voter = registration.0.into_voter(config)?;

    // The unique index on `email` settles concurrent registrations.
    let id = match new_voters.insert_one(&voter, None).await {
        Ok(result) => inserted_id(&result)?,
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::unprocessable("Email already exists."));
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        "Registered voter {id}{}",
        if voter.is_admin { " as admin" } else { "" }
    );

    let voter = Voter { id, voter };
    Ok(Custom(Status::Created, Json(voter.into())))
}

#[post("/voters/login", data = "<credentials>", format = "json")]
async fn login(
    credentials: Json<Credentials>,
    voters: Coll<Voter>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    let (email, password) = credentials.0.validate()?;
    let invalid = || Error::unauthorized("Invalid credentials.");

    let voter = voters
        .find_one(doc! { "email": &email }, None)
        .await?
        .ok_or_else(invalid)?;
    if !voter.verify_password(password)? {
        return Err(invalid());
    }

    let jwt = AuthToken::new(&voter).encode(config)?;
    cookies.add(AuthToken::cookie(jwt.clone(), config));
    info!("Voter {} logged in", voter.id);

    Ok(Json(LoginResponse {
        token: jwt,
        id: voter.id.into(),
        is_admin: voter.is_admin,
    }))
}

#[post("/voters/logout")]
fn logout(cookies: &CookieJar<'_>) -> Json<Message> {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Json(Message::new("Logged out successfully."))
}

#[get("/voters/<voter_id>")]
async fn get_voter(
    _voter: Voter,
    voter_id: Id,
    voters: Coll<Voter>,
) -> Result<Json<VoterDescription>> {
    let voter = voters
        .find_one(voter_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Voter"))?;
    Ok(Json(voter.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{uri::Origin, ContentType, Header},
        local::asynchronous::Client,
        serde::json::json,
    };

    use super::*;
    use crate::api::common::test_support::{error_message, json_body, login_as, png, Multipart};

    async fn post_json<'c>(
        client: &'c Client,
        uri: Origin<'static>,
        body: rocket::serde::json::Value,
    ) -> rocket::local::asynchronous::LocalResponse<'c> {
        client
            .post(uri)
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    #[backend_test]
    async fn register_and_login(client: Client, voters: Coll<Voter>) {
        let response = post_json(&client, uri!("/api", register), json!(Registration::example())).await;
        assert_eq!(response.status(), Status::Created);
        let registered: VoterDescription = json_body(response).await;
        assert_eq!(registered.email, "grace@example.com");
        assert!(!registered.is_admin);

        let stored = voters
            .find_one(registered.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, "compiler");

        let response = post_json(
            &client,
            uri!("/api", login),
            json!({ "email": "GRACE@example.com", "password": "compiler" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(response.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let login: LoginResponse = json_body(response).await;
        assert_eq!(login.id, registered.id);
        assert!(!login.is_admin);

        // The cookie now authenticates the client.
        let response = client
            .get(uri!("/api", get_voter(*registered.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let fetched: VoterDescription = json_body(response).await;
        assert_eq!(fetched, registered);
    }

    #[backend_test]
    async fn bearer_token_authenticates(client: Client) {
        post_json(&client, uri!("/api", register), json!(Registration::example())).await;
        let response = post_json(
            &client,
            uri!("/api", login),
            json!({ "email": "grace@example.com", "password": "compiler" }),
        )
        .await;
        let login: LoginResponse = json_body(response).await;

        // Drop the cookie, keep the token.
        client.post(uri!("/api", logout)).dispatch().await;
        let response = client.get(uri!("/api", crate::api::election::get_elections)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .get(uri!("/api", crate::api::election::get_elections))
            .header(Header::new("Authorization", format!("Bearer {}", login.token)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .get(uri!("/api", crate::api::election::get_elections))
            .header(Header::new("Authorization", "Bearer not.a.jwt"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_message(response).await, "Unauthorized. Invalid token");
    }

    #[backend_test]
    async fn duplicate_email(client: Client, voters: Coll<Voter>) {
        let response = post_json(&client, uri!("/api", register), json!(Registration::example())).await;
        assert_eq!(response.status(), Status::Created);

        let mut again = Registration::example();
        again.email = Some("GRACE@EXAMPLE.COM".to_string());
        let response = post_json(&client, uri!("/api", register), json!(again)).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(error_message(response).await, "Email already exists.");

        assert_eq!(voters.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test]
    async fn register_validation(client: Client) {
        let response = post_json(
            &client,
            uri!("/api", register),
            json!({ "fullName": "Grace", "email": "grace@example.com" }),
        )
        .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(error_message(response).await, "Fill in all fields.");

        let mut mismatch = Registration::example();
        mismatch.password2 = Some("something else".to_string());
        let response = post_json(&client, uri!("/api", register), json!(mismatch)).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(error_message(response).await, "Passwords do not match.");
    }

    #[backend_test]
    async fn bad_login(client: Client) {
        post_json(&client, uri!("/api", register), json!(Registration::example())).await;

        let response = post_json(
            &client,
            uri!("/api", login),
            json!({ "email": "grace@example.com", "password": "wrong password" }),
        )
        .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_message(response).await, "Invalid credentials.");
        assert!(response_has_no_cookie(&client));

        let response = post_json(
            &client,
            uri!("/api", login),
            json!({ "email": "nobody@example.com", "password": "compiler" }),
        )
        .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = post_json(&client, uri!("/api", login), json!({ "email": "" })).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    fn response_has_no_cookie(client: &Client) -> bool {
        client.cookies().get(AUTH_TOKEN_COOKIE).is_none()
    }

    #[backend_test(admin)]
    async fn admin_emails_register_admins(client: Client) {
        let response = client.get(uri!("/api", crate::api::election::get_elections)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let voter = login_as(&client, Registration::example()).await;
        assert!(!voter.is_admin);
    }

    #[backend_test(voter)]
    async fn logout_forgets_the_voter(client: Client) {
        let response = client.get(uri!("/api", crate::api::election::get_elections)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.post(uri!("/api", logout)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.get(uri!("/api", crate::api::election::get_elections)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test(voter)]
    async fn unknown_voter(client: Client) {
        let response = client
            .get(uri!("/api", get_voter(Id::new())))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(error_message(response).await, "Voter not found");
    }

    #[backend_test(admin)]
    async fn demoted_admin_loses_rights(client: Client, voters: Coll<Voter>) {
        voters
            .update_one(
                doc! { "email": "admin@example.com" },
                doc! { "$set": { "isAdmin": false } },
                None,
            )
            .await
            .unwrap();

        // The token still claims admin rights, but the stored voter decides.
        let body = Multipart::new()
            .text("title", "Title")
            .text("description", "Something")
            .file("club", "image/png", &png())
            .finish();
        let response = client
            .post(uri!("/api", crate::api::election::create_election))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
