use log::info;
use mongodb::{bson::doc, options::FindOptions};
use rocket::{
    form::Form, futures::TryStreamExt, http::Status, response::status::Custom, serde::json::Json,
    Route, State,
};

use crate::error::{Error, Result};
use crate::media::{Folder, Media};
use crate::model::{
    api::{
        candidate::CandidateDescription,
        election::{ElectionDescription, ElectionForm, Message},
        image::ImageUpload,
        required_text,
        voter::VoterDescription,
    },
    candidate::Candidate,
    election::{Election, NewElection},
    mongodb::{Coll, Id},
    voter::Voter,
};

use super::common::inserted_id;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        get_elections,
        get_election,
        update_election,
        delete_election,
        election_candidates,
        election_voters,
    ]
}

/// Title and description, trimmed, or 422 if either is blank.
fn election_text(title: Option<String>, description: Option<String>) -> Result<(String, String)> {
    match (required_text(title), required_text(description)) {
        (Some(title), Some(description)) => Ok((title, description)),
        _ => Err(Error::unprocessable("Fill in all fields.")),
    }
}

/// Get an election unless it is missing or soft-deleted.
pub(crate) async fn find_active_election(elections: &Coll<Election>, id: Id) -> Result<Election> {
    elections
        .find_one(Election::active_filter(id), None)
        .await?
        .ok_or_else(|| Error::not_found("Election"))
}

#[post("/elections", data = "<form>")]
async fn create_election(
    voter: Voter,
    form: Form<ElectionForm<'_>>,
    new_elections: Coll<NewElection>,
    media: &State<Media>,
) -> Result<Custom<Json<ElectionDescription>>> {
    voter.require_admin()?;
    let form = form.into_inner();
    let (title, description) = election_text(form.title, form.description)?;
    let image = ImageUpload::from_form_file(form.club, "Choose a club image.").await?;

    let stored = media.upload(&image, Folder::Elections).await?;
    let election = NewElection::new(title, description, stored);
    let id = match new_elections.insert_one(&election, None).await {
        Ok(result) => inserted_id(&result)?,
        Err(e) => {
            media.destroy_quietly(&election.image_id).await;
            return Err(e.into());
        }
    };
    info!("Voter {} created election {id}", voter.id);

    let election = Election { id, election };
    Ok(Custom(Status::Created, Json(election.into())))
}

#[get("/elections")]
async fn get_elections(
    _voter: Voter,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let newest_first = FindOptions::builder()
        .sort(doc! { "createdAt": -1, "_id": -1 })
        .build();
    let elections: Vec<_> = elections
        .find(Election::all_active_filter(), newest_first)
        .await?
        .map_ok(ElectionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(elections))
}

#[get("/elections/<election_id>")]
async fn get_election(
    _voter: Voter,
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = find_active_election(&elections, election_id).await?;
    Ok(Json(election.into()))
}

#[patch("/elections/<election_id>", data = "<form>")]
async fn update_election(
    voter: Voter,
    election_id: Id,
    form: Form<ElectionForm<'_>>,
    elections: Coll<Election>,
    media: &State<Media>,
) -> Result<Json<Message>> {
    voter.require_admin()?;
    let form = form.into_inner();
    let (title, description) = election_text(form.title, form.description)?;
    let old = find_active_election(&elections, election_id).await?;

    // A replacement image is optional, but must be valid if given.
    let replacement = match form.club.filter(|file| file.len() > 0) {
        Some(file) => {
            let image = ImageUpload::from_form_file(Some(file), "Choose a club image.").await?;
            Some(media.upload(&image, Folder::Elections).await?)
        }
        None => None,
    };

    let mut set = doc! {
        "title": title,
        "description": description,
    };
    if let Some(ref image) = replacement {
        set.insert("club", image.url.clone());
        set.insert("imageId", image.id.clone());
    }
    let update = doc! {
        "$set": set,
        "$currentDate": { "updatedAt": true },
    };

    let result = elections
        .update_one(Election::active_filter(election_id), update, None)
        .await;
    let matched = match result {
        Ok(result) => result.matched_count,
        Err(e) => {
            if let Some(ref image) = replacement {
                media.destroy_quietly(&image.id).await;
            }
            return Err(e.into());
        }
    };
    if matched == 0 {
        // Deleted while the new image was uploading.
        if let Some(ref image) = replacement {
            media.destroy_quietly(&image.id).await;
        }
        return Err(Error::not_found("Election"));
    }

    if replacement.is_some() {
        media.destroy_quietly(&old.image_id).await;
    }
    info!("Voter {} updated election {election_id}", voter.id);
    Ok(Json(Message::new("Election updated successfully")))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    voter: Voter,
    election_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    media: &State<Media>,
) -> Result<Json<&'static str>> {
    voter.require_admin()?;

    // Hide the election first, so candidates can no longer be added to it.
    let update = doc! {
        "$set": { "isDeleted": true, "candidates": [] },
        "$currentDate": { "updatedAt": true },
    };
    let result = elections
        .update_one(Election::active_filter(election_id), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found("Election"));
    }

    // Then remove every candidate that still points at it, with their images.
    let in_election = doc! { "election": election_id };
    let doomed: Vec<Candidate> = candidates
        .find(in_election.clone(), None)
        .await?
        .try_collect()
        .await?;
    for candidate in &doomed {
        media.destroy_quietly(&candidate.image_id).await;
    }
    candidates.delete_many(in_election, None).await?;

    info!(
        "Voter {} deleted election {election_id} and {} candidates",
        voter.id,
        doomed.len()
    );
    Ok(Json("Election deleted successfully."))
}

#[get("/elections/<election_id>/candidates")]
async fn election_candidates(
    _voter: Voter,
    election_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    find_active_election(&elections, election_id).await?;

    let oldest_first = FindOptions::builder()
        .sort(doc! { "createdAt": 1, "_id": 1 })
        .build();
    let candidates: Vec<_> = candidates
        .find(doc! { "election": election_id }, oldest_first)
        .await?
        .map_ok(CandidateDescription::from)
        .try_collect()
        .await?;
    Ok(Json(candidates))
}

#[get("/elections/<election_id>/voters")]
async fn election_voters(
    _voter: Voter,
    election_id: Id,
    elections: Coll<Election>,
    voters: Coll<Voter>,
) -> Result<Json<Vec<VoterDescription>>> {
    let election = find_active_election(&elections, election_id).await?;

    let filter = doc! { "_id": { "$in": election.voters.clone() } };
    let voters: Vec<_> = voters
        .find(filter, None)
        .await?
        .map_ok(VoterDescription::from)
        .try_collect()
        .await?;
    Ok(Json(voters))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
    };

    use super::*;
    use crate::api::common::test_support::{
        create_candidate, create_election, error_message, json_body, login_as, png, Multipart,
    };
    use crate::media::StoredImage;
    use crate::model::{api::voter::Registration, candidate::NewCandidate};

    #[backend_test(admin)]
    async fn create_and_get_election(client: Client) {
        let election = create_election(&client, "Chess club president").await;
        assert_eq!(election.title, "Chess club president");
        assert!(election.club.starts_with("memory://"));
        assert!(election.candidates.is_empty());

        let response = client
            .get(uri!("/api", get_election(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let fetched: ElectionDescription = json_body(response).await;
        assert_eq!(fetched, election);
    }

    #[backend_test(admin)]
    async fn list_newest_first(client: Client) {
        let first = create_election(&client, "First").await;
        let second = create_election(&client, "Second").await;

        let response = client.get(uri!("/api", get_elections)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let listed: Vec<ElectionDescription> = json_body(response).await;
        let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[backend_test(admin)]
    async fn create_election_validation(client: Client, elections: Coll<Election>) {
        // Blank title.
        let body = Multipart::new()
            .text("title", "   ")
            .text("description", "Something")
            .file("club", "image/png", &png())
            .finish();
        let response = client
            .post(uri!("/api", create_election))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(error_message(response).await, "Fill in all fields.");

        // No image.
        let body = Multipart::new()
            .text("title", "Title")
            .text("description", "Something")
            .finish();
        let response = client
            .post(uri!("/api", create_election))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(error_message(response).await, "Choose a club image.");

        // Wrong image type.
        let body = Multipart::new()
            .text("title", "Title")
            .text("description", "Something")
            .file("club", "image/gif", &png())
            .finish();
        let response = client
            .post(uri!("/api", create_election))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(
            error_message(response).await,
            "Only JPG, PNG or WEBP images allowed"
        );

        assert_eq!(elections.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(voter)]
    async fn non_admin_cannot_create(client: Client, elections: Coll<Election>) {
        let body = Multipart::new()
            .text("title", "Title")
            .text("description", "Something")
            .file("club", "image/png", &png())
            .finish();
        let response = client
            .post(uri!("/api", create_election))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert_eq!(
            error_message(response).await,
            "Only an admin can perform this action."
        );
        assert_eq!(elections.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn anonymous_requests_are_rejected(client: Client) {
        let response = client.get(uri!("/api", get_elections)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(error_message(response).await, "Unauthorized. No token");
    }

    #[backend_test(admin)]
    async fn update_election_replaces_image(client: Client, elections: Coll<Election>) {
        let created = create_election(&client, "Old title").await;
        let old_image = elections
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap()
            .image_id
            .clone();

        let body = Multipart::new()
            .text("title", "New title")
            .text("description", "New description")
            .file("club", "image/webp", &png())
            .finish();
        let response = client
            .patch(uri!("/api", update_election(*created.id)))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let message: Message = json_body(response).await;
        assert_eq!(message.message, "Election updated successfully");

        let updated = elections
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.description, "New description");
        assert_ne!(updated.image_id, old_image);

        let images = client
            .rocket()
            .state::<std::sync::Arc<crate::media::MemoryMediaHost>>()
            .unwrap();
        assert!(!images.contains(&old_image));
        assert!(images.contains(&updated.image_id));
    }

    #[backend_test(admin)]
    async fn update_without_image_keeps_it(client: Client, elections: Coll<Election>) {
        let created = create_election(&client, "Title").await;
        let body = Multipart::new()
            .text("title", "Renamed")
            .text("description", "Same")
            .finish();
        let response = client
            .patch(uri!("/api", update_election(*created.id)))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let updated = elections
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.club, created.club);
    }

    #[backend_test(admin)]
    async fn update_missing_election(client: Client) {
        let body = Multipart::new()
            .text("title", "Renamed")
            .text("description", "Same")
            .finish();
        let response = client
            .patch(uri!("/api", update_election(Id::new())))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(error_message(response).await, "Election not found");
    }

    #[backend_test(admin)]
    async fn delete_election_is_soft_and_cascades(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        let election = create_election(&client, "Doomed").await;
        create_candidate(&client, &election, "Alice").await;
        create_candidate(&client, &election, "Bob").await;
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 2);

        let response = client
            .delete(uri!("/api", delete_election(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let message: String = json_body(response).await;
        assert_eq!(message, "Election deleted successfully.");

        // Candidates are gone.
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);
        let images = client
            .rocket()
            .state::<std::sync::Arc<crate::media::MemoryMediaHost>>()
            .unwrap();
        assert_eq!(images.len(), 1); // Only the club image remains.

        // The election is hidden but kept.
        let response = client
            .get(uri!("/api", get_election(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
        let response = client.get(uri!("/api", get_elections)).dispatch().await;
        let listed: Vec<ElectionDescription> = json_body(response).await;
        assert!(listed.is_empty());
        let stored = elections
            .find_one(election.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_deleted);

        // Deleting again is a 404.
        let response = client
            .delete(uri!("/api", delete_election(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[backend_test(admin)]
    async fn non_admin_cannot_modify(client: Client, db: Database) {
        let election = create_election(&client, "Protected").await;
        login_as(&client, Registration::example()).await;

        let response = client
            .delete(uri!("/api", delete_election(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let body = Multipart::new()
            .text("title", "Hijacked")
            .text("description", "Hijacked")
            .finish();
        let response = client
            .patch(uri!("/api", update_election(*election.id)))
            .header(Multipart::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let stored = Coll::<Election>::from_db(&db)
            .find_one(election.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Protected");
        assert!(!stored.is_deleted);
    }

    #[backend_test(admin)]
    async fn list_candidates_and_voters(client: Client) {
        let election = create_election(&client, "Listed").await;
        let alice = create_candidate(&client, &election, "Alice").await;
        let bob = create_candidate(&client, &election, "Bob").await;

        let response = client
            .get(uri!("/api", election_candidates(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let listed: Vec<CandidateDescription> = json_body(response).await;
        assert_eq!(listed, vec![alice.clone(), bob]);

        let response = client
            .patch(uri!("/api", crate::api::vote::vote(*alice.id)))
            .header(ContentType::JSON)
            .body(format!(r#"{{"selectedElection": "{}"}}"#, election.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .get(uri!("/api", election_voters(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let voters: Vec<VoterDescription> = json_body(response).await;
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].email, "admin@example.com");
        assert_eq!(voters[0].voted_elections, vec![election.id]);

        let response = client
            .get(uri!("/api", election_candidates(Id::new())))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[backend_test(admin)]
    async fn update_with_invalid_image_keeps_election(client: Client, elections: Coll<Election>) {
        let created = create_election(&client, "Title").await;
        let images = client
            .rocket()
            .state::<std::sync::Arc<crate::media::MemoryMediaHost>>()
            .unwrap();

        let oversized = vec![0; 1_000_001];
        let cases = [
            ("image/gif", png(), "Only JPG, PNG or WEBP images allowed"),
            ("image/png", oversized, "Image size must be less than 1MB"),
        ];
        for (content_type, bytes, expected) in cases {
            let body = Multipart::new()
                .text("title", "Renamed")
                .text("description", "Changed")
                .file("club", content_type, &bytes)
                .finish();
            let response = client
                .patch(uri!("/api", update_election(*created.id)))
                .header(Multipart::content_type())
                .body(body)
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::UnprocessableEntity);
            assert_eq!(error_message(response).await, expected);
        }

        let stored = elections
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Title");
        assert_eq!(stored.club, created.club);
        assert!(images.contains(&stored.image_id));
        assert_eq!(images.len(), 1);
    }

    #[backend_test(admin)]
    async fn delete_removes_unlisted_candidates(
        client: Client,
        db: Database,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        let election = create_election(&client, "Raced").await;
        create_candidate(&client, &election, "Alice").await;

        // A candidate whose election link was never written.
        let straggler = NewCandidate::new(
            "Bob".to_string(),
            "Late".to_string(),
            StoredImage {
                url: "memory://bob".to_string(),
                id: "bob".to_string(),
            },
            *election.id,
        );
        Coll::<NewCandidate>::from_db(&db)
            .insert_one(straggler, None)
            .await
            .unwrap();
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 2);

        let response = client
            .delete(uri!("/api", delete_election(*election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);

        let stored = elections
            .find_one(election.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_deleted);
        assert!(stored.candidates.is_empty());
    }
}
