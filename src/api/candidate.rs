use log::{error, info, warn};
use mongodb::{bson::doc, Client};
use rocket::{form::Form, http::Status, response::status::Custom, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::media::{Folder, Media};
use crate::model::{
    api::{
        candidate::{CandidateCreated, CandidateDescription, CandidateForm},
        image::ImageUpload,
        required_text,
    },
    candidate::{Candidate, NewCandidate},
    election::Election,
    mongodb::{
        is_transaction_unsupported, is_transient_transaction_error, Coll, Id, TransactionSupport,
        MAX_TRANSACTION_ATTEMPTS,
    },
    voter::Voter,
};

use super::common::inserted_id;
use super::election::find_active_election;

pub fn routes() -> Vec<Route> {
    routes![create_candidate, get_candidate, delete_candidate]
}

#[post("/candidates", data = "<form>")]
async fn create_candidate(
    voter: Voter,
    form: Form<CandidateForm<'_>>,
    new_candidates: Coll<NewCandidate>,
    elections: Coll<Election>,
    media: &State<Media>,
    db_client: &State<Client>,
    transactions: &State<TransactionSupport>,
) -> Result<Custom<Json<CandidateCreated>>> {
    voter.require_admin()?;
    let form = form.into_inner();
    let (full_name, motto, election_id) = match (
        required_text(form.full_name),
        required_text(form.motto),
        required_text(form.current_election),
    ) {
        (Some(full_name), Some(motto), Some(election_id)) => (full_name, motto, election_id),
        _ => return Err(Error::unprocessable("Fill in all fields.")),
    };
    let election_id: Id = election_id.parse()?;
    let image = ImageUpload::from_form_file(form.image, "Choose an image.").await?;

    // Nothing is uploaded for an election that does not exist.
    find_active_election(&elections, election_id).await?;

    let stored = media.upload(&image, Folder::Candidates).await?;
    let candidate = NewCandidate::new(full_name, motto, stored, election_id);
    let id = match add_candidate(
        &candidate,
        db_client,
        **transactions,
        &new_candidates,
        &elections,
    )
    .await
    {
        Ok(id) => id,
        Err(e) => {
            media.destroy_quietly(&candidate.image_id).await;
            return Err(e);
        }
    };
    info!("Voter {} added candidate {id} to election {election_id}", voter.id);

    let candidate = Candidate { id, candidate };
    Ok(Custom(
        Status::Created,
        Json(CandidateCreated {
            message: "Candidate added successfully".to_string(),
            candidate: candidate.into(),
        }),
    ))
}

/// Insert the candidate and append it to its election's candidate list,
/// inside a transaction where the deployment allows one.
async fn add_candidate(
    candidate: &NewCandidate,
    db_client: &Client,
    transactions: TransactionSupport,
    new_candidates: &Coll<NewCandidate>,
    elections: &Coll<Election>,
) -> Result<Id> {
    if transactions.is_supported() {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            match add_candidate_in_transaction(candidate, db_client, new_candidates, elections)
                .await
            {
                Err(Error::Db(e)) if is_transaction_unsupported(&e) => {
                    warn!("Transactions unavailable, adding candidate without one: {e}");
                    break;
                }
                Err(Error::Db(e))
                    if is_transient_transaction_error(&e) && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    warn!("Retrying candidate insertion after transient error: {e}");
                }
                result => return result,
            }
        }
    }
    add_candidate_sequentially(candidate, new_candidates, elections).await
}

async fn add_candidate_in_transaction(
    candidate: &NewCandidate,
    db_client: &Client,
    new_candidates: &Coll<NewCandidate>,
    elections: &Coll<Election>,
) -> Result<Id> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let result = new_candidates
        .insert_one_with_session(candidate, None, &mut session)
        .await?;
    let id = inserted_id(&result)?;

    let result = elections
        .update_one_with_session(
            Election::active_filter(candidate.election),
            doc! {
                "$push": { "candidates": id },
                "$currentDate": { "updatedAt": true },
            },
            None,
            &mut session,
        )
        .await?;
    if result.matched_count == 0 {
        session.abort_transaction().await?;
        return Err(Error::not_found("Election"));
    }

    session.commit_transaction().await?;
    Ok(id)
}

/// The same writes without a transaction. If the election disappears in
/// between, the orphaned candidate is removed again.
async fn add_candidate_sequentially(
    candidate: &NewCandidate,
    new_candidates: &Coll<NewCandidate>,
    elections: &Coll<Election>,
) -> Result<Id> {
    let result = new_candidates.insert_one(candidate, None).await?;
    let id = inserted_id(&result)?;

    let update = doc! {
        "$push": { "candidates": id },
        "$currentDate": { "updatedAt": true },
    };
    let linked = elections
        .update_one(Election::active_filter(candidate.election), update, None)
        .await;
    let err = match linked {
        Ok(result) if result.matched_count > 0 => return Ok(id),
        Ok(_) => {
            warn!(
                "Election {} vanished while adding candidate {id}, removing it",
                candidate.election
            );
            Error::not_found("Election")
        }
        Err(e) => e.into(),
    };
    if let Err(e) = new_candidates.delete_one(id.as_doc(), None).await {
        error!("Could not remove orphaned candidate {id}: {e}");
    }
    Err(err)
}

#[get("/candidates/<candidate_id>")]
async fn get_candidate(
    _voter: Voter,
    candidate_id: Id,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;
    Ok(Json(candidate.into()))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    voter: Voter,
    candidate_id: Id,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
    media: &State<Media>,
) -> Result<Json<&'static str>> {
    voter.require_admin()?;
    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;

    elections
        .update_one(
            candidate.election.as_doc(),
            doc! {
                "$pull": { "candidates": candidate_id },
                "$currentDate": { "updatedAt": true },
            },
            None,
        )
        .await?;
    media.destroy_quietly(&candidate.image_id).await;
    candidates.delete_one(candidate_id.as_doc(), None).await?;

    info!(
        "Voter {} deleted candidate {candidate_id} from election {}",
        voter.id, candidate.election
    );
    Ok(Json("Candidate deleted successfully."))
}
