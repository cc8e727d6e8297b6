use log::{error, info, warn};
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client, ClientSession,
};
use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{candidate::VoteRequest, id::ApiId, required_text},
    auth::AuthToken,
    candidate::Candidate,
    election::Election,
    mongodb::{
        is_transaction_unsupported, is_transient_transaction_error, Coll, Id, TransactionSupport,
        MAX_TRANSACTION_ATTEMPTS,
    },
    voter::Voter,
};

use super::election::find_active_election;

pub fn routes() -> Vec<Route> {
    routes![vote]
}

/// The three collections a vote writes to.
struct VoteTargets<'a> {
    voters: &'a Coll<Voter>,
    elections: &'a Coll<Election>,
    candidates: &'a Coll<Candidate>,
}

/// One vote by `voter` for `candidate` in `election`.
#[derive(Debug, Copy, Clone)]
struct Vote {
    voter: Id,
    election: Id,
    candidate: Id,
}

impl Vote {
    /// Matches the voter only if they have not voted in this election yet.
    fn voter_filter(&self) -> Document {
        doc! {
            "_id": self.voter,
            "votedElections": { "$ne": self.election },
        }
    }

    fn voter_update(&self) -> Document {
        doc! {
            "$push": { "votedElections": self.election },
            "$currentDate": { "updatedAt": true },
        }
    }

    fn election_update(&self) -> Document {
        doc! {
            "$push": { "voters": self.voter },
            "$currentDate": { "updatedAt": true },
        }
    }

    fn candidate_filter(&self) -> Document {
        doc! {
            "_id": self.candidate,
            "election": self.election,
        }
    }

    fn candidate_update() -> Document {
        doc! {
            "$inc": { "voteCount": 1 },
            "$currentDate": { "updatedAt": true },
        }
    }
}

fn already_voted() -> Error {
    Error::forbidden("You have already voted in this election")
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

#[patch("/candidates/<candidate_id>", data = "<request>", format = "json")]
async fn vote(
    token: AuthToken,
    candidate_id: Id,
    request: Json<VoteRequest>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    db_client: &State<Client>,
    transactions: &State<TransactionSupport>,
) -> Result<Json<Vec<ApiId>>> {
    let election_id: Id = required_text(request.0.selected_election)
        .ok_or_else(|| Error::unprocessable("Select an election."))?
        .parse()?;

    let voter = voters
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Voter"))?;
    if voter.has_voted_in(election_id) {
        return Err(already_voted());
    }
    find_active_election(&elections, election_id).await?;
    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;
    if candidate.election != election_id {
        return Err(Error::bad_request(
            "Candidate does not belong to this election",
        ));
    }

    let vote = Vote {
        voter: voter.id,
        election: election_id,
        candidate: candidate_id,
    };
    let targets = VoteTargets {
        voters: &voters,
        elections: &elections,
        candidates: &candidates,
    };
    let voter = record_vote(vote, &targets, db_client, **transactions).await?;
    info!("Voter {} voted in election {election_id}", voter.id);

    Ok(Json(
        voter
            .voted_elections
            .iter()
            .copied()
            .map(ApiId::from)
            .collect(),
    ))
}

/// Record a vote, inside a transaction where the deployment allows one.
/// Returns the updated voter.
async fn record_vote(
    vote: Vote,
    targets: &VoteTargets<'_>,
    db_client: &Client,
    transactions: TransactionSupport,
) -> Result<Voter> {
    if transactions.is_supported() {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            match record_vote_in_transaction(vote, targets, db_client).await {
                Err(Error::Db(e)) if is_transaction_unsupported(&e) => {
                    warn!("Transactions unavailable, recording vote without one: {e}");
                    break;
                }
                Err(Error::Db(e))
                    if is_transient_transaction_error(&e) && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    warn!("Retrying vote after transient error: {e}");
                }
                result => return result,
            }
        }
    }
    record_vote_sequentially(vote, targets).await
}

async fn abort(mut session: ClientSession, err: Error) -> Result<Voter> {
    session.abort_transaction().await?;
    Err(err)
}

async fn record_vote_in_transaction(
    vote: Vote,
    targets: &VoteTargets<'_>,
    db_client: &Client,
) -> Result<Voter> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let voter = targets
        .voters
        .find_one_and_update_with_session(
            vote.voter_filter(),
            vote.voter_update(),
            return_updated(),
            &mut session,
        )
        .await?;
    let voter = match voter {
        Some(voter) => voter,
        None => return abort(session, already_voted()).await,
    };

    let result = targets
        .elections
        .update_one_with_session(
            Election::active_filter(vote.election),
            vote.election_update(),
            None,
            &mut session,
        )
        .await?;
    if result.matched_count == 0 {
        return abort(session, Error::not_found("Election")).await;
    }

    let result = targets
        .candidates
        .update_one_with_session(
            vote.candidate_filter(),
            Vote::candidate_update(),
            None,
            &mut session,
        )
        .await?;
    if result.matched_count == 0 {
        return abort(session, Error::not_found("Candidate")).await;
    }

    session.commit_transaction().await?;
    Ok(voter)
}

/// Record a vote one write at a time, in the order voter, election, candidate.
///
/// The voter write doubles as the duplicate-vote lock. If a later write fails
/// or finds its target gone, the earlier writes are undone. The vote count
/// itself is written last and never undone.
async fn record_vote_sequentially(vote: Vote, targets: &VoteTargets<'_>) -> Result<Voter> {
    let voter = targets
        .voters
        .find_one_and_update(vote.voter_filter(), vote.voter_update(), return_updated())
        .await?
        .ok_or_else(already_voted)?;

    if let Err(err) = count_vote(vote, targets).await {
        undo_voter(vote, targets).await;
        return Err(err);
    }
    Ok(voter)
}

/// The election and candidate writes of a sequential vote. The election
/// write is undone if the candidate write does not go through.
async fn count_vote(vote: Vote, targets: &VoteTargets<'_>) -> Result<()> {
    let result = targets
        .elections
        .update_one(
            Election::active_filter(vote.election),
            vote.election_update(),
            None,
        )
        .await?;
    if result.matched_count == 0 {
        warn!(
            "Election {} vanished during vote by {}, undoing",
            vote.election, vote.voter
        );
        return Err(Error::not_found("Election"));
    }

    let counted = targets
        .candidates
        .update_one(vote.candidate_filter(), Vote::candidate_update(), None)
        .await;
    let err = match counted {
        Ok(result) if result.matched_count > 0 => return Ok(()),
        Ok(_) => {
            warn!(
                "Candidate {} vanished during vote by {}, undoing",
                vote.candidate, vote.voter
            );
            Error::not_found("Candidate")
        }
        Err(e) => e.into(),
    };
    undo_election(vote, targets).await;
    Err(err)
}

async fn undo_voter(vote: Vote, targets: &VoteTargets<'_>) {
    let pull = doc! { "$pull": { "votedElections": vote.election } };
    if let Err(e) = targets
        .voters
        .update_one(vote.voter.as_doc(), pull, None)
        .await
    {
        error!(
            "Could not undo vote of {} in election {}: {e}",
            vote.voter, vote.election
        );
    }
}

async fn undo_election(vote: Vote, targets: &VoteTargets<'_>) {
    let pull = doc! { "$pull": { "voters": vote.voter } };
    if let Err(e) = targets
        .elections
        .update_one(vote.election.as_doc(), pull, None)
        .await
    {
        error!(
            "Could not remove voter {} from election {}: {e}",
            vote.voter, vote.election
        );
    }
}
