use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{id::ApiId, required_text},
    voter::{NewVoter, Voter},
};

/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// A request to register a new voter account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password2: Option<String>,
}

impl Registration {
    /// Validate the registration and hash the password, producing a voter ready for insertion.
    ///
    /// E-mail uniqueness is left to the database index.
    pub fn into_voter(self, config: &Config) -> Result<NewVoter> {
        let (full_name, email) = match (required_text(self.full_name), required_text(self.email)) {
            (Some(full_name), Some(email)) => (full_name, email.to_lowercase()),
            _ => return Err(Error::unprocessable("Fill in all fields.")),
        };
        // Passwords are not trimmed; spaces are valid password characters.
        let (password, password2) = match (self.password, self.password2) {
            (Some(p), Some(p2)) if !p.is_empty() && !p2.is_empty() => (p, p2),
            _ => return Err(Error::unprocessable("Fill in all fields.")),
        };
        if !email.contains('@') {
            return Err(Error::unprocessable("Enter a valid email address."));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::unprocessable(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters."
            )));
        }
        if password != password2 {
            return Err(Error::unprocessable("Passwords do not match."));
        }

        let is_admin = config.is_admin_email(&email);
        Ok(NewVoter::new(full_name, email, &password, is_admin)?)
    }
}

/// Login credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// The lower-cased e-mail and the password, or 422 if either is blank.
    pub fn validate(self) -> Result<(String, String)> {
        match (required_text(self.email), self.password) {
            (Some(email), Some(password)) if !password.is_empty() => {
                Ok((email.to_lowercase(), password))
            }
            _ => Err(Error::unprocessable("Fill in all fields.")),
        }
    }
}

/// Response to a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub id: ApiId,
    pub is_admin: bool,
}

/// The public view of a voter. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    pub id: ApiId,
    pub full_name: String,
    pub email: String,
    pub voted_elections: Vec<ApiId>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        let core = voter.voter;
        Self {
            id: voter.id.into(),
            full_name: core.full_name,
            email: core.email,
            voted_elections: core.voted_elections.into_iter().map(ApiId::from).collect(),
            is_admin: core.is_admin,
            created_at: core.created_at,
        }
    }
}


#[cfg(test)]
mod tests {
    use rocket::{http::Status, serde::json::serde_json};

    use super::*;
    use crate::model::mongodb::Id;

    fn rejection(registration: Registration) -> String {
        let err = registration.into_voter(&Config::example()).unwrap_err();
        assert_eq!(err.status(), Status::UnprocessableEntity);
        err.public_message()
    }

    #[test]
    fn valid_registration() {
        let voter = Registration::example().into_voter(&Config::example()).unwrap();
        assert_eq!(voter.full_name, "Grace Hopper");
        assert_eq!(voter.email, "grace@example.com");
        assert!(voter.verify_password("compiler").unwrap());
        assert!(!voter.is_admin);
        assert!(voter.voted_elections.is_empty());
    }

    #[test]
    fn admin_emails_grant_admin() {
        let registration = Registration {
            email: Some("Admin@Example.com".to_string()),
            ..Registration::example()
        };
        let voter = registration.into_voter(&Config::example()).unwrap();
        assert!(voter.is_admin);
    }

    #[test]
    fn invalid_registrations() {
        let blank_name = Registration {
            full_name: Some("  ".to_string()),
            ..Registration::example()
        };
        assert_eq!(rejection(blank_name), "Fill in all fields.");

        let no_password2 = Registration {
            password2: None,
            ..Registration::example()
        };
        assert_eq!(rejection(no_password2), "Fill in all fields.");

        let short = Registration {
            password: Some("abc".to_string()),
            password2: Some("abc".to_string()),
            ..Registration::example()
        };
        assert_eq!(rejection(short), "Password should be at least 6 characters.");

        let mismatch = Registration {
            password2: Some("interpreter".to_string()),
            ..Registration::example()
        };
        assert_eq!(rejection(mismatch), "Passwords do not match.");

        let bad_email = Registration {
            email: Some("grace".to_string()),
            ..Registration::example()
        };
        assert_eq!(rejection(bad_email), "Enter a valid email address.");
    }

    #[test]
    fn credentials_are_normalised() {
        let credentials = Credentials {
            email: Some(" Ada@Example.com ".to_string()),
            password: Some("analytical".to_string()),
        };
        assert_eq!(
            credentials.validate().unwrap(),
            ("ada@example.com".to_string(), "analytical".to_string())
        );
        assert!(Credentials::default().validate().is_err());
    }

    #[test]
    fn description_hides_password_hash() {
        let voter = Voter {
            id: Id::new(),
            voter: crate::model::voter::VoterCore::example(),
        };
        let json = serde_json::to_value(VoterDescription::from(voter)).unwrap();
        assert_eq!(json["email"], "ada@example.com");
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["votedElections"], serde_json::json!([]));
    }
}
