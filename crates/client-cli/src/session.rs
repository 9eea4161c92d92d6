use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use shared::UserProfile;

use crate::config::Config;

/// A logged-in user. Created by login, dropped by logout; every
/// authenticated API call is handed one explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl Session {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    /// The session stored in `config`, or an error telling the user to log in.
    pub fn require(config: &Config) -> Result<Session> {
        match &config.session {
            Some(session) => Ok(session.clone()),
            None => bail!("Not logged in. Run 'errandbuddy login <email>' first."),
        }
    }
}
