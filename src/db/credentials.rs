use color_eyre::Result;
use tracing::{info, warn};

use crate::transport::TokenSource;

use super::Database;

const TOKEN_KEY: &str = "token";

/// Bearer credential persisted between runs.
pub struct CredentialStore {
  db: Database,
}

impl CredentialStore {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  pub fn load_token(&self) -> Result<Option<String>> {
    Ok(self.db.get(TOKEN_KEY)?.filter(|t| !t.is_empty()))
  }

  pub fn store_token(&self, token: &str) -> Result<()> {
    self.db.set(TOKEN_KEY, token.trim())?;
    info!("credential stored");
    Ok(())
  }

  pub fn clear(&self) -> Result<()> {
    if self.db.delete(TOKEN_KEY)? {
      info!("credential removed");
    }
    Ok(())
  }

  pub fn is_authenticated(&self) -> bool {
    matches!(self.load_token(), Ok(Some(_)))
  }
}

impl TokenSource for CredentialStore {
  fn token(&self) -> Option<String> {
    match self.load_token() {
      Ok(token) => token,
      Err(e) => {
        warn!(error = %e, "failed to read credential");
        None
      }
    }
  }
}
