//! Bearer token lookup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::value_objects::Principal;
use crate::Result;

#[async_trait]
pub trait PrincipalRepository: Send {
    /// `None` for unknown or expired tokens.
    async fn principal_for_token(&mut self, token: &str, now: DateTime<Utc>) -> Result<Option<Principal>>;
}
