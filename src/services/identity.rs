//! Bearer token resolution.

use chrono::Utc;

use crate::domain::value_objects::Principal;
use crate::store::{DynStore, PrincipalRepository};
use crate::{Result, ShopError};

#[derive(Clone)]
pub struct IdentityService {
    store: DynStore,
}

impl IdentityService {
    #[must_use]
    pub fn new(store: DynStore) -> Self { Self { store } }

    /// Unknown and expired tokens are both `Unauthorized`.
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ShopError::Unauthorized("Invalid token.".into()));
        }
        let mut uow = self.store.begin().await?;
        let principal = uow.principal_for_token(token, Utc::now()).await?;
        principal.ok_or_else(|| ShopError::Unauthorized("Invalid token.".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryState, MemoryStore};
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn resolves_known_token_only() {
        let principal = Principal { user_id: Uuid::now_v7(), is_staff: true };
        let store = MemoryStore::from_state(MemoryState::default().with_token("tok-1", principal));
        let service = IdentityService::new(Arc::new(store));
        assert_eq!(service.authenticate(" tok-1 ").await.unwrap(), principal);
        assert!(matches!(service.authenticate("other").await, Err(ShopError::Unauthorized(_))));
        assert!(matches!(service.authenticate("").await, Err(ShopError::Unauthorized(_))));
    }
}
