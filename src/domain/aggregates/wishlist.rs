//! Wishlist Aggregate

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Owner, SessionId};
use crate::{Result, ShopError};

/// A wishlist row belongs to a user or to a guest session, never neither.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WishlistOwner {
    User(Uuid),
    Session(SessionId),
}

impl WishlistOwner {
    pub fn require(owner: &Owner) -> Result<Self> {
        match owner {
            Owner::User(id) => Ok(Self::User(*id)),
            Owner::Session(s) => Ok(Self::Session(s.clone())),
            Owner::Anonymous => Err(ShopError::validation("Provide X-Session-Id header for guests.")),
        }
    }

    /// Read paths on an ownerless request see an empty wishlist rather than an error.
    pub fn lookup(owner: &Owner) -> Option<Self> { Self::require(owner).ok() }

    pub fn user_id(&self) -> Option<Uuid> {
        match self { Self::User(id) => Some(*id), Self::Session(_) => None }
    }
    pub fn session_id(&self) -> Option<&SessionId> {
        match self { Self::Session(s) => Some(s), Self::User(_) => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<SessionId>,
    pub variant_id: Uuid,
    pub added_at: DateTime<Utc>,
}

impl WishlistItem {
    pub fn new(owner: &WishlistOwner, variant_id: Uuid, added_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: owner.user_id(),
            session_id: owner.session_id().cloned(),
            variant_id,
            added_at,
        }
    }

    pub fn owned_by(&self, owner: &WishlistOwner) -> bool {
        match owner {
            WishlistOwner::User(id) => self.user_id == Some(*id),
            WishlistOwner::Session(s) => self.user_id.is_none() && self.session_id.as_ref() == Some(s),
        }
    }
}

/// Most ids a single bulk check may ask about.
pub const MAX_BULK_CHECK: usize = 200;

/// Map every requested id to whether it appears in `present`.
pub fn wishlist_flags(requested: &[Uuid], present: &[Uuid]) -> BTreeMap<Uuid, bool> {
    let present: HashSet<&Uuid> = present.iter().collect();
    requested.iter().map(|id| (*id, present.contains(id))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_cannot_own_wishlist() {
        assert!(WishlistOwner::require(&Owner::Anonymous).is_err());
        assert_eq!(WishlistOwner::lookup(&Owner::Anonymous), None);
    }

    #[test]
    fn test_flags_cover_every_requested_id() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let flags = wishlist_flags(&[a, b, a], &[a, c]);
        assert_eq!(flags.len(), 2);
        assert!(flags[&a]);
        assert!(!flags[&b]);
    }

    #[test]
    fn test_session_row_not_owned_by_user() {
        let s = SessionId::parse("guest").unwrap().unwrap();
        let item = WishlistItem::new(&WishlistOwner::Session(s.clone()), Uuid::now_v7(), Utc::now());
        assert!(item.owned_by(&WishlistOwner::Session(s)));
        assert!(!item.owned_by(&WishlistOwner::User(Uuid::now_v7())));
    }
}
