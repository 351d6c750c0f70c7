use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query_as, Postgres};
use uuid::Uuid;

use super::PgUnitOfWork;
use crate::domain::value_objects::Principal;
use crate::store::PrincipalRepository;
use crate::Result;

const TOKEN_SQL: &str = r"
    SELECT user_id, is_staff
    FROM auth_tokens
    WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)
";

#[async_trait]
impl PrincipalRepository for PgUnitOfWork {
    async fn principal_for_token(&mut self, token: &str, now: DateTime<Utc>) -> Result<Option<Principal>> {
        let row = query_as::<Postgres, (Uuid, bool)>(TOKEN_SQL)
            .bind(token)
            .bind(now)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row.map(|(user_id, is_staff)| Principal { user_id, is_staff }))
    }
}
