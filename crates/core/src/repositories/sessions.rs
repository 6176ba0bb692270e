//! Login sessions.
//!
//! A session is an opaque random token mapped to an identity. Resolving a token yields the
//! [`Actor`] the request layer threads into core calls.

use crate::actor::{Actor, Role, UserId};
use crate::db::Database;
use crate::HmsResult;
use chrono::Utc;

#[derive(Clone, Debug)]
pub struct SessionService {
    db: Database,
}

impl SessionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens a session for `user_id` and returns its token.
    pub async fn open(&self, user_id: UserId) -> HmsResult<String> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(Utc::now())
            .execute(self.db.pool())
            .await?;
        Ok(token)
    }

    /// Resolves a token to the actor it belongs to.
    ///
    /// Unknown tokens, and tokens whose identity has since been deleted, resolve to `None`.
    pub async fn resolve(&self, token: &str) -> HmsResult<Option<Actor>> {
        let row: Option<(UserId, Role)> = sqlx::query_as(
            "SELECT u.id, u.role FROM sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?",
        )
        .bind(token)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(|(user_id, role)| Actor::new(user_id, role)))
    }

    /// Ends a session. Closing an unknown token is not an error.
    pub async fn close(&self, token: &str) -> HmsResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::repositories::identity::{IdentityService, NewIdentity};
    use std::sync::Arc;

    #[tokio::test]
    async fn open_resolve_close() {
        let db = Database::connect_in_memory().await.unwrap();
        let identities = IdentityService::new(db.clone(), Arc::new(CoreConfig::in_memory()));
        let admin = identities
            .create(NewIdentity {
                username: "root".into(),
                password: "root-password".into(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        let sessions = SessionService::new(db);
        let token = sessions.open(admin.id).await.expect("open should succeed");
        assert_eq!(token.len(), 32);

        let actor = sessions.resolve(&token).await.unwrap();
        assert_eq!(actor, Some(Actor::new(admin.id, Role::Admin)));

        sessions.close(&token).await.unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
        assert_eq!(sessions.resolve("made-up").await.unwrap(), None);
    }
}
