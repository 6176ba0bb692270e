//! Two-party conversations.

use crate::actor::{Actor, Role, UserId};
use crate::db::Database;
use crate::error::{HmsError, HmsResult};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub type ConversationId = i64;

/// A conversation as seen by one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub other_user_id: Option<UserId>,
    pub other_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: UserId,
    pub sender_username: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationView {
    pub conversation: ConversationSummary,
    pub messages: Vec<Message>,
}

// the other participant is looked up relative to the viewer bound first
const SUMMARY_SELECT: &str = "SELECT c.id, o.user_id AS other_user_id, ou.username AS other_username, \
     c.created_at \
     FROM conversations c \
     JOIN conversation_participants me ON me.conversation_id = c.id AND me.user_id = ? \
     LEFT JOIN conversation_participants o ON o.conversation_id = c.id AND o.user_id != me.user_id \
     LEFT JOIN users ou ON ou.id = o.user_id";

#[derive(Clone, Debug)]
pub struct MessagingService {
    db: Database,
}

impl MessagingService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Finds the conversation between the actor and `other`, creating it if needed.
    ///
    /// # Errors
    ///
    /// `NotFound` if `other` does not exist, `Validation` if it is the actor.
    pub async fn start_conversation(
        &self,
        actor: &Actor,
        other: UserId,
    ) -> HmsResult<ConversationId> {
        if other == actor.user_id {
            return Err(HmsError::Validation(
                "You cannot start a chat with yourself.".into(),
            ));
        }
        let exists: Option<UserId> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(other)
            .fetch_optional(self.db.pool())
            .await?;
        if exists.is_none() {
            return Err(HmsError::NotFound("user".into()));
        }

        let mut tx = self.db.pool().begin().await?;
        let existing: Option<ConversationId> = sqlx::query_scalar(
            "SELECT a.conversation_id FROM conversation_participants a \
             JOIN conversation_participants b ON b.conversation_id = a.conversation_id \
             WHERE a.user_id = ? AND b.user_id = ? ORDER BY a.conversation_id LIMIT 1",
        )
        .bind(actor.user_id)
        .bind(other)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let id: ConversationId =
            sqlx::query_scalar("INSERT INTO conversations (created_at) VALUES (?) RETURNING id")
                .bind(Utc::now())
                .fetch_one(&mut *tx)
                .await?;
        for participant in [actor.user_id, other] {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?, ?)",
            )
            .bind(id)
            .bind(participant)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(conversation_id = id, "conversation started");
        Ok(id)
    }

    /// Appends a message to a conversation the actor takes part in.
    pub async fn post_message(
        &self,
        actor: &Actor,
        conversation_id: ConversationId,
        body: &str,
    ) -> HmsResult<Message> {
        self.summary(actor, conversation_id).await?;
        let body = validation::required_text(body, "Message")?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (conversation_id, sender_id, body, timestamp) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(conversation_id)
        .bind(actor.user_id)
        .bind(body.as_str())
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;

        Ok(sqlx::query_as::<_, Message>(
            "SELECT m.id, m.sender_id, u.username AS sender_username, m.body, m.timestamp \
             FROM messages m JOIN users u ON u.id = m.sender_id WHERE m.id = ?",
        )
        .bind(id)
        .fetch_one(self.db.pool())
        .await?)
    }

    /// A conversation with its messages, oldest first.
    pub async fn conversation(
        &self,
        actor: &Actor,
        conversation_id: ConversationId,
    ) -> HmsResult<ConversationView> {
        let conversation = self.summary(actor, conversation_id).await?;
        let messages = sqlx::query_as::<_, Message>(
            "SELECT m.id, m.sender_id, u.username AS sender_username, m.body, m.timestamp \
             FROM messages m JOIN users u ON u.id = m.sender_id \
             WHERE m.conversation_id = ? ORDER BY m.id",
        )
        .bind(conversation_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(ConversationView {
            conversation,
            messages,
        })
    }

    async fn summary(
        &self,
        actor: &Actor,
        conversation_id: ConversationId,
    ) -> HmsResult<ConversationSummary> {
        let sql = format!("{SUMMARY_SELECT} WHERE c.id = ?");
        if let Some(summary) = sqlx::query_as::<_, ConversationSummary>(&sql)
            .bind(actor.user_id)
            .bind(conversation_id)
            .fetch_optional(self.db.pool())
            .await?
        {
            return Ok(summary);
        }

        let exists: Option<ConversationId> =
            sqlx::query_scalar("SELECT id FROM conversations WHERE id = ?")
                .bind(conversation_id)
                .fetch_optional(self.db.pool())
                .await?;
        match exists {
            Some(_) => Err(HmsError::NotAuthorized("view this conversation".into())),
            None => Err(HmsError::NotFound("conversation".into())),
        }
    }

    /// The actor's conversations, newest first.
    pub async fn list_conversations(&self, actor: &Actor) -> HmsResult<Vec<ConversationSummary>> {
        let sql = format!("{SUMMARY_SELECT} ORDER BY c.id DESC");
        Ok(sqlx::query_as::<_, ConversationSummary>(&sql)
            .bind(actor.user_id)
            .fetch_all(self.db.pool())
            .await?)
    }

    /// Messages sent by others in the actor's conversations.
    pub async fn received_message_count(&self, actor: &Actor) -> HmsResult<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m \
             JOIN conversation_participants cp ON cp.conversation_id = m.conversation_id \
             WHERE cp.user_id = ? AND m.sender_id != ?",
        )
        .bind(actor.user_id)
        .bind(actor.user_id)
        .fetch_one(self.db.pool())
        .await?)
    }

    pub async fn total_conversations(&self, actor: &Actor) -> HmsResult<i64> {
        actor.require(Role::Admin, "view conversation totals")?;
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(self.db.pool())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::Fixture;

    #[tokio::test]
    async fn start_is_find_or_create() {
        let fx = Fixture::new().await;
        let patient = fx.patient("p1").await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let svc = MessagingService::new(fx.db.clone());

        let first = svc.start_conversation(&patient, doctor.user_id).await.unwrap();
        let again = svc.start_conversation(&patient, doctor.user_id).await.unwrap();
        let reverse = svc.start_conversation(&doctor, patient.user_id).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first, reverse);

        let listed = svc.list_conversations(&patient).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].other_username.as_deref(), Some("drd"));

        let admin = fx.admin().await;
        assert_eq!(svc.total_conversations(&admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn start_rejects_self_and_unknown_users() {
        let fx = Fixture::new().await;
        let patient = fx.patient("p1").await;
        let svc = MessagingService::new(fx.db.clone());

        assert!(matches!(
            svc.start_conversation(&patient, patient.user_id).await,
            Err(HmsError::Validation(_))
        ));
        assert!(matches!(
            svc.start_conversation(&patient, 404).await,
            Err(HmsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn messages_are_ordered_and_private() {
        let fx = Fixture::new().await;
        let patient = fx.patient("p1").await;
        let outsider = fx.patient("p2").await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let svc = MessagingService::new(fx.db.clone());
        let id = svc.start_conversation(&patient, doctor.user_id).await.unwrap();

        svc.post_message(&patient, id, "Hello doctor").await.unwrap();
        svc.post_message(&doctor, id, "Hello").await.unwrap();
        svc.post_message(&patient, id, "Thanks").await.unwrap();

        let view = svc.conversation(&doctor, id).await.unwrap();
        let bodies: Vec<_> = view.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["Hello doctor", "Hello", "Thanks"]);
        assert_eq!(view.conversation.other_username.as_deref(), Some("p1"));

        assert_eq!(svc.received_message_count(&doctor).await.unwrap(), 2);
        assert_eq!(svc.received_message_count(&patient).await.unwrap(), 1);

        assert!(matches!(
            svc.post_message(&outsider, id, "Hi").await,
            Err(HmsError::NotAuthorized(_))
        ));
        assert!(matches!(
            svc.post_message(&patient, id, "  ").await,
            Err(HmsError::Validation(_))
        ));
        assert!(matches!(
            svc.conversation(&patient, 999).await,
            Err(HmsError::NotFound(_))
        ));
    }
}
