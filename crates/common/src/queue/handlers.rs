//! Default consumers for the outboxes

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::info;

use super::{ActivityMsg, MessageHandler};
use crate::errors::{AppError, Result};

/// Writes each message to the log and acknowledges it
pub struct LogHandler<M> {
    queue: &'static str,
    _marker: PhantomData<fn(M)>,
}

impl<M> LogHandler<M> {
    pub fn new(queue: &'static str) -> Self {
        Self {
            queue,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Serialize + Debug + Send + Sync> MessageHandler<M> for LogHandler<M> {
    async fn handle(&self, message: &M) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        info!(queue = self.queue, payload = %payload, "Message consumed");
        Ok(())
    }
}

/// Persists activities into the `activity` table
pub struct ActivityRecorder {
    db: DatabaseConnection,
}

impl ActivityRecorder {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageHandler<ActivityMsg> for ActivityRecorder {
    async fn handle(&self, message: &ActivityMsg) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO activity (user_id, trigger_user_id, object_id, original_object_id, activity_type, revision_id, cancelled, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW())",
            [
                message.user_id.clone().into(),
                message.trigger_user_id.clone().unwrap_or_default().into(),
                message.object_id.clone().into(),
                message.original_object_id.clone().into(),
                message.activity_type.clone().into(),
                message.revision_id.clone().unwrap_or_default().into(),
            ],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }
}

/// Posts messages as JSON to a webhook
pub struct WebhookHandler<M> {
    client: reqwest::Client,
    url: String,
    _marker: PhantomData<fn(M)>,
}

impl<M> WebhookHandler<M> {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            _marker: PhantomData,
        })
    }
}

#[async_trait]
impl<M: Serialize + Send + Sync> MessageHandler<M> for WebhookHandler<M> {
    async fn handle(&self, message: &M) -> Result<()> {
        let response = self.client.post(&self.url).json(message).send().await?;
        if !response.status().is_success() {
            return Err(AppError::QueueError {
                message: format!("webhook returned {}", response.status()),
            });
        }
        Ok(())
    }
}
