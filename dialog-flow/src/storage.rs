use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{
    context::{Context, ContextSnapshot},
    error::Result,
    step::FlowState,
};

/// A dialogue session: current step plus per-session context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session<S> {
    pub id: String,
    pub current_step: S,
    #[serde(skip)]
    pub context: Context,
    /// Progress note from the last handled step.
    pub status_message: Option<String>,
}

impl<S: FlowState> Session<S> {
    pub fn new(id: impl Into<String>, start: S) -> Self {
        Self {
            id: id.into(),
            current_step: start,
            context: Context::new(),
            status_message: None,
        }
    }
}

/// Trait for storing and retrieving sessions.
#[async_trait]
pub trait SessionStorage<S: FlowState>: Send + Sync {
    async fn save(&self, session: Session<S>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session<S>>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of [`SessionStorage`].
pub struct InMemorySessionStorage<S: FlowState> {
    sessions: Arc<DashMap<String, Session<S>>>,
}

impl<S: FlowState> InMemorySessionStorage<S> {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl<S: FlowState> Default for InMemorySessionStorage<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: FlowState> SessionStorage<S> for InMemorySessionStorage<S> {
    async fn save(&self, session: Session<S>) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session<S>>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

/// Postgres-backed implementation of [`SessionStorage`].
///
/// Step and context are stored as JSONB snapshots, upserted on every save.
pub struct PostgresSessionStorage<S> {
    pool: PgPool,
    _step: PhantomData<fn() -> S>,
}

impl<S: FlowState> PostgresSessionStorage<S> {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS dialog_sessions (
                id TEXT PRIMARY KEY,
                current_step JSONB NOT NULL,
                status_message TEXT,
                context JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            _step: PhantomData,
        })
    }
}

#[async_trait]
impl<S: FlowState> SessionStorage<S> for PostgresSessionStorage<S> {
    async fn save(&self, session: Session<S>) -> Result<()> {
        let step = serde_json::to_value(session.current_step)?;
        let context = serde_json::to_value(session.context.snapshot())?;

        sqlx::query(
            "INSERT INTO dialog_sessions (id, current_step, status_message, context, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (id) DO UPDATE
             SET current_step = EXCLUDED.current_step,
                 status_message = EXCLUDED.status_message,
                 context = EXCLUDED.context,
                 updated_at = now()",
        )
        .bind(&session.id)
        .bind(step)
        .bind(&session.status_message)
        .bind(context)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session<S>>> {
        let row = sqlx::query(
            "SELECT current_step, status_message, context FROM dialog_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let current_step: S = serde_json::from_value(row.get::<serde_json::Value, _>("current_step"))?;
        let snapshot: ContextSnapshot =
            serde_json::from_value(row.get::<serde_json::Value, _>("context"))?;

        Ok(Some(Session {
            id: id.to_string(),
            current_step,
            context: Context::from_snapshot(snapshot),
            status_message: row.get("status_message"),
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM dialog_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
