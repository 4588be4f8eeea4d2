//! Actor directory: where role claims come from.
//!
//! The engine trusts the actor id it is given (authentication happens
//! upstream) and asks the directory only whether that actor is an
//! administrator. Party roles are resolved from the instance itself.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::role::ActorClaims;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("actor directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ActorDirectory: Send + Sync + 'static {
    /// Claims for `actor_id`. Unknown actors are ordinary users, not errors.
    async fn claims(&self, actor_id: &str) -> Result<ActorClaims, DirectoryError>;
}

/// A fixed administrator list, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    administrators: BTreeSet<String>,
}

impl StaticDirectory {
    pub fn new<I, S>(administrators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            administrators: administrators.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_administrator(&self, actor_id: &str) -> bool {
        self.administrators.contains(actor_id)
    }
}

#[async_trait]
impl ActorDirectory for StaticDirectory {
    async fn claims(&self, actor_id: &str) -> Result<ActorClaims, DirectoryError> {
        Ok(ActorClaims {
            actor_id: actor_id.to_string(),
            administrator: self.is_administrator(actor_id),
        })
    }
}
