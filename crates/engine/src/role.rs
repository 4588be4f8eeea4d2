//! Role resolution.
//!
//! [`RoleResolver::roles_for`] is the only place that decides which roles an
//! actor holds on an instance. Guards and the task tracker consult the
//! resulting [`RoleSet`]; nothing re-derives administrator status on its own.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instance::WorkflowInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Initiator,
    Counterparty,
    Supervisor,
    Administrator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Counterparty => "counterparty",
            Role::Supervisor => "supervisor",
            Role::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims about an already-authenticated actor, as supplied by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorClaims {
    pub actor_id: String,
    pub administrator: bool,
}

impl ActorClaims {
    pub fn user(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            administrator: false,
        }
    }

    pub fn administrator(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            administrator: true,
        }
    }
}

/// The roles one actor holds on one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn contains_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.0.contains(r))
    }

    pub fn is_administrator(&self) -> bool {
        self.contains(Role::Administrator)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Role::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

pub struct RoleResolver;

impl RoleResolver {
    /// Compute the roles `claims` grants on `instance`.
    ///
    /// Party roles come from the ids bound to the instance (the supervisor as
    /// currently assigned); the administrator role comes from the claims.
    pub fn roles_for(claims: &ActorClaims, instance: &WorkflowInstance) -> RoleSet {
        let parties = &instance.parties;
        let actor = claims.actor_id.as_str();
        let mut roles = BTreeSet::new();
        if parties.initiator_id == actor {
            roles.insert(Role::Initiator);
        }
        if parties.counterparty_id == actor {
            roles.insert(Role::Counterparty);
        }
        if parties.supervisor_id == actor {
            roles.insert(Role::Supervisor);
        }
        if claims.administrator {
            roles.insert(Role::Administrator);
        }
        RoleSet(roles)
    }
}
