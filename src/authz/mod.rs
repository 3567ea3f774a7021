//! Authorization: who may read, create, modify or delete each resource.
//!
//! The decision table lives in [`policy`] and is pure; this module turns
//! decisions into request errors and logs denials.

mod policy;
mod principal;

pub use policy::{Action, Decision, Denial, Policy};
pub use principal::{Actor, Principal};

use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Collection-level check, before any instance is loaded.
pub fn authorize(policy: Policy, actor: &Actor, action: Action) -> AppResult<()> {
    enforce(policy, actor, action, policy.check_collection(actor, action))
}

/// Instance-level check, once the instance (and its owner) is known.
pub fn authorize_instance(policy: Policy, actor: &Actor, action: Action, owner: Option<Uuid>) -> AppResult<()> {
    enforce(policy, actor, action, policy.check_instance(actor, action, owner))
}

fn enforce(policy: Policy, actor: &Actor, action: Action, decision: Decision) -> AppResult<()> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(denial) => {
            tracing::debug!(
                user_id = ?actor.user_id(),
                policy = ?policy,
                action = ?action,
                denial = ?denial,
                "permission denied"
            );
            Err(match denial {
                Denial::Unauthenticated => AppError::unauthorized("authentication credentials were not provided"),
                Denial::Forbidden => AppError::forbidden("you do not have permission to perform this action"),
            })
        }
    }
}
