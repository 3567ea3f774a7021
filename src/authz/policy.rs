use uuid::Uuid;

use super::principal::{Actor, Principal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_safe(self) -> bool {
        matches!(self, Action::Read)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

/// Access rules, one per resource family.
///
/// Each rule is evaluated twice: against the collection before any instance
/// is loaded, and against the instance once it is. Evaluation order is the
/// safe-action exemption, then authentication, then role/ownership, and
/// anything not explicitly allowed is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Titles, categories, genres: anyone reads, admins write.
    AdminOrReadOnly,
    /// Reviews and comments: anyone reads, any user creates, the author or
    /// staff edit and delete.
    AuthorOrStaff,
    /// User management: admins only, reads included.
    AdminOnly,
    /// The `/users/me` alias: an authenticated user on their own record.
    SelfService,
}

impl Policy {
    pub fn check_collection(self, actor: &Actor, action: Action) -> Decision {
        match self {
            Policy::AdminOrReadOnly => admin_or_read_only(actor, action),
            Policy::AuthorOrStaff => {
                if action.is_safe() {
                    return Decision::Allow;
                }
                authenticated(actor).map_or_else(Decision::Deny, |_| Decision::Allow)
            }
            Policy::AdminOnly => admin_only(actor),
            Policy::SelfService => authenticated(actor).map_or_else(Decision::Deny, |_| Decision::Allow),
        }
    }

    /// `owner` is the author of a review/comment, or the user record itself
    /// for `SelfService`. Families without ownership ignore it.
    pub fn check_instance(self, actor: &Actor, action: Action, owner: Option<Uuid>) -> Decision {
        match self {
            Policy::AdminOrReadOnly => admin_or_read_only(actor, action),
            Policy::AuthorOrStaff => {
                if action.is_safe() {
                    return Decision::Allow;
                }
                let principal = match authenticated(actor) {
                    Ok(principal) => principal,
                    Err(denial) => return Decision::Deny(denial),
                };
                match action {
                    Action::Update | Action::Delete
                        if principal.is_admin()
                            || principal.is_moderator()
                            || owner.is_some_and(|id| principal.owns(id)) =>
                    {
                        Decision::Allow
                    }
                    _ => Decision::Deny(Denial::Forbidden),
                }
            }
            Policy::AdminOnly => admin_only(actor),
            Policy::SelfService => {
                let principal = match authenticated(actor) {
                    Ok(principal) => principal,
                    Err(denial) => return Decision::Deny(denial),
                };
                match action {
                    Action::Read | Action::Update if owner.is_some_and(|id| principal.owns(id)) => Decision::Allow,
                    _ => Decision::Deny(Denial::Forbidden),
                }
            }
        }
    }
}

fn authenticated(actor: &Actor) -> Result<&Principal, Denial> {
    actor.principal().ok_or(Denial::Unauthenticated)
}

fn admin_or_read_only(actor: &Actor, action: Action) -> Decision {
    if action.is_safe() {
        return Decision::Allow;
    }
    admin_only(actor)
}

fn admin_only(actor: &Actor) -> Decision {
    match authenticated(actor) {
        Ok(principal) if principal.is_admin() => Decision::Allow,
        Ok(_) => Decision::Deny(Denial::Forbidden),
        Err(denial) => Decision::Deny(denial),
    }
}
