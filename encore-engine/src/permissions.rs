//! Command-layer authorization policy
//!
//! The engine's mutation operations never authorize. Command handlers consult
//! [`authorize`] before calling into the orchestrator; the privilege lookup
//! itself is an injected [`PermissionGate`].

use crate::error::{Error, Result};
use crate::track::Requester;
use encore_common::TenantId;
use std::fmt;

/// Privilege lookup (e.g. a DJ role or admin flag)
pub trait PermissionGate: Send + Sync {
    fn is_privileged(&self, actor: &str, tenant_id: &TenantId) -> bool;
}

/// Control operations subject to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Skip,
    Remove,
    Seek,
    Pause,
    Resume,
    Stop,
    Volume,
    Loop,
    Shuffle,
    Autoplay,
    Sticky,
}

impl ControlAction {
    /// Actions a requester may perform on their own track
    fn allows_requester(self) -> bool {
        matches!(self, ControlAction::Skip | ControlAction::Remove | ControlAction::Seek)
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Skip => write!(f, "skip"),
            ControlAction::Remove => write!(f, "remove"),
            ControlAction::Seek => write!(f, "seek"),
            ControlAction::Pause => write!(f, "pause"),
            ControlAction::Resume => write!(f, "resume"),
            ControlAction::Stop => write!(f, "stop"),
            ControlAction::Volume => write!(f, "volume"),
            ControlAction::Loop => write!(f, "loop"),
            ControlAction::Shuffle => write!(f, "shuffle"),
            ControlAction::Autoplay => write!(f, "autoplay"),
            ControlAction::Sticky => write!(f, "24/7"),
        }
    }
}

/// What the caller knows about the endpoint and the affected track
#[derive(Debug, Clone, Default)]
pub struct ActionContext<'a> {
    /// Humans in the actor's voice endpoint, if known
    pub human_occupants: Option<usize>,
    /// Requester of the track the action targets (current track for skip/seek)
    pub target_requester: Option<&'a Requester>,
}

/// Allow when the actor is privileged, alone in the endpoint, or (for skip,
/// remove and seek) the requester of the targeted track
pub fn authorize(
    gate: &dyn PermissionGate,
    actor: &str,
    tenant_id: &TenantId,
    action: ControlAction,
    ctx: &ActionContext<'_>,
) -> Result<()> {
    if gate.is_privileged(actor, tenant_id) {
        return Ok(());
    }

    if matches!(ctx.human_occupants, Some(n) if n <= 1) {
        return Ok(());
    }

    if action.allows_requester() {
        let owns_target = ctx
            .target_requester
            .and_then(Requester::actor_id)
            .is_some_and(|id| id == actor);
        if owns_target {
            return Ok(());
        }
    }

    Err(Error::PermissionDenied(format!(
        "{} requires DJ privileges",
        action
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Djs(Vec<&'static str>);

    impl PermissionGate for Djs {
        fn is_privileged(&self, actor: &str, _tenant_id: &TenantId) -> bool {
            self.0.contains(&actor)
        }
    }

    fn tenant() -> TenantId {
        TenantId::new("guild-1")
    }

    #[test]
    fn test_privileged_actor_always_allowed() {
        let gate = Djs(vec!["dj"]);
        let ctx = ActionContext {
            human_occupants: Some(5),
            target_requester: None,
        };
        assert!(authorize(&gate, "dj", &tenant(), ControlAction::Stop, &ctx).is_ok());
    }

    #[test]
    fn test_alone_in_channel_allowed() {
        let gate = Djs(vec![]);
        let ctx = ActionContext {
            human_occupants: Some(1),
            target_requester: None,
        };
        assert!(authorize(&gate, "user", &tenant(), ControlAction::Volume, &ctx).is_ok());
    }

    #[test]
    fn test_requester_may_skip_own_track() {
        let gate = Djs(vec![]);
        let requester = Requester::user("alice", "Alice");
        let ctx = ActionContext {
            human_occupants: Some(3),
            target_requester: Some(&requester),
        };
        assert!(authorize(&gate, "alice", &tenant(), ControlAction::Skip, &ctx).is_ok());
        assert!(authorize(&gate, "alice", &tenant(), ControlAction::Seek, &ctx).is_ok());
        // Requester ownership does not extend to session-wide actions
        assert!(matches!(
            authorize(&gate, "alice", &tenant(), ControlAction::Shuffle, &ctx),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_others_denied() {
        let gate = Djs(vec![]);
        let requester = Requester::user("alice", "Alice");
        let ctx = ActionContext {
            human_occupants: Some(3),
            target_requester: Some(&requester),
        };
        let err = authorize(&gate, "bob", &tenant(), ControlAction::Skip, &ctx).unwrap_err();
        assert!(err.to_string().contains("skip"));
    }

    #[test]
    fn test_autoplay_track_has_no_owner() {
        let gate = Djs(vec![]);
        let requester = Requester::Autoplay;
        let ctx = ActionContext {
            human_occupants: None,
            target_requester: Some(&requester),
        };
        assert!(authorize(&gate, "bob", &tenant(), ControlAction::Remove, &ctx).is_err());
    }
}
