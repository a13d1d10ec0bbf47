//! Tenant -> Session map
//!
//! The only engine-wide shared structure. DashMap shards the map, so
//! lookups, creation and removal are exclusive per tenant key while distinct
//! tenants proceed in parallel.

use super::session::{Session, SessionSettings};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use encore_common::{TenantId, TextTarget, VoiceTarget};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Injectable session registry; create one per engine (or per test)
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<TenantId, Arc<Session>>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            settings,
        }
    }

    /// Look up the tenant's session, creating it if absent
    ///
    /// Returns the session and whether this call created it. The targets
    /// are only used on creation.
    pub fn get_or_create(
        &self,
        tenant_id: &TenantId,
        voice_target: &VoiceTarget,
        text_target: &TextTarget,
    ) -> (Arc<Session>, bool) {
        match self.sessions.entry(tenant_id.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(Session::new(
                    tenant_id.clone(),
                    voice_target.clone(),
                    text_target.clone(),
                    self.settings,
                ));
                entry.insert(Arc::clone(&session));
                debug!("Created session {} for tenant {}", session.id(), tenant_id);
                (session, true)
            }
        }
    }

    pub fn get(&self, tenant_id: &TenantId) -> Option<Arc<Session>> {
        self.sessions.get(tenant_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the tenant's session; a missing session is a no-op
    pub fn destroy(&self, tenant_id: &TenantId) -> Option<Arc<Session>> {
        self.sessions.remove(tenant_id).map(|(_, session)| session)
    }

    /// Remove only if the registered session is still `session_id`
    ///
    /// Guards against a late teardown removing a newer session for the same
    /// tenant.
    pub fn remove_instance(&self, tenant_id: &TenantId, session_id: Uuid) -> bool {
        self.sessions
            .remove_if(tenant_id, |_, session| session.id() == session_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<_> = self.sessions.iter().map(|e| e.key().clone()).collect();
        tenants.sort();
        tenants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: &str) -> (TenantId, VoiceTarget, TextTarget) {
        (
            TenantId::new(n),
            VoiceTarget::new(format!("{}-voice", n)),
            TextTarget::new(format!("{}-text", n)),
        )
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = SessionRegistry::default();
        let (tenant, voice, text) = ids("t1");

        let (first, created) = registry.get_or_create(&tenant, &voice, &text);
        assert!(created);
        let (second, created) = registry.get_or_create(&tenant, &VoiceTarget::new("other"), &text);
        assert!(!created);
        assert_eq!(first.id(), second.id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let registry = SessionRegistry::default();
        let (tenant, voice, text) = ids("t1");
        registry.get_or_create(&tenant, &voice, &text);

        assert!(registry.destroy(&tenant).is_some());
        assert!(registry.destroy(&tenant).is_none());
        assert!(registry.get(&tenant).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_recreated_session_is_new_instance() {
        let registry = SessionRegistry::default();
        let (tenant, voice, text) = ids("t1");
        let (old, _) = registry.get_or_create(&tenant, &voice, &text);
        registry.destroy(&tenant);
        let (new, created) = registry.get_or_create(&tenant, &voice, &text);
        assert!(created);
        assert_ne!(old.id(), new.id());

        // A late teardown of the old instance leaves the new one alone
        assert!(!registry.remove_instance(&tenant, old.id()));
        assert!(registry.get(&tenant).is_some());
        assert!(registry.remove_instance(&tenant, new.id()));
    }

    #[test]
    fn test_tenants_are_isolated() {
        let registry = SessionRegistry::default();
        for name in ["b", "a", "c"] {
            let (tenant, voice, text) = ids(name);
            registry.get_or_create(&tenant, &voice, &text);
        }
        let names: Vec<_> = registry.tenants().iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
