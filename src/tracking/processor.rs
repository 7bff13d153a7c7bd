use crate::models::Visitor;
use crate::registry::ExclusionRegistry;
use crate::storage::{StorageResult, VisitorStore};
use crate::tracking::resolver::{session_window_restarts, IdentityResolver};
use std::sync::Arc;

/// Identity signals extracted from one inbound request.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub session_key: String,
    pub ip_address: String,
    pub user_agent: String,
    pub path: String,
    pub referrer: Option<String>,
    pub user_id: Option<String>,
    /// Programmatic/background request (e.g. an XHR fetch); never tracked
    pub background: bool,
}

#[derive(Debug)]
pub enum TrackOutcome {
    Tracked(Visitor),
    /// Path or user agent matched an exclusion; nothing was touched
    Excluded,
    /// Background request; nothing was touched
    Skipped,
}

/// Per-request orchestration: exclusion check, identity resolution, field
/// updates, persistence. Exactly one read path (one or two lookups) and one
/// write per tracked request.
pub struct TrackingProcessor {
    store: Arc<dyn VisitorStore>,
    resolver: IdentityResolver,
    exclusions: ExclusionRegistry,
}

impl TrackingProcessor {
    pub fn new(store: Arc<dyn VisitorStore>, exclusions: ExclusionRegistry) -> Self {
        let resolver = IdentityResolver::new(Arc::clone(&store));
        Self {
            store,
            resolver,
            exclusions,
        }
    }

    pub async fn track(&self, request: &PageRequest, now: i64) -> StorageResult<TrackOutcome> {
        if request.background {
            return Ok(TrackOutcome::Skipped);
        }

        if !self
            .exclusions
            .should_track(&request.path, &request.user_agent)
            .await?
        {
            return Ok(TrackOutcome::Excluded);
        }

        let mut visitor = self
            .resolver
            .resolve(
                &request.session_key,
                &request.ip_address,
                &request.user_agent,
                now,
            )
            .await?;

        if session_window_restarts(visitor.last_update, now) {
            visitor.referrer = request.referrer.clone();
            visitor.page_views = 0;
            visitor.session_start = now;
        }

        visitor.user_id = request.user_id.clone();
        visitor.user_agent = request.user_agent.clone();
        visitor.url = request.path.clone();
        visitor.page_views += 1;
        visitor.last_update = Some(now);

        let id = self.store.save(&visitor).await?;
        visitor.id = Some(id);

        Ok(TrackOutcome::Tracked(visitor))
    }
}
