use crate::models::Visitor;
use crate::storage::{StorageResult, VisitorStore};
use std::sync::Arc;

/// How long after a visitor's last request a rotated session key may still
/// be reattached to the same IP + user agent.
pub const FUZZY_WINDOW_SECS: i64 = 5 * 60;

/// Inactivity period after which a visitor's session window restarts.
pub const SESSION_WINDOW_SECS: i64 = 60 * 60;

/// Decides which visitor record an incoming request belongs to.
///
/// Session keys are not stable identity: they rotate on login and cookie
/// renewal. IP + user agent within a short window is a reasonable proxy for
/// "same physical client, new session token", so a failed exact lookup falls
/// back to a recency-bounded fuzzy match before creating a new record.
///
/// Known limitation: two distinct clients behind one NAT with identical user
/// agents can be merged inside the fuzzy window. The window bounds how often
/// that happens; it is not otherwise defended against.
pub struct IdentityResolver {
    store: Arc<dyn VisitorStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn VisitorStore>) -> Self {
        Self { store }
    }

    /// Returns the visitor this request attaches to, not yet persisted with
    /// updated fields. Absence of a match is a normal branch, never an error.
    pub async fn resolve(
        &self,
        session_key: &str,
        ip_address: &str,
        user_agent: &str,
        now: i64,
    ) -> StorageResult<Visitor> {
        // Common case: same browser, same IP, continuing session.
        if let Some(visitor) = self
            .store
            .find_by_session_and_ip(session_key, ip_address)
            .await?
        {
            return Ok(visitor);
        }

        // Session migration: the key rotated while the same device kept
        // browsing. Adopt the record and overwrite its key, merging what
        // would otherwise become a duplicate.
        if let Some(mut visitor) = self
            .store
            .find_recent_by_ip_and_agent(ip_address, user_agent, now - FUZZY_WINDOW_SECS)
            .await?
        {
            visitor.session_key = session_key.to_string();
            return Ok(visitor);
        }

        Ok(Visitor::new(session_key, ip_address))
    }
}

/// Session-window boundary rule: the window restarts when the record is
/// brand new or the visitor has been away for at least an hour. Triggers
/// referrer recapture and the page-view reset in the processor.
pub fn session_window_restarts(last_update: Option<i64>, now: i64) -> bool {
    match last_update {
        None => true,
        Some(at) => at <= now - SESSION_WINDOW_SECS,
    }
}
