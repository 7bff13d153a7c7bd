use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One tracked browsing session. Records are unique per
/// `(session_key, ip_address)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visitor {
    /// Storage row id; `None` until the record is first persisted
    pub id: Option<i64>,
    pub session_key: String,
    pub ip_address: String,
    pub user_agent: String,
    /// Authenticated identity, `None` for anonymous visitors
    pub user_id: Option<String>,
    /// Last-seen request path
    pub url: String,
    /// Referring URL captured at session start; sticky until the
    /// session window restarts
    pub referrer: Option<String>,
    pub page_views: i64,
    /// Unix seconds when the current session window began
    pub session_start: i64,
    /// Unix seconds of the most recent request attributed to this record;
    /// `None` only for a freshly constructed, never-persisted record
    pub last_update: Option<i64>,
}

impl Visitor {
    /// Construct a brand-new, not-yet-persisted visitor for the given key.
    pub fn new(session_key: &str, ip_address: &str) -> Self {
        Self {
            id: None,
            session_key: session_key.to_string(),
            ip_address: ip_address.to_string(),
            user_agent: String::new(),
            user_id: None,
            url: String::new(),
            referrer: None,
            page_views: 0,
            session_start: 0,
            last_update: None,
        }
    }
}
