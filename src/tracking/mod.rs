pub mod ip;
pub mod middleware;
pub mod processor;
pub mod resolver;

pub use middleware::{track_requests, AuthenticatedUser, TrackingState, SESSION_COOKIE};
pub use processor::{PageRequest, TrackOutcome, TrackingProcessor};
pub use resolver::{
    session_window_restarts, IdentityResolver, FUZZY_WINDOW_SECS, SESSION_WINDOW_SECS,
};
