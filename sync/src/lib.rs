//! Replication of user profiles (e.g. after a password change) to the
//! remote sites of a distributed setup.

pub mod error;
pub mod push;
pub mod pusher;
pub mod site;

pub use error::{Result, SyncError};
pub use push::{push_profile, SiteResult, SyncReport, DEFAULT_DEADLINE, DEFAULT_WORKERS};
pub use pusher::{HttpProfilePusher, ProfilePusher};
pub use site::{RemoteSite, UserProfile};
