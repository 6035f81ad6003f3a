//! External data collaborators: the GitHub REST API and the web-search
//! backend. All failures are converted into human-readable strings at this
//! boundary; nothing here returns a raw error to the router.

pub mod github;
pub mod search;
