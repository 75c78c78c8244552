//! HTTP layer for inkwell.
//!
//! - **Endpoints**: posts, groups, profiles, the follow feed, auth and admin
//! - **Extractors**: session user, login redirects, admin checks
//! - **Middleware**: session authentication and the index page cache
//!
//! Every view answers with the JSON context a template would have rendered.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
