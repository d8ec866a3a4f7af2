//! Permission-aware data access: the generic relational gateway and the
//! resource gateways composed from it.

pub mod bookmarks;
pub mod context;
pub mod error;
pub mod preferences;
pub mod relational;
pub mod strategy;

pub use bookmarks::BookmarkGateway;
pub use context::RequestContext;
pub use error::GatewayError;
pub use preferences::PreferenceGateway;
pub use relational::{DeleteOutcome, RelationalGateway};
pub use strategy::{OwnerStamp, SecondaryKey};
