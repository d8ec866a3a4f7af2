//! Request orchestration: one verb-dispatched operation per request,
//! recovered into a response value or an `ApiError`.

pub mod bookmarks;
pub mod items;
pub mod request;

pub use bookmarks::{BookmarksController, BOOKMARK_NOT_FOUND};
pub use items::ItemsController;
pub use request::{ListQuery, ResourceRequest, ResourceResponse, Verb};
