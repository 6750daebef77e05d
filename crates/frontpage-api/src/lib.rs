//! Read-only JSON API over the Frontpage mirror.
//!
//! Exposes an axum [`Router`] backed by any [`MirrorStore`]. Auth, TLS, and
//! transport concerns are the caller's responsibility; the caller's identity
//! arrives in the [`viewer::VIEWER_HEADER`] header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", frontpage_api::api_router(store.clone(), 50))
//! ```

pub mod error;
pub mod posts;
pub mod users;
pub mod viewer;

use std::sync::Arc;

use axum::{Router, routing::get};
use frontpage_core::store::MirrorStore;

pub use error::ApiError;

/// Default number of entries on the front page when `?limit=` is absent.
pub const DEFAULT_FRONT_PAGE_LIMIT: usize = 50;

/// State shared by the read handlers.
pub struct ApiState<S> {
  pub store:            Arc<S>,
  pub front_page_limit: usize,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), front_page_limit: self.front_page_limit }
  }
}

/// Build the read router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, front_page_limit: usize) -> Router<()>
where
  S: MirrorStore + 'static,
{
  Router::new()
    .route("/front-page", get(posts::front_page::<S>))
    .route("/posts/{did}/{rkey}", get(posts::get_one::<S>))
    .route("/posts/{did}/{rkey}/comments", get(posts::comments::<S>))
    .route("/users/{did}/posts", get(users::posts::<S>))
    .route("/users/{did}/counts", get(users::counts::<S>))
    .with_state(ApiState { store, front_page_limit })
}
