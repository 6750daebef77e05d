//! Server-owned HTTP routes. The read surface lives in `frontpage-api`.

pub mod hook;
pub mod identity;
