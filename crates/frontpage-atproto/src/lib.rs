//! ATProto network clients: identity resolution and repository reads.
//!
//! Everything here talks HTTP to third-party services (the PLC directory,
//! `did:web` hosts, handle resolvers, PDSes) and maps their failures onto
//! [`Error`].

pub mod cache;
pub mod document;
pub mod error;
pub mod repo;
pub mod resolver;

pub use cache::CachingResolver;
pub use document::{DidDocument, get_pds_endpoint};
pub use error::{Error, Result};
pub use repo::{RepoClient, RepoDescription};
pub use resolver::{IdentityResolver, ResolvedIdentity, ResolverConfig};
