//! A bounded TTL cache in front of [`IdentityResolver`].
//!
//! Only successful resolutions are cached; a failed lookup is retried on the
//! next call. Once full, the least recently used identity is evicted.

use std::{
  num::NonZeroUsize,
  sync::{Mutex, PoisonError},
  time::{Duration, Instant},
};

use frontpage_core::ident::Identifier;
use lru::LruCache;
use tracing::trace;

use crate::{
  Error, Result,
  document::{DidDocument, get_pds_endpoint},
  resolver::{IdentityResolver, ResolvedIdentity},
};

/// Default number of identities kept.
pub const DEFAULT_CAPACITY: usize = 10_000;

type Entries = LruCache<Identifier, (Instant, DidDocument)>;

pub struct CachingResolver {
  inner:   IdentityResolver,
  ttl:     Duration,
  /// `None` when the capacity is zero; every lookup then goes to the network.
  entries: Option<Mutex<Entries>>,
}

impl CachingResolver {
  pub fn new(inner: IdentityResolver, ttl: Duration, capacity: usize) -> Self {
    let entries = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
    Self { inner, ttl, entries }
  }

  pub fn inner(&self) -> &IdentityResolver { &self.inner }

  fn with_entries<T>(&self, f: impl FnOnce(&mut Entries) -> T) -> Option<T> {
    let entries = self.entries.as_ref()?;
    let mut guard = entries.lock().unwrap_or_else(PoisonError::into_inner);
    Some(f(&mut guard))
  }

  pub async fn resolve(&self, identifier: &Identifier) -> Result<DidDocument> {
    let hit = self
      .with_entries(|entries| {
        let fresh = entries.get(identifier).map(|(stored_at, _)| stored_at.elapsed() < self.ttl)?;
        if fresh {
          entries.get(identifier).map(|(_, doc)| doc.clone())
        } else {
          entries.pop(identifier);
          None
        }
      })
      .flatten();
    if let Some(doc) = hit {
      trace!(%identifier, "identity cache hit");
      return Ok(doc);
    }

    let doc = self.inner.resolve(identifier).await?;
    self.with_entries(|entries| entries.put(identifier.clone(), (Instant::now(), doc.clone())));
    Ok(doc)
  }

  pub async fn resolve_str(&self, identifier: &str) -> Result<DidDocument> {
    let identifier = Identifier::parse(identifier)?;
    self.resolve(&identifier).await
  }

  pub async fn resolve_pds(&self, identifier: &Identifier) -> Result<ResolvedIdentity> {
    let document = self.resolve(identifier).await?;
    let pds = get_pds_endpoint(&document).ok_or_else(|| Error::NoPdsFound(document.id.clone()))?;
    Ok(ResolvedIdentity { document, pds })
  }

  pub fn invalidate(&self, identifier: &Identifier) {
    self.with_entries(|entries| entries.pop(identifier));
  }

  pub fn len(&self) -> usize { self.with_entries(|entries| entries.len()).unwrap_or(0) }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
