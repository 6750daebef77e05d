//! [`SqliteStore`]: the SQLite implementation of [`MirrorStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, ffi};

use frontpage_core::{
  event::{EventOp, MirrorEvent, Offset},
  ident::{AtUri, Did, Rkey},
  mirror::{
    Comment, CommentView, NewComment, NewPost, NewVote, Post, PostView, RowId, UserCounts,
    ViewerContext, Vote,
  },
  record::{Collection, Record, RecordStatus},
  store::{Applied, ApplyOutcome, MirrorStore, Rejection},
};

use crate::{
  Error, Result,
  encode::{
    POST_COLUMNS, RawComment, RawCommentView, RawPostView, decode_count, encode_dt,
    encode_status, stored_precision,
  },
  schema::SCHEMA,
};

/// Post columns followed by the live comment count, the live vote count and
/// whether `?1` (the viewer DID, possibly NULL) has a live vote on the post.
fn post_view_select() -> String {
  format!(
    "SELECT {POST_COLUMNS},
       (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND c.status = 'live'),
       (SELECT COUNT(*) FROM votes    v WHERE v.post_id = p.id AND v.status = 'live'),
       EXISTS (SELECT 1 FROM votes    v WHERE v.post_id = p.id AND v.status = 'live'
                                         AND v.author_did = ?1)
     FROM posts p"
  )
}

// ─── Constraint classification ───────────────────────────────────────────────

/// True for the constraint failures that signal a consistency condition
/// (duplicate key, already-consumed offset). Everything else is fatal.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

fn duplicate_or_database(
  err: tokio_rusqlite::Error,
  collection: Collection,
  author_did: &Did,
  rkey: &Rkey,
) -> Error {
  match err {
    tokio_rusqlite::Error::Rusqlite(ref e) if is_unique_violation(e) => Error::DuplicateKey {
      collection,
      author_did: author_did.clone(),
      rkey: rkey.clone(),
    },
    other => Error::Database(other),
  }
}

// ─── Synchronous unit-of-work steps ──────────────────────────────────────────
//
// Each takes a plain `&Connection` so it can run on its own or inside the
// transaction opened by `apply_event`.

fn insert_post(conn: &Connection, input: &NewPost) -> rusqlite::Result<Post> {
  let created_at = stored_precision(input.record.created_at);
  conn.execute(
    "INSERT INTO posts (author_did, rkey, cid, title, url, created_at, status)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'live')",
    rusqlite::params![
      input.author_did.as_str(),
      input.rkey.as_str(),
      input.cid,
      input.record.title,
      input.record.url,
      encode_dt(created_at),
    ],
  )?;
  Ok(Post {
    id:         conn.last_insert_rowid(),
    author_did: input.author_did.clone(),
    rkey:       input.rkey.clone(),
    cid:        input.cid.clone(),
    title:      input.record.title.clone(),
    url:        input.record.url.clone(),
    created_at,
    status:     RecordStatus::Live,
  })
}

fn post_id_for(conn: &Connection, uri: &AtUri) -> rusqlite::Result<Option<RowId>> {
  conn
    .query_row(
      "SELECT id FROM posts WHERE author_did = ?1 AND rkey = ?2",
      rusqlite::params![uri.did.as_str(), uri.rkey.as_str()],
      |r| r.get(0),
    )
    .optional()
}

/// `Ok(None)` when the parent post is not mirrored.
fn insert_comment(conn: &Connection, input: &NewComment) -> rusqlite::Result<Option<Comment>> {
  let Some(post_id) = post_id_for(conn, &input.post)? else {
    return Ok(None);
  };
  let created_at = stored_precision(input.record.created_at);
  conn.execute(
    "INSERT INTO comments (post_id, author_did, rkey, cid, content, created_at, status)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'live')",
    rusqlite::params![
      post_id,
      input.author_did.as_str(),
      input.rkey.as_str(),
      input.cid,
      input.record.content,
      encode_dt(created_at),
    ],
  )?;
  Ok(Some(Comment {
    id: conn.last_insert_rowid(),
    post_id,
    author_did: input.author_did.clone(),
    rkey: input.rkey.clone(),
    cid: input.cid.clone(),
    content: input.record.content.clone(),
    created_at,
    status: RecordStatus::Live,
  }))
}

/// `Ok(None)` when the voted-on post is not mirrored.
fn insert_vote(conn: &Connection, input: &NewVote) -> rusqlite::Result<Option<Vote>> {
  let Some(post_id) = post_id_for(conn, &input.subject)? else {
    return Ok(None);
  };
  let created_at = stored_precision(input.record.created_at);
  conn.execute(
    "INSERT INTO votes (post_id, author_did, rkey, cid, created_at, status)
     VALUES (?1, ?2, ?3, ?4, ?5, 'live')",
    rusqlite::params![
      post_id,
      input.author_did.as_str(),
      input.rkey.as_str(),
      input.cid,
      encode_dt(created_at),
    ],
  )?;
  Ok(Some(Vote {
    id: conn.last_insert_rowid(),
    post_id,
    author_did: input.author_did.clone(),
    rkey: input.rkey.clone(),
    cid: input.cid.clone(),
    created_at,
    status: RecordStatus::Live,
  }))
}

fn table_for(collection: Collection) -> &'static str {
  match collection {
    Collection::Post => "posts",
    Collection::Comment => "comments",
    Collection::Vote => "votes",
  }
}

/// Flip a live row to `deleted`. Returns whether a row changed.
fn soft_delete(
  conn: &Connection,
  collection: Collection,
  author_did: &Did,
  rkey: &Rkey,
) -> rusqlite::Result<bool> {
  let sql = format!(
    "UPDATE {} SET status = ?1 WHERE author_did = ?2 AND rkey = ?3 AND status = 'live'",
    table_for(collection)
  );
  let changed = conn.execute(
    &sql,
    rusqlite::params![encode_status(RecordStatus::Deleted), author_did.as_str(), rkey.as_str()],
  )?;
  Ok(changed > 0)
}

fn offset_recorded(conn: &Connection, offset: Offset) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM consumed_offsets WHERE event_offset = ?1)",
    rusqlite::params![offset],
    |r| r.get(0),
  )
}

fn insert_offset(conn: &Connection, offset: Offset) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO consumed_offsets (event_offset, consumed_at) VALUES (?1, ?2)",
    rusqlite::params![offset, encode_dt(Utc::now())],
  )?;
  Ok(())
}

/// The mutation half of an event's unit of work.
fn apply_mutation(
  conn: &Connection,
  event: &MirrorEvent,
) -> rusqlite::Result<std::result::Result<Applied, Rejection>> {
  let author_did = event.author_did.clone();
  let rkey = event.rkey.clone();

  match &event.op {
    EventOp::Create { cid, record } => {
      let cid = cid.clone();
      let created = match record {
        Record::Post(record) => {
          let post =
            insert_post(conn, &NewPost { author_did, rkey, cid, record: record.clone() })?;
          Some(Applied::Created { collection: Collection::Post, id: post.id })
        }
        Record::Comment(record, post) => insert_comment(conn, &NewComment {
          author_did,
          rkey,
          cid,
          record: record.clone(),
          post: post.clone(),
        })?
        .map(|c| Applied::Created { collection: Collection::Comment, id: c.id }),
        Record::Vote(record, subject) => insert_vote(conn, &NewVote {
          author_did,
          rkey,
          cid,
          record: record.clone(),
          subject: subject.clone(),
        })?
        .map(|v| Applied::Created { collection: Collection::Vote, id: v.id }),
      };

      Ok(created.ok_or_else(|| {
        let uri = match record {
          Record::Comment(_, uri) | Record::Vote(_, uri) => uri.clone(),
          Record::Post(_) => AtUri::new(event.author_did.clone(), Collection::Post, event.rkey.clone()),
        };
        Rejection::MissingSubject { uri }
      }))
    }
    EventOp::Delete { collection } => {
      let collection = *collection;
      if soft_delete(conn, collection, &author_did, &rkey)? {
        Ok(Ok(Applied::SoftDeleted { collection }))
      } else {
        Ok(Ok(Applied::NothingToDelete { collection }))
      }
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Frontpage mirror backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_post_views(
    &self,
    where_clause: &'static str,
    args: Vec<String>,
    ctx: &ViewerContext,
  ) -> Result<Vec<PostView>> {
    let viewer = ctx.viewer.as_ref().map(|d| d.as_str().to_owned());
    let sql = format!("{} {where_clause}", post_view_select());

    let raws: Vec<RawPostView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = std::iter::once(&viewer as &dyn rusqlite::ToSql)
          .chain(args.iter().map(|a| a as &dyn rusqlite::ToSql))
          .collect();
        let rows = stmt
          .query_map(params.as_slice(), RawPostView::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPostView::into_view).collect()
  }

  async fn soft_delete_in(&self, collection: Collection, author_did: &Did, rkey: &Rkey) -> Result<bool> {
    let did = author_did.clone();
    let rkey = rkey.clone();
    let changed = self
      .conn
      .call(move |conn| Ok(soft_delete(conn, collection, &did, &rkey)?))
      .await?;
    Ok(changed)
  }
}

// ─── MirrorStore impl ────────────────────────────────────────────────────────

impl MirrorStore for SqliteStore {
  type Error = Error;

  // ── Creates ───────────────────────────────────────────────────────────────

  async fn create_post(&self, input: NewPost) -> Result<Post> {
    let (did, rkey) = (input.author_did.clone(), input.rkey.clone());
    self
      .conn
      .call(move |conn| Ok(insert_post(conn, &input)?))
      .await
      .map_err(|e| duplicate_or_database(e, Collection::Post, &did, &rkey))
  }

  async fn create_comment(&self, input: NewComment) -> Result<Comment> {
    let (did, rkey, post) = (input.author_did.clone(), input.rkey.clone(), input.post.clone());
    self
      .conn
      .call(move |conn| Ok(insert_comment(conn, &input)?))
      .await
      .map_err(|e| duplicate_or_database(e, Collection::Comment, &did, &rkey))?
      .ok_or(Error::SubjectNotFound(post))
  }

  async fn create_vote(&self, input: NewVote) -> Result<Vote> {
    let (did, rkey, subject) =
      (input.author_did.clone(), input.rkey.clone(), input.subject.clone());
    self
      .conn
      .call(move |conn| Ok(insert_vote(conn, &input)?))
      .await
      .map_err(|e| duplicate_or_database(e, Collection::Vote, &did, &rkey))?
      .ok_or(Error::SubjectNotFound(subject))
  }

  // ── Soft deletes ──────────────────────────────────────────────────────────

  async fn soft_delete_post(&self, author_did: &Did, rkey: &Rkey) -> Result<bool> {
    self.soft_delete_in(Collection::Post, author_did, rkey).await
  }

  async fn soft_delete_comment(&self, author_did: &Did, rkey: &Rkey) -> Result<bool> {
    self.soft_delete_in(Collection::Comment, author_did, rkey).await
  }

  async fn soft_delete_vote(&self, author_did: &Did, rkey: &Rkey) -> Result<bool> {
    self.soft_delete_in(Collection::Vote, author_did, rkey).await
  }

  // ── Offset ledger ─────────────────────────────────────────────────────────

  async fn record_offset(&self, offset: Offset) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(insert_offset(conn, offset)?))
      .await
      .map_err(|e| match e {
        tokio_rusqlite::Error::Rusqlite(ref inner) if is_unique_violation(inner) => {
          Error::AlreadyConsumed(offset)
        }
        other => Error::Database(other),
      })
  }

  async fn is_consumed(&self, offset: Offset) -> Result<bool> {
    Ok(self.conn.call(move |conn| Ok(offset_recorded(conn, offset)?)).await?)
  }

  async fn apply_event(&self, event: &MirrorEvent) -> Result<ApplyOutcome> {
    let event = event.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        // Dropping `tx` without committing rolls the unit of work back.
        let tx = conn.transaction()?;

        if offset_recorded(&tx, event.offset)? {
          return Ok(ApplyOutcome::AlreadyConsumed);
        }

        let applied = match apply_mutation(&tx, &event) {
          Ok(Ok(applied)) => applied,
          Ok(Err(rejection)) => return Ok(ApplyOutcome::Rejected(rejection)),
          Err(e) if is_unique_violation(&e) => {
            return Ok(ApplyOutcome::Rejected(Rejection::DuplicateKey));
          }
          Err(e) => return Err(e.into()),
        };

        match insert_offset(&tx, event.offset) {
          Ok(()) => {}
          Err(e) if is_unique_violation(&e) => return Ok(ApplyOutcome::AlreadyConsumed),
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(ApplyOutcome::Applied(applied))
      })
      .await?;

    Ok(outcome)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_post(
    &self,
    author_did: &Did,
    rkey: &Rkey,
    ctx: &ViewerContext,
  ) -> Result<Option<PostView>> {
    let mut views = self
      .query_post_views(
        "WHERE p.author_did = ?2 AND p.rkey = ?3",
        vec![author_did.as_str().to_owned(), rkey.as_str().to_owned()],
        ctx,
      )
      .await?;
    Ok(views.pop())
  }

  async fn get_user_posts(&self, author_did: &Did, ctx: &ViewerContext) -> Result<Vec<PostView>> {
    self
      .query_post_views(
        "WHERE p.author_did = ?2 AND p.status = 'live' ORDER BY p.created_at DESC, p.id DESC",
        vec![author_did.as_str().to_owned()],
        ctx,
      )
      .await
  }

  async fn get_post_comments(&self, author_did: &Did, rkey: &Rkey) -> Result<Vec<CommentView>> {
    let did_str = author_did.as_str().to_owned();
    let rkey_str = rkey.as_str().to_owned();

    let raws: Vec<RawCommentView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.id, c.post_id, c.author_did, c.rkey, c.cid, c.content, c.created_at,
                  c.status, p.author_did, p.rkey
           FROM comments c
           JOIN posts p ON p.id = c.post_id
           WHERE p.author_did = ?1 AND p.rkey = ?2 AND c.status = 'live'
           ORDER BY c.created_at ASC, c.id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![did_str, rkey_str], |row| {
            Ok(RawCommentView {
              comment:         RawComment {
                id:         row.get(0)?,
                post_id:    row.get(1)?,
                author_did: row.get(2)?,
                rkey:       row.get(3)?,
                cid:        row.get(4)?,
                content:    row.get(5)?,
                created_at: row.get(6)?,
                status:     row.get(7)?,
              },
              post_author_did: row.get(8)?,
              post_rkey:       row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCommentView::into_view).collect()
  }

  async fn get_user_counts(&self, author_did: &Did) -> Result<UserCounts> {
    let did_str = author_did.as_str().to_owned();

    let (posts, comments, votes): (i64, i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM posts    WHERE author_did = ?1 AND status = 'live'),
             (SELECT COUNT(*) FROM comments WHERE author_did = ?1 AND status = 'live'),
             (SELECT COUNT(*) FROM votes    WHERE author_did = ?1 AND status = 'live')",
          rusqlite::params![did_str],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?)
      })
      .await?;

    Ok(UserCounts {
      posts:    decode_count(posts),
      comments: decode_count(comments),
      votes:    decode_count(votes),
    })
  }

  async fn live_posts(&self, ctx: &ViewerContext) -> Result<Vec<PostView>> {
    self
      .query_post_views("WHERE p.status = 'live' ORDER BY p.id ASC", Vec::new(), ctx)
      .await
  }
}
