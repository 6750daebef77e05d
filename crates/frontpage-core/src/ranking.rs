//! Front-page ranking.
//!
//! `score = votes / (hours_since_created + 2) ^ 1.8`
//!
//! The score is a function of "now", so it is recomputed on every query and
//! never stored.

use chrono::{DateTime, Utc};

use crate::mirror::{PostView, RankedPost, floored_vote_count};

/// Exponent applied to the age term.
pub const GRAVITY: f64 = 1.8;

/// Hours added to every post's age so new posts do not spike.
pub const AGE_OFFSET_HOURS: f64 = 2.0;

/// Fractional hours from `created_at` to `now`. A `created_at` in the future
/// (the timestamp is author-claimed) counts as zero.
pub fn hours_since(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
  let ms = (now - created_at).num_milliseconds().max(0);
  ms as f64 / 3_600_000.0
}

pub fn score(vote_count: u64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
  let votes = floored_vote_count(vote_count) as f64;
  votes / (hours_since(created_at, now) + AGE_OFFSET_HOURS).powf(GRAVITY)
}

/// Score and order `views`, highest first. The sort is stable, so equal
/// scores keep their input order.
pub fn rank(views: Vec<PostView>, now: DateTime<Utc>, limit: Option<usize>) -> Vec<RankedPost> {
  let mut ranked: Vec<RankedPost> = views
    .into_iter()
    .map(|view| {
      let score = score(view.vote_count, view.post.created_at, now);
      RankedPost { view, score }
    })
    .collect();

  ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
  if let Some(limit) = limit {
    ranked.truncate(limit);
  }
  ranked
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::{
    ident::{Did, Rkey},
    mirror::Post,
    record::RecordStatus,
  };

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() }

  fn view(id: i64, votes: u64, age: Duration) -> PostView {
    PostView {
      post:             Post {
        id,
        author_did: Did::parse("did:plc:abc123").unwrap(),
        rkey: Rkey::parse(&format!("r{id}")).unwrap(),
        cid: "bafy".into(),
        title: format!("post {id}"),
        url: "https://example.com".into(),
        created_at: now() - age,
        status: RecordStatus::Live,
      },
      comment_count:    0,
      vote_count:       votes,
      viewer_has_voted: false,
    }
  }

  #[test]
  fn brand_new_single_vote_post_scores_two_to_the_minus_gravity() {
    let s = score(1, now(), now());
    assert!((s - 2f64.powf(-GRAVITY)).abs() < 1e-12);
  }

  #[test]
  fn younger_post_wins_at_equal_votes() {
    let young = score(5, now() - Duration::minutes(30), now());
    let old = score(5, now() - Duration::hours(5), now());
    assert!(young > old);
  }

  #[test]
  fn more_votes_win_at_equal_age() {
    let created = now() - Duration::hours(3);
    assert!(score(7, created, now()) > score(6, created, now()));
  }

  #[test]
  fn zero_votes_score_like_one() {
    let created = now() - Duration::hours(1);
    assert_eq!(score(0, created, now()), score(1, created, now()));
  }

  #[test]
  fn future_timestamps_count_as_zero_age() {
    assert_eq!(hours_since(now() + Duration::hours(3), now()), 0.0);
    assert!(score(1, now() + Duration::hours(3), now()).is_finite());
  }

  #[test]
  fn rank_orders_by_score_and_truncates() {
    let views = vec![
      view(1, 1, Duration::hours(20)),
      view(2, 10, Duration::hours(1)),
      view(3, 1, Duration::minutes(5)),
    ];
    let ranked = rank(views, now(), Some(2));
    let ids: Vec<_> = ranked.iter().map(|r| r.view.post.id).collect();
    assert_eq!(ids, vec![2, 3]);
    assert!(ranked[0].score > ranked[1].score);
  }

  #[test]
  fn old_popular_post_eventually_loses_to_fresh_one() {
    let views = vec![view(1, 50, Duration::days(7)), view(2, 1, Duration::zero())];
    let ranked = rank(views, now(), None);
    assert_eq!(ranked[0].view.post.id, 2);
  }
}
