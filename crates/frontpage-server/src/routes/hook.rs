//! `POST /api/receive_hook`: ingestion of feed events.
//!
//! The body is a JSON array of events. An element without an integer offset
//! refuses the whole batch, since there is nothing to report it against.
//! Anything else is handed to the single consumer, which rejects malformed
//! events one by one.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use frontpage_core::{
  consumer::{BatchReport, Halt},
  event::Delivered,
  store::MirrorStore,
};
use tracing::info;

use crate::{AppState, auth::HookAuthorized, error::Error};

pub async fn receive<S>(
  State(state): State<AppState<S>>,
  _auth: HookAuthorized,
  Json(body): Json<Vec<serde_json::Value>>,
) -> Result<Response, Error>
where
  S: MirrorStore + 'static,
{
  let events = body
    .into_iter()
    .enumerate()
    .map(|(index, value)| {
      Delivered::from_value(value).map_err(|reason| Error::MalformedEvent { index, reason })
    })
    .collect::<Result<Vec<_>, _>>()?;

  let received = events.len();
  let report = {
    let mut consumer = state.consumer.lock().await;
    consumer.process_batch(events).await
  };

  info!(
    received,
    processed = report.outcomes.len(),
    halted = report.halted.is_some(),
    "hook batch handled"
  );

  Ok((status_for(&report), Json(report)).into_response())
}

fn status_for(report: &BatchReport) -> StatusCode {
  match report.halted {
    None => StatusCode::OK,
    Some(Halt::Fatal { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}
