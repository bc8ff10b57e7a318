//! Inbound webhook ingestion.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use futures::FutureExt;

use ironrelay_database::UnitOfWork;
use ironrelay_entity::webhook::NewIncomingWebhook;
use ironrelay_worker::jobs::handle_incoming_request;

use crate::dto::response::IncomingAccepted;
use crate::error::ApiError;
use crate::extractors::parse_json_body;
use crate::state::AppState;

/// POST /ironrelay/incoming/{source}
///
/// Logs the payload, then hands it to the incoming webhook job. The job is
/// enqueued and linked to the log record only once the unit of work commits.
pub async fn receive(
    State(state): State<AppState>,
    Path(source): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<IncomingAccepted>), ApiError> {
    let payload = parse_json_body(&body)?;
    let record = state
        .stores
        .incoming
        .insert(
            NewIncomingWebhook::from_body(source, payload.clone()),
            state.queue.clock().now(),
        )
        .await?;

    let mut uow = UnitOfWork::new();
    let job_id = state.queue.defer(
        &mut uow,
        handle_incoming_request(record.id, &record.event, payload),
    )?;
    let incoming = Arc::clone(&state.stores.incoming);
    let incoming_id = record.id;
    uow.on_commit(move || {
        async move { incoming.set_handler_job(incoming_id, job_id).await }.boxed()
    });
    uow.commit().await?;

    tracing::info!(
        incoming.id = %record.id,
        source = %record.source,
        event = %record.event,
        job.id = %job_id,
        "Incoming webhook received"
    );

    Ok((
        StatusCode::CREATED,
        Json(IncomingAccepted {
            id: record.id,
            status: "received".to_string(),
        }),
    ))
}
