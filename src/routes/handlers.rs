use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, o};
use time::OffsetDateTime;
use uuid::Uuid;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::environment::Environment;
use crate::errors::RegistryError;
use crate::record::RecordPatch;
use crate::routes::{
    rejection::{Context, Rejection},
    response::SuccessResponse,
};
use crate::validation;

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($body:tt)+) => {{
        let start = Instant::now();

        let result = { $($body)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    }};
}

pub async fn list(environment: Environment) -> RouteResult {
    timed! {
        let records = environment
            .db
            .list()
            .await
            .map_err(|e: RegistryError| Rejection::new(Context::list(), e))?;

        debug!(environment.logger, "Listed records"; "count" => records.len());

        json(&SuccessResponse::list(records))
    }
}

pub async fn create(environment: Environment, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: RegistryError| Rejection::new(Context::create(), e);

        let patch = parse_patch(&body).map_err(error_handler)?;
        let details = validation::validate(&patch, OffsetDateTime::now_utc())
            .map_err(RegistryError::Validation)
            .map_err(error_handler)?;

        debug!(environment.logger, "Creating record...");
        let record = environment.db.insert(details).await.map_err(error_handler)?;
        debug!(environment.logger, "Created record"; "id" => %record.id());

        with_status(json(&SuccessResponse::created(record)), StatusCode::CREATED)
    }
}

pub async fn retrieve(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: RegistryError| Rejection::new(Context::retrieve(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Retrieving record..."; "id" => %id);

        let record = environment
            .db
            .retrieve(&id)
            .await
            .map_err(error_handler)?
            .ok_or(RegistryError::NonExistentId(id))
            .map_err(error_handler)?;

        json(&SuccessResponse::found(record))
    }
}

pub async fn update(environment: Environment, id: String, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: RegistryError| Rejection::new(Context::update(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        let logger = environment.logger.new(o!("id" => id.to_string()));
        let patch = parse_patch(&body).map_err(error_handler)?;

        debug!(logger, "Retrieving record to update...");
        let existing = environment
            .db
            .retrieve(&id)
            .await
            .map_err(error_handler)?
            .ok_or(RegistryError::NonExistentId(id))
            .map_err(error_handler)?;

        // every field is validated again, not only the ones that changed
        let merged = patch.overlay(RecordPatch::from(existing.details()));
        let details = validation::validate(&merged, OffsetDateTime::now_utc())
            .map_err(RegistryError::Validation)
            .map_err(error_handler)?;

        debug!(logger, "Updating record...");
        let record = environment.db.update(&id, details).await.map_err(error_handler)?;

        json(&SuccessResponse::updated(record))
    }
}

pub async fn delete(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: RegistryError| Rejection::new(Context::delete(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Deleting record..."; "id" => %id);

        environment.db.delete(&id).await.map_err(error_handler)?;

        json(&SuccessResponse::deleted())
    }
}

fn parse_id(id: &str) -> Result<Uuid, RegistryError> {
    Uuid::parse_str(id).map_err(|_| RegistryError::InvalidId(id.to_owned()))
}

fn parse_patch(body: &[u8]) -> Result<RecordPatch, RegistryError> {
    serde_json::from_slice(body).map_err(RegistryError::MalformedBody)
}

fn format_server_timing(duration: Duration) -> String {
    format!("handler;dur={}", duration.as_secs_f64() * 1000.0)
}
