use serde::Serialize;
use serde_json::json as value;
use time::OffsetDateTime;
use warp::filters::BoxedFilter;
use warp::path::end;
use warp::reply::{json, Reply};
use warp::{get as g, path as p, Filter};

use crate::environment::Environment;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
    database: &'static str,
    environment: &'static str,
    version: &'static str,
}

/// `GET /api/health`: reports liveness and whether the store answers.
pub fn make_health_route(environment: Environment) -> BoxedFilter<(Box<dyn Reply>,)> {
    p("api")
        .and(p("health"))
        .and(end())
        .and(g())
        .and(warp::any().map(move || environment.clone()))
        .and_then(health)
        .boxed()
}

async fn health(environment: Environment) -> Result<Box<dyn Reply>, warp::Rejection> {
    let database = match environment.db.ping().await {
        Ok(()) => "Connected",
        Err(_) => "Disconnected",
    };

    let health = Health {
        status: "OK",
        timestamp: OffsetDateTime::now_utc().format("%Y-%m-%dT%H:%M:%SZ"),
        database,
        environment: environment.config.mode.as_str(),
        version: info::VERSION,
    };

    Ok(Box::new(json(&health)))
}

/// `GET /api`: describes the service and its endpoints.
pub fn make_info_route() -> BoxedFilter<(Box<dyn Reply>,)> {
    p("api")
        .and(end())
        .and(g())
        .map(|| {
            let info = value!({
                "message": info::NAME,
                "version": info::VERSION,
                "endpoints": {
                    "records": {
                        "list": "GET /api/records",
                        "create": "POST /api/records",
                        "retrieve": "GET /api/records/:id",
                        "update": "PATCH /api/records/:id",
                        "delete": "DELETE /api/records/:id",
                    },
                    "system": {
                        "health": "GET /api/health",
                        "info": "GET /api",
                    },
                },
            });

            Box::new(json(&info)) as Box<dyn Reply>
        })
        .boxed()
}
