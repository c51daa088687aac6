use std::convert::Infallible;

use log::{error, info, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, Reply, WithStatus};
use warp::Filter;

use crate::environment::Environment;
use crate::errors::RegistryError;

mod handlers;
mod rejection;
mod response;
pub mod system;

use self::response::FailureResponse;

pub use internal::*;

/// The largest request body to accept.
const MAX_CONTENT_LENGTH: u64 = 10 * 1024 * 1024;

/// Turns a handler failure into its JSON response. Anything that isn’t
/// a handler failure is passed on so that later routes get a chance.
pub async fn format_rejection(
    environment: Environment,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    let logger = &environment.logger;

    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Registry error"; "context" => ?r.context, "error" => ?e, "status" => %status, "message" => %e);
        } else {
            warn!(logger, "Request refused"; "context" => ?r.context, "error" => ?e, "status" => %status, "message" => %e);
        }

        let flattened = r.flatten(environment.config.exposes_errors());

        return Ok(with_status(json(&flattened), status));
    }

    if rej.find::<reject::PayloadTooLarge>().is_some() {
        warn!(logger, "Request body too large"; "limit" => MAX_CONTENT_LENGTH);

        return Ok(with_status(
            json(&FailureResponse::new("Request body too large")),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }

    if rej.find::<reject::LengthRequired>().is_some() {
        return Ok(with_status(
            json(&FailureResponse::new("Content-Length header required")),
            StatusCode::LENGTH_REQUIRED,
        ));
    }

    Err(rej)
}

/// The last resort for requests no route could answer.
pub async fn format_unmatched(
    environment: Environment,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, Infallible> {
    if rej.is_not_found() {
        return Ok(with_status(
            json(&FailureResponse::new("Not found")),
            StatusCode::NOT_FOUND,
        ));
    }

    if rej.find::<reject::MethodNotAllowed>().is_some() {
        return Ok(with_status(
            json(&FailureResponse::new("Method not allowed")),
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }

    error!(environment.logger, "Unhandled rejection"; "rejection" => ?rej);

    let response = FailureResponse::new("Something went wrong!");
    let response = if environment.config.exposes_errors() {
        response.with_error(format!("{:?}", rej))
    } else {
        response
    };

    Ok(with_status(json(&response), StatusCode::INTERNAL_SERVER_ERROR))
}

fn status_code_for(e: &RegistryError) -> StatusCode {
    use RegistryError::*;

    match e {
        Validation(..) | Duplicate(..) | MalformedBody(..) => StatusCode::BAD_REQUEST,
        NonExistentId(..) | InvalidId(..) => StatusCode::NOT_FOUND,
        Sqlx { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Assembles the whole server: the records API, the system endpoints,
/// and the client assets.
pub fn make_routes(environment: Environment) -> BoxedFilter<(Box<dyn Reply>,)> {
    let recover_environment = environment.clone();
    let unmatched_environment = environment.clone();
    let logger = environment.logger.clone();

    let api = make_list_route(environment.clone())
        .or(make_create_route(environment.clone()))
        .unify()
        .or(make_retrieve_route(environment.clone()))
        .unify()
        .or(make_update_route(environment.clone()))
        .unify()
        .or(make_delete_route(environment.clone()))
        .unify()
        .or(system::make_health_route(environment.clone()))
        .unify()
        .or(system::make_info_route())
        .unify()
        .recover(move |r| format_rejection(recover_environment.clone(), r));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .allow_header("content-type");

    let log = warp::log::custom(move |request: warp::log::Info| {
        info!(logger, "Request";
            "method" => %request.method(),
            "path" => request.path(),
            "status" => request.status().as_u16(),
            "elapsed_ms" => request.elapsed().as_millis() as u64
        );
    });

    api.or(make_api_not_found_route())
        .or(make_assets_route(environment))
        .recover(move |r| format_unmatched(unmatched_environment.clone(), r))
        .with(cors)
        .with(log)
        .map(|reply| Box::new(reply) as Box<dyn Reply>)
        .boxed()
}

mod internal {
    use warp::filters::BoxedFilter;
    use warp::http::StatusCode;
    use warp::path::end;
    use warp::reply::{json, with_status};
    use warp::Filter;
    use warp::Reply;
    use warp::{
        body::{bytes, content_length_limit},
        delete, get as g, patch, path as p,
        path::param as par,
        post,
    };

    use super::{handlers, response::FailureResponse, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
        ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
        ($route_variable:ident; $first:expr, $($rest:expr),+) => (
            let $route_variable = $route_variable.and($first);
            route_filter!($route_variable; $($rest),+);
        )
    }

    macro_rules! route {
        ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
            pub fn $name(environment: Environment) -> Route {
                let $route_variable = warp::any()
                    .map(move || environment.clone())
                    .and(p("api"))
                    .and(p("records"));

                route_filter!($route_variable; $($filters),+);

                $route_variable.and_then(handlers::$handler)
                    .boxed()
            }
        );
    }

    route!(make_list_route => list, rt; end(), g());
    route!(make_create_route => create, rt; end(), post(), content_length_limit(MAX_CONTENT_LENGTH), bytes());
    route!(make_retrieve_route => retrieve, rt; par::<String>(), end(), g());
    route!(make_update_route => update, rt; par::<String>(), end(), patch(), content_length_limit(MAX_CONTENT_LENGTH), bytes());
    route!(make_delete_route => delete, rt; par::<String>(), end(), delete());

    /// Any other path under `/api`, whatever the method.
    pub fn make_api_not_found_route() -> Route {
        p("api")
            .map(|| {
                Box::new(with_status(
                    json(&FailureResponse::new("API endpoint not found")),
                    StatusCode::NOT_FOUND,
                )) as Box<dyn Reply>
            })
            .boxed()
    }

    /// Serves the client from the public directory. Unknown paths get
    /// `index.html` so that the client can handle them.
    pub fn make_assets_route(environment: Environment) -> Route {
        let public_dir = environment.config.public_dir.clone();
        let index = public_dir.join("index.html");

        g().and(warp::fs::dir(public_dir))
            .or(g().and(warp::fs::file(index)))
            .unify()
            .map(|file| Box::new(file) as Box<dyn Reply>)
            .boxed()
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::Arc;

    use serde_json::{json, Value};
    use tempfile::TempDir;
    use bytes::Bytes;
    use warp::http::Response;

    use super::*;
    use crate::db::mock::MockDb;
    use crate::environment::{Config, Mode};

    struct Fixture {
        db: Arc<MockDb>,
        routes: BoxedFilter<(Box<dyn Reply>,)>,
        _public_dir: TempDir,
    }

    fn fixture(mode: Mode) -> Fixture {
        let public_dir = tempfile::tempdir().unwrap();
        fs::write(public_dir.path().join("index.html"), "<!doctype html><title>Registry</title>").unwrap();

        let db = Arc::new(MockDb::new());
        let environment = Environment::new(
            Arc::new(log::discard()),
            db.clone(),
            Config::new(mode, public_dir.path()),
        );

        Fixture {
            db,
            routes: make_routes(environment),
            _public_dir: public_dir,
        }
    }

    fn ali() -> Value {
        json!({
            "username": "Ali Hassan",
            "phoneNumber": "01012345678",
            "birthDate": "1990-05-15",
            "gender": "male",
            "carNumber": "12345",
            "carType": "Toyota Corolla",
        })
    }

    fn sara() -> Value {
        json!({
            "username": "Sara",
            "phoneNumber": "+201112345678",
            "birthDate": "1995-02-01",
            "gender": "female",
            "carNumber": "777",
            "carType": "Kia Rio",
        })
    }

    async fn send(fixture: &Fixture, method: &str, path: &str, body: Option<&Value>) -> Response<Bytes> {
        let request = warp::test::request().method(method).path(path);

        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(serde_json::to_vec(body).unwrap()),
            None => request,
        };

        request.reply(&fixture.routes).await
    }

    fn body(response: &Response<Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    async fn create(fixture: &Fixture, record: &Value) -> String {
        let response = send(fixture, "POST", "/api/records", Some(record)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        body(&response)["data"]["id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn creating_returns_the_stored_record() {
        let fixture = fixture(Mode::Production);

        let response = send(&fixture, "POST", "/api/records", Some(&ali())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key("server-timing"));

        let body = body(&response);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Record created successfully");
        assert_eq!(body["data"]["username"], "Ali Hassan");
        assert_eq!(body["data"]["birthDate"], "1990-05-15");
        assert!(body["data"]["createdAt"].is_i64());
        assert_eq!(fixture.db.len(), 1);
    }

    #[tokio::test]
    async fn input_is_trimmed_before_storing() {
        let fixture = fixture(Mode::Production);
        let mut record = ali();
        record["username"] = json!("  Ali Hassan  ");

        let response = send(&fixture, "POST", "/api/records", Some(&record)).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(&response)["data"]["username"], "Ali Hassan");
    }

    #[tokio::test]
    async fn birth_dates_with_trailing_text_are_refused() {
        let fixture = fixture(Mode::Production);

        for birth_date in &[
            "1990-05-15 is my birthday",
            "1990-01-01abc",
            "1990-01-01T",
            "1990-01-01Tgarbage",
            "90-01-01",
        ] {
            let mut record = ali();
            record["birthDate"] = json!(birth_date);

            let response = send(&fixture, "POST", "/api/records", Some(&record)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", birth_date);

            let body = body(&response);
            assert_eq!(body["message"], "Validation failed");
            assert_eq!(body["errors"][0]["path"], "birthDate");
            assert_eq!(body["errors"][0]["msg"], "Please enter a valid birth date");
        }

        assert!(fixture.db.is_empty());
    }

    #[tokio::test]
    async fn numeric_car_numbers_are_stored_as_text() {
        let fixture = fixture(Mode::Production);
        let mut record = ali();
        record["carNumber"] = json!(12345);

        let response = send(&fixture, "POST", "/api/records", Some(&record)).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(&response)["data"]["carNumber"], "12345");
    }

    #[tokio::test]
    async fn duplicate_phone_numbers_are_refused() {
        let fixture = fixture(Mode::Production);
        create(&fixture, &ali()).await;

        let mut record = sara();
        record["phoneNumber"] = json!("01012345678");
        let response = send(&fixture, "POST", "/api/records", Some(&record)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body(&response);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Phone number already exists");
        assert_eq!(body["errors"][0]["path"], "phoneNumber");
        assert_eq!(fixture.db.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_car_numbers_are_refused() {
        let fixture = fixture(Mode::Production);
        create(&fixture, &ali()).await;

        let mut record = sara();
        record["carNumber"] = json!("12345");
        let response = send(&fixture, "POST", "/api/records", Some(&record)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body(&response);
        assert_eq!(body["message"], "Car number already exists");
        assert_eq!(body["errors"][0]["path"], "carNumber");
    }

    #[tokio::test]
    async fn invalid_fields_are_all_reported() {
        let fixture = fixture(Mode::Production);
        let mut record = ali();
        record["birthDate"] = json!("2999-01-01");
        record["gender"] = json!("other");

        let response = send(&fixture, "POST", "/api/records", Some(&record)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body(&response);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0]["path"], "birthDate");
        assert_eq!(body["errors"][0]["msg"], "Birth date must be in the past");
        assert_eq!(body["errors"][1]["path"], "gender");
        assert!(fixture.db.is_empty());
    }

    #[tokio::test]
    async fn malformed_bodies_are_refused() {
        let fixture = fixture(Mode::Production);

        let response = warp::test::request()
            .method("POST")
            .path("/api/records")
            .header("content-type", "application/json")
            .body("{ not json")
            .reply(&fixture.routes)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["message"], "Malformed request body");
    }

    #[tokio::test]
    async fn listing_puts_the_newest_first() {
        let fixture = fixture(Mode::Production);
        let first = create(&fixture, &ali()).await;
        let second = create(&fixture, &sara()).await;

        let response = send(&fixture, "GET", "/api/records", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body(&response);
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["id"], second.as_str());
        assert_eq!(body["data"][1]["id"], first.as_str());
    }

    #[tokio::test]
    async fn listing_an_empty_store() {
        let fixture = fixture(Mode::Production);

        let response = send(&fixture, "GET", "/api/records", None).await;

        let body = body(&response);
        assert_eq!(body["count"], 0);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn retrieving_missing_or_malformed_ids() {
        let fixture = fixture(Mode::Production);
        let id = create(&fixture, &ali()).await;

        let response = send(&fixture, "GET", &format!("/api/records/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["data"]["carNumber"], "12345");

        let missing = uuid::Uuid::new_v4();
        let response = send(&fixture, "GET", &format!("/api/records/{}", missing), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["message"], "Record not found");
        assert_eq!(body(&response)["id"], missing.to_string());

        let response = send(&fixture, "GET", "/api/records/not-an-id", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn partial_updates_keep_other_fields() {
        let fixture = fixture(Mode::Production);
        let id = create(&fixture, &ali()).await;

        let patch = json!({ "carType": "Hyundai Elantra" });
        let response = send(&fixture, "PATCH", &format!("/api/records/{}", id), Some(&patch)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body(&response);
        assert_eq!(body["message"], "Record updated successfully");
        assert_eq!(body["data"]["carType"], "Hyundai Elantra");
        assert_eq!(body["data"]["phoneNumber"], "01012345678");
    }

    #[tokio::test]
    async fn updates_are_validated_and_checked_for_duplicates() {
        let fixture = fixture(Mode::Production);
        let id = create(&fixture, &ali()).await;
        create(&fixture, &sara()).await;

        let patch = json!({ "phoneNumber": "12345" });
        let response = send(&fixture, "PATCH", &format!("/api/records/{}", id), Some(&patch)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["errors"][0]["path"], "phoneNumber");

        let patch = json!({ "carNumber": "777" });
        let response = send(&fixture, "PATCH", &format!("/api/records/{}", id), Some(&patch)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["message"], "Car number already exists");
    }

    #[tokio::test]
    async fn updating_a_missing_record_changes_nothing() {
        let fixture = fixture(Mode::Production);
        create(&fixture, &ali()).await;

        let path = format!("/api/records/{}", uuid::Uuid::new_v4());
        let response = send(&fixture, "PATCH", &path, Some(&sara())).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(fixture.db.len(), 1);
    }

    #[tokio::test]
    async fn deleting_twice() {
        let fixture = fixture(Mode::Production);
        let id = create(&fixture, &ali()).await;
        let path = format!("/api/records/{}", id);

        let response = send(&fixture, "DELETE", &path, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response),
            json!({ "success": true, "message": "Record deleted successfully" })
        );

        let response = send(&fixture, "DELETE", &path, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(fixture.db.is_empty());
    }

    #[tokio::test]
    async fn store_failures_hide_details_in_production() {
        let fixture = fixture(Mode::Production);
        fixture.db.set_available(false);

        let response = send(&fixture, "GET", "/api/records", None).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&response);
        assert_eq!(body["message"], "Error fetching records");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn store_failures_show_details_in_development() {
        let fixture = fixture(Mode::Development);
        fixture.db.set_available(false);

        let response = send(&fixture, "POST", "/api/records", Some(&ali())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&response);
        assert_eq!(body["message"], "Error creating record");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn health_reports_the_store() {
        let fixture = fixture(Mode::Development);

        let response = send(&fixture, "GET", "/api/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let health = body(&response);
        assert_eq!(health["status"], "OK");
        assert_eq!(health["database"], "Connected");
        assert_eq!(health["environment"], "development");

        fixture.db.set_available(false);
        let response = send(&fixture, "GET", "/api/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["database"], "Disconnected");
    }

    #[tokio::test]
    async fn info_lists_the_endpoints() {
        let fixture = fixture(Mode::Production);

        let response = send(&fixture, "GET", "/api", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let info = body(&response);
        assert_eq!(info["message"], info::NAME);
        assert_eq!(info["endpoints"]["records"]["list"], "GET /api/records");
    }

    #[tokio::test]
    async fn unknown_api_paths_are_json_404s() {
        let fixture = fixture(Mode::Production);

        let response = send(&fixture, "GET", "/api/nothing/here", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body(&response),
            json!({ "success": false, "message": "API endpoint not found" })
        );
    }

    #[tokio::test]
    async fn other_paths_get_the_client() {
        let fixture = fixture(Mode::Production);

        for path in &["/", "/records/some/deep/link"] {
            let response = send(&fixture, "GET", path, None).await;

            assert_eq!(response.status(), StatusCode::OK);
            assert!(std::str::from_utf8(response.body()).unwrap().contains("<title>Registry</title>"));
        }
    }
}
