use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use log::{crit, info, initialize_logger, warn};
use registry::config::Settings;
use registry::db::{Db, PgDb};
use registry::environment::{Config, Environment};
use registry::routes;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            crit!(logger, "Invalid configuration"; "error" => %e);
            return Err(e.into());
        }
    };

    info!(logger, "Starting..."; "port" => settings.port, "environment" => %settings.mode, "public_dir" => %settings.public_dir.display());
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let pool = PgPoolOptions::new()
        .connect_timeout(CONNECT_TIMEOUT)
        .connect_lazy(&settings.connection_string)?;
    let db = Arc::new(PgDb::new(pool));

    // the server still starts without a database; health reports it
    match db.ping().await {
        Ok(()) => info!(logger, "Connected to database"),
        Err(e) => warn!(logger, "Could not reach database"; "error" => %e, "source" => ?e),
    }

    let config = Config::new(settings.mode, settings.public_dir);
    let environment = Environment::new(logger.clone(), db, config);

    let shutdown = {
        let logger = logger.clone();

        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(logger, "Could not listen for shutdown signal"; "error" => %e);
                futures::future::pending::<()>().await;
            }
        }
    };

    let (address, server) = warp::serve(routes::make_routes(environment))
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], settings.port), shutdown)?;

    info!(logger, "Listening..."; "address" => %address);

    server.await;

    info!(logger, "Exiting gracefully...");

    Ok(())
}
