//! Applies the schema migrations in `./migrations` to the registry
//! database.

use std::env;
use std::process;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{crit, debug, info, initialize_logger, Logger};

const CONNECTION_STRING_VARIABLE: &str = "REGISTRY_DB_CONNECTION_STRING";
const MIGRATIONS_DIR: &str = "./migrations";

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    if let Err(message) = run(&logger) {
        crit!(logger, "Failed to initialize database"; "error" => %message);
        // the async drain flushes on drop
        drop(logger);
        process::exit(1);
    }
}

fn run(logger: &Logger) -> Result<(), String> {
    let connection_string = env::var(CONNECTION_STRING_VARIABLE)
        .map_err(|_| format!("must define {} environment variable", CONNECTION_STRING_VARIABLE))?;

    debug!(logger, "Connecting to database...");
    let mut client = Client::connect(&connection_string, NoTls)
        .map_err(|e| format!("could not connect to database: {}", e))?;

    let mut movine = Movine::new(&mut client);
    movine.set_migration_dir(MIGRATIONS_DIR);
    movine.set_strict(true);

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");
        movine
            .initialize()
            .map_err(|e| format!("failed to initialize movine: {}", e))?;
    }

    debug!(logger, "Running migrations..."; "dir" => MIGRATIONS_DIR);
    movine
        .up()
        .map_err(|e| format!("failed to run migrations: {}", e))?;

    info!(logger, "Completed initialization."; "application" => info::NAME, "version" => info::VERSION);

    Ok(())
}
