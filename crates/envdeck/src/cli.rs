use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shared::error::CommonError;

use crate::server::{BootstrapParams, ServeParams, bootstrap, serve};

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the envdeck API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1", env = "ENVDECK_HOST")]
        host: String,
        /// Port to bind to
        #[arg(long, default_value_t = 8080, env = "ENVDECK_PORT")]
        port: u16,
        /// Path to the SQLite database file
        #[arg(long, default_value = "envdeck.db", env = "ENVDECK_DB_PATH")]
        db_path: PathBuf,
    },
    /// Create the first admin user and print an access token
    Bootstrap {
        /// Name for the admin user
        #[arg(long, default_value = "admin")]
        name: String,
        /// Path to the SQLite database file
        #[arg(long, default_value = "envdeck.db", env = "ENVDECK_DB_PATH")]
        db_path: PathBuf,
    },
    /// Print the OpenAPI spec as JSON
    Openapi,
    /// Show envdeck version
    Version,
}

fn log_error_chain(err: &(dyn Error)) {
    let mut current: Option<&(dyn Error)> = Some(err);

    while let Some(e) = current {
        eprintln!("Caused by: {e}");
        current = e.source();
    }
}

fn handle_error(err: &CommonError) {
    eprintln!("Error: {err}");
    log_error_chain(&err);
    ::std::process::exit(1);
}

pub async fn run_cli(cli: Cli) -> Result<(), anyhow::Error> {
    let cmd_res = match cli.command {
        Commands::Serve {
            host,
            port,
            db_path,
        } => {
            serve(ServeParams {
                host,
                port,
                db_path,
            })
            .await
        }
        Commands::Bootstrap { name, db_path } => bootstrap(BootstrapParams { name, db_path }).await,
        Commands::Openapi => {
            let spec = envdeck_api_server::router::generate_openapi_spec();
            match serde_json::to_string_pretty(&spec) {
                Ok(json) => {
                    println!("{json}");
                    Ok(())
                }
                Err(e) => Err(CommonError::from(e)),
            }
        }
        Commands::Version => {
            println!("envdeck version: {CLI_VERSION}");
            Ok(())
        }
    };

    if let Err(e) = cmd_res {
        handle_error(&e);
    }
    Ok(())
}
