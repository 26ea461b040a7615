//! init.rs
//!
//! load .env and start tracing; call once at the top of main()

use std::path::Path;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// `manifest_dir` is where the .env lives; pass env!("CARGO_MANIFEST_DIR") from the binary
pub fn init(manifest_dir: &str) {
    // a missing .env is fine; the variables may come from docker run -e
    let env_path = Path::new(manifest_dir).join(".env");
    let env_result = dotenvy::from_path(&env_path).or_else(|_| dotenvy::dotenv().map(|_| ()));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    match env_result {
        Ok(_) => tracing::debug!("[init] loaded environment"),
        Err(e) => tracing::debug!("[init] no .env loaded ({:?}); using process environment", &e),
    }
}
