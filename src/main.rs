use push_deploy::config::Config;
use push_deploy::logging::{FileLogger, setup_logging};
use push_deploy::{AppState, api};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let file_logger = config.log_dir.clone().map(FileLogger::new);
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::from_config(&config));
    let app = api::router(state);

    let bind_address = config.server_address();
    info!("Listening on {}", bind_address);
    info!("Using project file at {:?}", config.project_file_path());
    if config.signature_check_enabled() {
        info!("Webhook signature checking is enabled");
    } else {
        warn!("Webhook signature checking is disabled; every request is trusted");
    }
    if config.dry_run {
        warn!("[DRY_RUN] Matched scripts will be logged, not run");
    }

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
