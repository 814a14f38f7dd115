use receipt_tracker::{config, db, logging, server, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (embedded defaults -> .env -> environment)
    let app_cfg = config::load()?;

    // Guards must outlive the server so buffered log lines get flushed
    let _log_guards = logging::init(&app_cfg.logging, app_cfg.env)?;
    logging::install_panic_hook();

    let pool = db::connect_lazy(&app_cfg.database)?;
    let state = AppState::new(app_cfg, pool);

    if let Err(e) = server::serve(state).await {
        tracing::error!("Server stopped with error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
