mod app;
mod auth;
mod chat;
mod config;
mod error;
mod limits;
mod llm;
mod matcher;
mod profiles;
mod scans;
mod settings;
mod state;
mod storage;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "caneatthis=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;
    tracing::info!(
        default_model = %app_state.config.llm.default_model,
        max_scans = app_state.config.scans.max_scans_per_month,
        "state ready"
    );

    app::serve(app::build_app(app_state)).await
}
