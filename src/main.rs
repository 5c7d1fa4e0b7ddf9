use podium::{config::create_app, state::build_pool};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| ":memory:".to_string());
    tracing::info!(%db_url, "starting up");

    let pool = build_pool(&db_url);
    let app = create_app(pool);

    let addr = std::env::var("PODIUM_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.expect("server error");
}
