use estimate_engine::config::StorageBackend;
use estimate_engine::store::sample;
use estimate_engine::{api, create_pool, db, AppConfig, EstimateService, EstimateStore, MemoryStore, PgStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    let store: Arc<dyn EstimateStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database).await?;
            info!("Database pool created");
            db::run_migrations(&pool).await?;
            info!("Migrations applied");
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            let store = MemoryStore::new();
            sample::seed(&store);
            info!("Using in-memory store with sample catalog");
            Arc::new(store)
        }
    };

    let service = Arc::new(EstimateService::new(store, config.estimation.clone()));
    let app = api::router(service);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/estimates                               - generate estimate");
    info!("  POST /api/estimates/:id/optimize                  - generate substitutions");
    info!("  POST /api/estimates/:id/substitutions/:sid/apply  - apply substitution");
    info!("  GET  /api/catalog/:kind/:id/price                 - current market price");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
