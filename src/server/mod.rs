// Web服务器模块

pub mod handlers;
pub mod state;

pub use state::{AppState, BucketRefresher, CommittedObject, SessionObserver};

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// 构建完整路由
pub fn build_router(app_state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // 上传队列API
        .route(
            "/uploads",
            get(handlers::get_uploads).post(handlers::create_uploads),
        )
        .route("/uploads/overwrite", post(handlers::confirm_overwrite))
        .route("/uploads/cancel", post(handlers::cancel_overwrite))
        .route("/uploads/history", delete(handlers::clear_history))
        // 本次会话写入的对象与桶信息
        .route("/objects", get(handlers::get_committed_objects))
        .route("/bucket", get(handlers::get_bucket));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware)
        .with_state(app_state)
}
