use bucket_uploader::{
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging, server, AppState,
};
use tracing::info;

/// 加载日志配置
///
/// 尝试从配置文件加载，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先初始化日志，后续配置加载过程才有输出
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    info!("对象存储上传服务启动中...");

    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;
    if config.storage.cluster.is_empty() || config.storage.bucket.is_empty() {
        tracing::warn!("⚠️  未配置 storage.cluster / storage.bucket，上传请求将会失败");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config)?;
    let app = server::build_router(app_state.clone());

    info!("服务器启动在: http://{}", addr);
    info!("API 基础路径: http://{}/api/v1", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始关闭...");
        }
    }

    let counts = app_state.upload_manager.counts();
    if counts.num_queued + counts.num_in_progress > 0 {
        tracing::warn!(
            "退出时仍有未完成的上传: 排队={}, 上传中={}",
            counts.num_queued,
            counts.num_in_progress
        );
    }
    info!("应用已退出");

    Ok(())
}
