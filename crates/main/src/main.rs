//! 主应用程序入口
//!
//! 加载配置，连接数据库并启动 Axum Web API 与过期帖子清理任务。

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use application::{PostService, SystemClock, UserRepository};
use axum::http::{header, HeaderValue, Method};
use config::AppConfig;
use infrastructure::Infrastructure;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, AppStateDependencies};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志，默认 info 级别
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("加载配置失败")?;
    config.validate().context("配置校验失败")?;
    if config.uses_development_secret() {
        tracing::warn!("正在使用开发用 JWT 密钥，请在生产环境中通过 MEETUP_JWT__SECRET 覆盖");
    }
    tracing::info!(config = %config.sanitize(), "配置加载完成");

    let infra = Infrastructure::connect(&config)
        .await
        .context("初始化基础设施失败")?;

    // 上次进程退出时残留的在线标记全部清空
    let reset = infra.storage.user_repository.reset_presence().await?;
    tracing::info!(users = reset, "在线状态已重置");

    let state = AppState::new(
        &config,
        AppStateDependencies {
            user_repository: infra.storage.user_repository.clone(),
            post_repository: infra.storage.post_repository.clone(),
            chat_repository: infra.storage.chat_repository.clone(),
            payment_repository: infra.storage.payment_repository.clone(),
            password_hasher: infra.password_hasher.clone(),
            federated_verifier: infra.federated_verifier.clone(),
            blob_store: infra.blob_store.clone(),
            clock: Arc::new(SystemClock),
        },
    );

    spawn_expiry_sweep(
        state.post_service.clone(),
        Duration::from_secs(config.server.expiry_sweep_seconds),
    );

    let app = router(state)
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("无法监听 {address}"))?;

    tracing::info!("服务器启动在 http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("服务器已停止");
    Ok(())
}

/// 未配置来源时放开所有来源，便于本地开发。
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "忽略无效的 CORS 来源");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}

/// 周期性地把到期帖子标记为 expired。
fn spawn_expiry_sweep(post_service: Arc<PostService>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match post_service.expire_due().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "已过期帖子"),
                Err(err) => tracing::warn!(error = %err, "过期帖子清理失败"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听退出信号");
    }
    tracing::info!("收到退出信号，正在关闭");
}
