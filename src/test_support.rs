// 测试辅助：进程内 HTTP 服务

use axum::Router;
use tokio::net::TcpListener;

/// 在随机端口启动 axum 服务，返回根地址
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
