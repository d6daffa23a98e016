//! 测试辅助：在随机端口上启动 axum 桩服务。

use axum::Router;

/// 启动桩服务并返回其根地址（不带结尾斜杠）。
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}
