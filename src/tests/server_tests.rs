#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{routing::get, Router};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    use crate::server::run;

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "done"
    }

    fn app() -> Router {
        Router::new().route("/ping", get(|| async { "pong" })).route("/slow", get(slow))
    }

    async fn send(stream: &mut TcpStream, path: &str) {
        let req = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(req.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_serves_until_signal_then_stops_cleanly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(run(listener, app(), Duration::from_secs(2), async move {
            let _ = rx.await;
            "SIGTERM"
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        send(&mut stream, "/ping").await;
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.ends_with("pong"));

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert!(result.is_ok(), "{:?}", result);

        // Listener is closed once run returns
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_drain_timeout_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(run(listener, app(), Duration::from_millis(100), async move {
            let _ = rx.await;
            "SIGINT"
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        send(&mut stream, "/slow").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(3), server).await.unwrap().unwrap();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("could not close connections in time"), "{}", err);
        drop(stream);
    }
}
