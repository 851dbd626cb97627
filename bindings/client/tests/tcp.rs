use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gale_core::prelude::ConnectionTracker;
use gale_instruments::ReportConfig;
use gale_net_client::prelude::{NetClient, TlsPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn client(io_timeout: Duration) -> (NetClient, Arc<ConnectionTracker>) {
    let tracker = Arc::new(ConnectionTracker::new());
    let client = NetClient::new(
        Arc::new(ReportConfig::default().init()),
        tracker.clone(),
        io_timeout,
        &TlsPolicy::default(),
    )
    .unwrap();

    (client, tracker)
}

/// Replies to every message with `Hello, you said: <message>`.
async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    let reply = format!(
                        "Hello, you said: {}",
                        String::from_utf8_lossy(&buf[..n]).trim_end()
                    );
                    if socket.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    addr
}

/// Accepts connections and holds them open without ever replying.
async fn start_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

#[tokio::test]
async fn say_hello() {
    let addr = start_echo_server().await;
    let (client, tracker) = client(Duration::from_secs(5));

    let mut conn = client.connect_tcp(&addr.to_string()).await.unwrap();
    assert_eq!(1, tracker.open());

    conn.write_line("Say Hello").await.unwrap();
    let reply = conn.read_up_to(1024).await.unwrap();

    let reply = String::from_utf8_lossy(&reply);
    assert!(reply.contains("Hello"), "unexpected reply {reply}");
    assert!(reply.len() <= 1024);

    conn.close();
    assert!(!conn.is_open());
    assert_eq!(0, tracker.open());
}

#[tokio::test]
async fn close_is_idempotent() {
    let addr = start_echo_server().await;
    let (client, tracker) = client(Duration::from_secs(5));

    let mut conn = client
        .connect_tcp(&format!("tcp://{addr}"))
        .await
        .unwrap();
    conn.close();
    conn.close();
    drop(conn);

    assert_eq!(1, tracker.opened());
    assert_eq!(1, tracker.closed());
}

#[tokio::test]
async fn operations_after_close_are_io_errors() {
    let addr = start_echo_server().await;
    let (client, _) = client(Duration::from_secs(5));

    let mut conn = client.connect_tcp(&addr.to_string()).await.unwrap();
    conn.close();

    assert_eq!("io", conn.write_line("Say Hello").await.unwrap_err().class());
    assert_eq!("io", conn.read_up_to(1024).await.unwrap_err().class());
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, tracker) = client(Duration::from_secs(5));
    let err = client.connect_tcp(&addr.to_string()).await.unwrap_err();

    assert_eq!("connect", err.class());
    assert_eq!(0, tracker.opened());
}

#[tokio::test]
async fn slow_read_times_out_and_closes() {
    let addr = start_silent_server().await;
    let (client, tracker) = client(Duration::from_millis(200));

    let mut conn = client.connect_tcp(&addr.to_string()).await.unwrap();
    let err = conn.read_up_to(1024).await.unwrap_err();

    assert_eq!("timeout", err.class());
    assert!(!conn.is_open());
    assert_eq!(0, tracker.open());
}

#[tokio::test]
async fn peer_close_is_an_io_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let (client, tracker) = client(Duration::from_secs(5));
    let mut conn = client.connect_tcp(&addr.to_string()).await.unwrap();
    let err = conn.read_up_to(1024).await.unwrap_err();

    assert_eq!("io", err.class());
    assert!(!conn.is_open());
    assert_eq!(0, tracker.open());
}
