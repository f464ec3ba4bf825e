//! End-to-end tests for the socket-owning daemon under the lifecycle
//! controller.

use std::sync::Arc;
use std::time::Duration;

use jail_lib::ExitStatus;
use jaild::daemon::Daemon;
use jaild::failure::DaemonFailure;
use jaild::handler::{ConnectionHandler, Endpoint, UnavailableHandler};
use jaild::lifecycle;
use jaild::service::Service;
use jaild::shutdown::ShutdownToken;
use rstest::{fixture, rstest};
use test_support::{CONNECT_RETRY_COUNT, CONNECT_RETRY_DELAY, loopback_config, wait_until_refused};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

#[fixture]
fn shutdown() -> ShutdownToken {
    ShutdownToken::new()
}

async fn read_reply(addr: std::net::SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.expect("read");
    reply
}

#[rstest]
#[tokio::test]
async fn serves_both_endpoints_until_shutdown(shutdown: ShutdownToken) {
    let daemon = Arc::new(
        Daemon::bind(&loopback_config(), shutdown.clone(), UnavailableHandler)
            .await
            .expect("bind"),
    );
    let addrs: Vec<_> = daemon.local_addrs().iter().map(|(_, a)| *a).collect();
    let run = {
        let daemon = Arc::clone(&daemon);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { lifecycle::run(daemon, &shutdown, &mut Vec::new()).await })
    };

    for addr in &addrs {
        assert!(read_reply(*addr).await.starts_with("HTTP/1.1 503"));
    }

    shutdown.trigger();
    let status = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("lifecycle finished")
        .expect("join");
    assert_eq!(status, ExitStatus::Clean);
    for addr in addrs {
        assert!(wait_until_refused(addr, CONNECT_RETRY_COUNT, CONNECT_RETRY_DELAY).await);
    }
}

#[rstest]
#[tokio::test]
async fn shutdown_before_serve_is_a_clean_stop(shutdown: ShutdownToken) {
    let daemon = Arc::new(
        Daemon::bind(&loopback_config(), shutdown.clone(), UnavailableHandler)
            .await
            .expect("bind"),
    );
    let addrs: Vec<_> = daemon.local_addrs().iter().map(|(_, a)| *a).collect();
    shutdown.trigger();
    let status = tokio::time::timeout(
        Duration::from_secs(5),
        lifecycle::run(daemon, &shutdown, &mut Vec::new()),
    )
    .await
    .expect("lifecycle finished");
    assert_eq!(status, ExitStatus::Clean);
    for addr in addrs {
        assert!(wait_until_refused(addr, CONNECT_RETRY_COUNT, CONNECT_RETRY_DELAY).await);
    }
}

#[rstest]
#[tokio::test]
async fn close_sockets_before_serve_releases_listeners(shutdown: ShutdownToken) {
    let daemon = Daemon::bind(&loopback_config(), shutdown, UnavailableHandler)
        .await
        .expect("bind");
    let addrs: Vec<_> = daemon.local_addrs().iter().map(|(_, a)| *a).collect();
    daemon.close_sockets().expect("close");
    daemon.close_sockets().expect("close again");
    for addr in addrs {
        assert!(wait_until_refused(addr, CONNECT_RETRY_COUNT, CONNECT_RETRY_DELAY).await);
    }
}

#[rstest]
#[tokio::test]
async fn second_serve_is_a_literal_failure(shutdown: ShutdownToken) {
    let daemon = Arc::new(
        Daemon::bind(&loopback_config(), shutdown.clone(), UnavailableHandler)
            .await
            .expect("bind"),
    );
    shutdown.trigger();
    daemon.serve().await.expect("first serve stops on shutdown");
    let status = lifecycle::run(daemon, &shutdown, &mut Vec::new()).await;
    assert_eq!(status, ExitStatus::Literal);
}

/// Handler that records the endpoint and fails every connection.
struct Failing(tokio::sync::mpsc::UnboundedSender<Endpoint>);

impl ConnectionHandler for Failing {
    async fn handle(
        &self,
        _stream: TcpStream,
        _peer: std::net::SocketAddr,
        endpoint: Endpoint,
    ) -> Result<(), DaemonFailure> {
        let _ = self.0.send(endpoint);
        Err(DaemonFailure::http("handler rejected request"))
    }
}

#[rstest]
#[tokio::test]
async fn handler_failures_do_not_stop_the_daemon(shutdown: ShutdownToken) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let daemon = Arc::new(
        Daemon::bind(&loopback_config(), shutdown.clone(), Failing(tx))
            .await
            .expect("bind"),
    );
    let (plain, secure) = match daemon.local_addrs() {
        [(Endpoint::Plain, plain), (Endpoint::Secure, secure)] => (*plain, *secure),
        other => panic!("unexpected listeners: {other:?}"),
    };
    let serving = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move { daemon.serve().await })
    };

    for addr in [plain, plain, secure] {
        let _stream = TcpStream::connect(addr).await.expect("connect");
    }
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(rx.recv().await.expect("handled"));
    }
    seen.sort_by_key(|e| *e == Endpoint::Secure);
    assert_eq!(seen, [Endpoint::Plain, Endpoint::Plain, Endpoint::Secure]);
    assert!(!serving.is_finished());

    daemon.close_sockets().expect("close");
    let outcome = tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("serve finished")
        .expect("join");
    assert!(outcome.is_ok());
}
