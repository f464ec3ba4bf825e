//! SIGTERM handling for the daemon.
//!
//! Kept in its own test binary: the signal is raised against the whole
//! process, so the tests here also run serially.

use std::sync::Arc;
use std::time::Duration;

use jail_lib::ExitStatus;
use jaild::daemon::Daemon;
use jaild::handler::UnavailableHandler;
use jaild::lifecycle;
use jaild::shutdown::ShutdownToken;
use serial_test::serial;
use test_support::{CONNECT_RETRY_COUNT, CONNECT_RETRY_DELAY, loopback_config, wait_until_refused};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

fn raise_sigterm() {
    // SAFETY: raise(3) only delivers a signal to this process, whose SIGTERM
    // disposition is owned by tokio once the listener is armed.
    assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);
}

#[tokio::test]
#[serial]
async fn sigterm_stops_the_daemon_cleanly() {
    let shutdown = ShutdownToken::new();
    let _sigterm = lifecycle::arm(&shutdown).expect("arm");
    let daemon = Arc::new(
        Daemon::bind(&loopback_config(), shutdown.clone(), UnavailableHandler)
            .await
            .expect("bind"),
    );
    let (_, addr) = daemon.local_addrs()[0];
    let run = {
        let daemon = Arc::clone(&daemon);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { lifecycle::run(daemon, &shutdown, &mut Vec::new()).await })
    };

    let mut reply = String::new();
    TcpStream::connect(addr)
        .await
        .expect("connect")
        .read_to_string(&mut reply)
        .await
        .expect("read");
    assert!(reply.starts_with("HTTP/1.1 503"), "{reply}");

    raise_sigterm();

    let status = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("lifecycle finished")
        .expect("join");
    assert_eq!(status, ExitStatus::Clean);
    assert!(shutdown.is_triggered());
    assert!(wait_until_refused(addr, CONNECT_RETRY_COUNT, CONNECT_RETRY_DELAY).await);
}

#[tokio::test]
#[serial]
async fn sigterm_during_startup_is_a_clean_stop() {
    let shutdown = ShutdownToken::new();
    let _sigterm = lifecycle::arm(&shutdown).expect("arm");

    raise_sigterm();
    tokio::time::timeout(Duration::from_secs(5), shutdown.triggered())
        .await
        .expect("token triggered");

    let daemon = Arc::new(
        Daemon::bind(&loopback_config(), shutdown.clone(), UnavailableHandler)
            .await
            .expect("bind"),
    );
    let addrs: Vec<_> = daemon.local_addrs().iter().map(|(_, a)| *a).collect();
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
