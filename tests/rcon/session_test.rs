//! `RconSession` against the loopback server.

use std::sync::Arc;
use std::time::Duration;

use pz_watchdog::health::{HealthProber, Reachability};
use pz_watchdog::rcon::{escape_broadcast, RconClient, RconError, RconSession, RemoteControl};

use super::{start_slow_server, FakeServer};

const PASSWORD: &str = "hunter2";
const STATUS: &str = "Players connected (2):\n-Alice\n-Bob";
const TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn status_query_returns_raw_reply() {
    let mut server = FakeServer::start(PASSWORD, STATUS).await;
    let session = RconSession::new(&server.addr, PASSWORD, TIMEOUT);

    assert_eq!(session.query_status().await.unwrap(), STATUS);
    assert_eq!(server.commands.recv().await.unwrap(), "players");
}

#[tokio::test]
async fn broadcast_quotes_the_message() {
    let mut server = FakeServer::start(PASSWORD, STATUS).await;
    let session = RconSession::new(&server.addr, PASSWORD, TIMEOUT);

    session.broadcast("RESTART in 5 minutes!").await.unwrap();
    assert_eq!(
        server.commands.recv().await.unwrap(),
        "servermsg \"RESTART in 5 minutes!\""
    );
}

#[tokio::test]
async fn escaped_quotes_reach_the_wire_intact() {
    let mut server = FakeServer::start(PASSWORD, STATUS).await;
    let session = RconSession::new(&server.addr, PASSWORD, TIMEOUT);

    session
        .broadcast(&escape_broadcast(r#"say "hi""#))
        .await
        .unwrap();
    assert_eq!(
        server.commands.recv().await.unwrap(),
        r#"servermsg "say \"hi\"""#
    );
}

#[tokio::test]
async fn quit_succeeds_when_server_hangs_up() {
    let mut server = FakeServer::start(PASSWORD, STATUS).await;
    let session = RconSession::new(&server.addr, PASSWORD, TIMEOUT);

    session.request_shutdown().await.unwrap();
    assert_eq!(server.commands.recv().await.unwrap(), "quit");
}

#[tokio::test]
async fn mod_check_sends_command() {
    let mut server = FakeServer::start(PASSWORD, STATUS).await;
    let session = RconSession::new(&server.addr, PASSWORD, TIMEOUT);

    session.force_mod_check().await.unwrap();
    assert_eq!(server.commands.recv().await.unwrap(), "checkModsNeedUpdate");
}

#[tokio::test]
async fn timeout_bounds_the_whole_exchange() {
    // Each stage fits the timeout on its own, the sum does not.
    let addr = start_slow_server(PASSWORD, Duration::from_millis(350)).await;
    let session = RconSession::new(&addr, PASSWORD, Duration::from_millis(500));

    let err = session.query_status().await.unwrap_err();
    assert!(matches!(err, RconError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let server = FakeServer::start(PASSWORD, STATUS).await;

    let err = RconClient::connect(&server.addr, "wrong", TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, RconError::AuthRejected));
    assert!(!err.is_connectivity());
}

#[tokio::test]
async fn client_runs_several_commands_on_one_connection() {
    let mut server = FakeServer::start(PASSWORD, STATUS).await;
    let mut client = RconClient::connect(&server.addr, PASSWORD, TIMEOUT)
        .await
        .unwrap();

    assert_eq!(client.exec("players").await.unwrap(), STATUS);
    assert_eq!(
        client.exec("help").await.unwrap(),
        "Unknown command help"
    );
    assert_eq!(server.commands.recv().await.unwrap(), "players");
    assert_eq!(server.commands.recv().await.unwrap(), "help");
}

#[tokio::test]
async fn prober_sees_live_server_online() {
    let server = FakeServer::start(PASSWORD, STATUS).await;
    let session = Arc::new(RconSession::new(&server.addr, PASSWORD, TIMEOUT));
    let prober = HealthProber::new(session);

    assert_eq!(prober.classify().await, Reachability::Online);
}

#[tokio::test]
async fn prober_sees_closed_port_offline() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let session = Arc::new(RconSession::new(addr, PASSWORD, TIMEOUT));
    let prober = HealthProber::new(Arc::clone(&session));

    assert!(session.query_status().await.unwrap_err().is_connectivity());
    assert_eq!(prober.classify().await, Reachability::Offline);
    assert!(
        prober
            .wait_until_offline(Duration::from_secs(1), Duration::from_millis(50))
            .await
    );
}
