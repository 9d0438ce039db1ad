//! RCON wire-level tests against a loopback server.

mod session_test;

use pz_watchdog::rcon::packet::{
    read_packet, write_packet, Packet, AUTH_FAILED_ID, SERVERDATA_AUTH,
    SERVERDATA_AUTH_RESPONSE, SERVERDATA_RESPONSE_VALUE,
};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Minimal Source RCON server.
///
/// Answers `players` with a fixed status, `quit` by closing the socket,
/// and anything else with an empty reply. Every command is reported.
pub struct FakeServer {
    pub addr: String,
    pub commands: mpsc::UnboundedReceiver<String>,
}

impl FakeServer {
    pub async fn start(password: &'static str, status: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, commands) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let tx = tx.clone();
                tokio::spawn(serve(socket, password, status, tx));
            }
        });

        Self { addr, commands }
    }
}

/// Accepts one connection and answers every packet after `delay`.
pub async fn start_slow_server(password: &'static str, delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let Ok(auth) = read_packet(&mut socket).await else {
            return;
        };
        tokio::time::sleep(delay).await;
        let id = if auth.body == password { auth.id } else { AUTH_FAILED_ID };
        if write_packet(&mut socket, &Packet::new(id, SERVERDATA_AUTH_RESPONSE, ""))
            .await
            .is_err()
        {
            return;
        }
        while let Ok(request) = read_packet(&mut socket).await {
            tokio::time::sleep(delay).await;
            let reply = Packet::new(request.id, SERVERDATA_RESPONSE_VALUE, "");
            if write_packet(&mut socket, &reply).await.is_err() {
                return;
            }
        }
    });

    addr
}

async fn serve(
    mut socket: TcpStream,
    password: &'static str,
    status: &'static str,
    tx: mpsc::UnboundedSender<String>,
) {
    let Ok(auth) = read_packet(&mut socket).await else {
        return;
    };
    assert_eq!(auth.kind, SERVERDATA_AUTH);

    // Real servers send an empty value ahead of the auth result.
    write_packet(&mut socket, &Packet::new(auth.id, SERVERDATA_RESPONSE_VALUE, ""))
        .await
        .unwrap();
    if auth.body != password {
        write_packet(
            &mut socket,
            &Packet::new(AUTH_FAILED_ID, SERVERDATA_AUTH_RESPONSE, ""),
        )
        .await
        .unwrap();
        return;
    }
    write_packet(&mut socket, &Packet::new(auth.id, SERVERDATA_AUTH_RESPONSE, ""))
        .await
        .unwrap();

    while let Ok(request) = read_packet(&mut socket).await {
        tx.send(request.body.clone()).ok();
        let body = match request.body.as_str() {
            "quit" => return,
            "players" => status.to_string(),
            other if other.starts_with("servermsg") => String::new(),
            other => format!("Unknown command {other}"),
        };
        write_packet(
            &mut socket,
            &Packet::new(request.id, SERVERDATA_RESPONSE_VALUE, body),
        )
        .await
        .unwrap();
    }
}
