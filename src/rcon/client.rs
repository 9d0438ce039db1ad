//! Minimal Source RCON client over TCP.

use std::time::Duration;

use tokio::net::TcpStream;

use super::error::RconError;
use super::packet::{
    read_packet, write_packet, Packet, AUTH_FAILED_ID, SERVERDATA_AUTH,
    SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};

/// Packets skipped while waiting for a matching reply before giving up.
const MAX_STRAY_PACKETS: usize = 8;

/// An authenticated RCON connection.
///
/// Connect, login and each command are bounded separately by the
/// timeout given to [`RconClient::connect`].
#[derive(Debug)]
pub struct RconClient {
    stream: TcpStream,
    timeout: Duration,
    next_id: i32,
}

impl RconClient {
    /// Connect to `addr` and log in with `password`.
    ///
    /// # Errors
    ///
    /// - [`RconError::Unreachable`] if the TCP connect fails
    /// - [`RconError::Timeout`] if connect or login takes too long
    /// - [`RconError::AuthRejected`] if the password is wrong
    pub async fn connect(addr: &str, password: &str, timeout: Duration) -> Result<Self, RconError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(RconError::unreachable(addr, e)),
            Err(_) => return Err(RconError::Timeout(timeout)),
        };

        let mut client = Self {
            stream,
            timeout,
            next_id: 1,
        };
        let id = client.allocate_id();
        tokio::time::timeout(timeout, Self::login(&mut client.stream, id, password))
            .await
            .map_err(|_| RconError::Timeout(timeout))??;

        tracing::trace!(addr, "RCON authenticated");
        Ok(client)
    }

    /// Run a command and return the server's reply text.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or times out.
    pub async fn exec(&mut self, command: &str) -> Result<String, RconError> {
        let id = self.allocate_id();
        let timeout = self.timeout;
        tokio::time::timeout(timeout, Self::command(&mut self.stream, id, command))
            .await
            .map_err(|_| RconError::Timeout(timeout))?
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    async fn login(stream: &mut TcpStream, id: i32, password: &str) -> Result<(), RconError> {
        write_packet(stream, &Packet::new(id, SERVERDATA_AUTH, password)).await?;

        // Some servers send an empty RESPONSE_VALUE ahead of the login result.
        for _ in 0..MAX_STRAY_PACKETS {
            let reply = read_packet(stream).await?;
            match reply.kind {
                SERVERDATA_AUTH_RESPONSE if reply.id == AUTH_FAILED_ID => {
                    return Err(RconError::AuthRejected);
                }
                SERVERDATA_AUTH_RESPONSE if reply.id == id => return Ok(()),
                SERVERDATA_RESPONSE_VALUE => {}
                other => {
                    return Err(RconError::Protocol(format!(
                        "unexpected packet type {other} during login"
                    )));
                }
            }
        }
        Err(RconError::Protocol("no login response".into()))
    }

    async fn command(stream: &mut TcpStream, id: i32, command: &str) -> Result<String, RconError> {
        write_packet(stream, &Packet::new(id, SERVERDATA_EXECCOMMAND, command)).await?;

        for _ in 0..MAX_STRAY_PACKETS {
            let reply = read_packet(stream).await?;
            if reply.kind == SERVERDATA_RESPONSE_VALUE && reply.id == id {
                return Ok(reply.body);
            }
            tracing::trace!(id = reply.id, kind = reply.kind, "Skipping stray RCON packet");
        }
        Err(RconError::Protocol(format!("no response to command id {id}")))
    }
}
