//! TCP status endpoint for the remote monitor.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

use crate::status::{StatusBoard, StatusSnapshot};

const REBIND_DELAY: Duration = Duration::from_secs(1);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves one status line per accepted connection, one connection at a time.
///
/// Connection failures are logged and the next connection is accepted; a
/// failing listener is dropped and bound again after a short delay.
#[derive(Debug, Clone)]
pub struct StatusServer {
    addr: SocketAddr,
    board: StatusBoard,
}

impl StatusServer {
    pub fn new(addr: SocketAddr, board: StatusBoard) -> Self {
        Self { addr, board }
    }

    /// Listens on every interface at `port`.
    pub fn on_port(port: u16, board: StatusBoard) -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), board)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds and serves until cancelled, re-arming the listener after failures.
    pub async fn run(&self, cancel_token: CancellationToken) -> Result<()> {
        loop {
            let bound = tokio::select! {
                () = cancel_token.cancelled() => return Ok(()),
                bound = TcpListener::bind(self.addr) => bound,
            };

            match bound {
                Ok(listener) => {
                    info!("Status server listening on {}", self.addr);
                    match self.serve(listener, &cancel_token).await {
                        Ok(()) => return Ok(()),
                        Err(e) => error!("Status listener failed, restarting: {e}"),
                    }
                }
                Err(e) => warn!("Failed to bind status server on {}: {e}", self.addr),
            }

            tokio::select! {
                () = cancel_token.cancelled() => return Ok(()),
                () = sleep(REBIND_DELAY) => {}
            }
        }
    }

    /// Accepts connections on `listener` until cancelled (`Ok`) or until
    /// accepting fails (`Err`, the caller binds again).
    pub async fn serve(&self, listener: TcpListener, cancel_token: &CancellationToken) -> io::Result<()> {
        loop {
            let (mut stream, peer) = tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Status server cancelled");
                    return Ok(());
                }
                accepted = listener.accept() => accepted?,
            };

            let snapshot = self.board.snapshot().await;
            match timeout(WRITE_TIMEOUT, write_status(&mut stream, &snapshot)).await {
                Ok(Ok(())) => debug!("Sent status to {peer}"),
                Ok(Err(e)) => error!("Failed to send status to {peer}: {e}"),
                Err(_) => error!("Sending status to {peer} timed out"),
            }
        }
    }
}

/// Writes the wire line for `snapshot` and closes the write half.
pub async fn write_status<W>(stream: &mut W, snapshot: &StatusSnapshot) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(snapshot.to_wire_line().as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::{io::AsyncReadExt, net::TcpStream};

    fn snapshot(lines: usize) -> StatusSnapshot {
        StatusSnapshot {
            min_temp: 9.5,
            current_temp: 10.2,
            max_temp: 10.5,
            day_index: 1,
            state_label: "A".to_string(),
            recent: (1..=lines).map(|i| format!("log {i}")).collect(),
        }
    }

    async fn fetch(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut received = String::new();
        stream.read_to_string(&mut received).await.unwrap();
        received
    }

    #[tokio::test]
    async fn write_status_sends_exact_line() {
        let mut stream = tokio_test::io::Builder::new()
            .write(b"9.5,10.2,10.5,2,A,log 1,log 2,log 3,log 4,log 5")
            .build();

        write_status(&mut stream, &snapshot(5)).await.unwrap();
    }

    #[tokio::test]
    async fn serves_one_line_per_connection_and_rearms() {
        let board = StatusBoard::new(snapshot(5));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = StatusServer::new(addr, board.clone());
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { server.serve(listener, &cancel).await })
        };

        assert_eq!(
            fetch(addr).await,
            "9.5,10.2,10.5,2,A,log 1,log 2,log 3,log 4,log 5"
        );

        board.publish(snapshot(0)).await;
        assert_eq!(fetch(addr).await, "9.5,10.2,10.5,2,A");

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn peer_closing_early_does_not_stop_the_server() {
        let board = StatusBoard::new(snapshot(23));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = StatusServer::new(addr, board);
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { server.serve(listener, &cancel).await })
        };

        drop(TcpStream::connect(addr).await.unwrap());

        let received = fetch(addr).await;
        assert_eq!(received.split(',').count(), 5 + 23);
        assert!(received.ends_with("log 23"));

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let server = StatusServer::new("127.0.0.1:0".parse().unwrap(), StatusBoard::default());
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { server.run(cancel).await })
        };

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[test]
    fn on_port_listens_on_all_interfaces() {
        let server = StatusServer::on_port(4111, StatusBoard::default());
        assert_eq!(server.addr(), "0.0.0.0:4111".parse().unwrap());
    }
}
