//! embassy-net TCP transport for the stats server

use core::fmt;

use embassy_net::Stack;
use embassy_net::tcp::{self, AcceptError, TcpSocket};
use embassy_time::Duration;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use wellflow_core::server::{Connection, Listener};

pub const HTTP_PORT: u16 = 80;
/// Idle time after which a silent client is dropped.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

const SOCKET_BUFFER: usize = 1024;

/// Listens on one port and hands out one connection at a time.
pub struct TcpListener<'s> {
    stack: Stack<'s>,
    port: u16,
    rx: [u8; SOCKET_BUFFER],
    tx: [u8; SOCKET_BUFFER],
}

impl<'s> TcpListener<'s> {
    pub fn new(stack: Stack<'s>, port: u16) -> Self {
        Self {
            stack,
            port,
            rx: [0; SOCKET_BUFFER],
            tx: [0; SOCKET_BUFFER],
        }
    }
}

impl Listener for TcpListener<'_> {
    type Connection<'a>
        = TcpConnection<'a>
    where
        Self: 'a;
    type Error = AcceptError;

    async fn accept(&mut self) -> Result<TcpConnection<'_>, AcceptError> {
        self.stack.wait_config_up().await;

        let mut socket = TcpSocket::new(self.stack, &mut self.rx, &mut self.tx);
        socket.set_timeout(Some(CONNECTION_TIMEOUT));
        socket.accept(self.port).await?;
        Ok(TcpConnection {
            socket,
            closed: false,
        })
    }
}

/// An accepted client. Dropping it without [`Connection::close`] resets the
/// socket.
pub struct TcpConnection<'a> {
    socket: TcpSocket<'a>,
    closed: bool,
}

impl Drop for TcpConnection<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.socket.abort();
        }
    }
}

/// Transport error from the embassy-net socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketError(pub tcp::Error);

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp socket error: {:?}", self.0)
    }
}

impl core::error::Error for SocketError {}

impl embedded_io_async::Error for SocketError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ConnectionReset
    }
}

impl ErrorType for TcpConnection<'_> {
    type Error = SocketError;
}

impl Read for TcpConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SocketError> {
        self.socket.read(buf).await.map_err(SocketError)
    }
}

impl Write for TcpConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, SocketError> {
        self.socket.write(buf).await.map_err(SocketError)
    }

    async fn flush(&mut self) -> Result<(), SocketError> {
        self.socket.flush().await.map_err(SocketError)
    }
}

impl Connection for TcpConnection<'_> {
    /// Send FIN and wait until the peer has acknowledged everything.
    async fn close(&mut self) -> Result<(), SocketError> {
        self.socket.close();
        self.socket.flush().await.map_err(SocketError)?;
        self.closed = true;
        Ok(())
    }
}
