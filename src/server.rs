//! Websocket server.
//!
//! Accepts plain `ws://` connections and serves each in its own task. A
//! connection is strictly request/response: every text frame is handled by
//! the [`Dispatcher`] before the next one is read.

use std::{net::SocketAddr, sync::Arc};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::{
    dispatch::Dispatcher,
    error::{Error, Result},
    protocol::{format, MAX_FRAME_SIZE},
};

pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    debug: bool,
}

impl Server {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher, debug: bool) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
            debug,
        })
    }

    /// # Errors
    ///
    /// Will return `Err` if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }

    /// Accepts connections until accepting fails.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the listener stops accepting connections.
    pub async fn run(&self) -> Result<()> {
        info!("listening on ws://{}", self.local_addr()?);

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let connection = Connection::new(peer, Arc::clone(&self.dispatcher), self.debug);

            tokio::spawn(async move {
                let id = connection.id.clone();
                match connection.serve(stream).await {
                    Ok(()) => info!("[{id}] client disconnected"),
                    Err(e) => error!("[{id}] connection error: {e}"),
                }
            });
        }
    }
}

struct Connection {
    /// Short id for log lines.
    id: String,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    level: log::Level,
}

impl Connection {
    fn new(peer: SocketAddr, dispatcher: Arc<Dispatcher>, debug: bool) -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);

        Self {
            id,
            peer,
            dispatcher,
            level: if debug {
                log::Level::Info
            } else {
                log::Level::Debug
            },
        }
    }

    async fn serve(self, stream: TcpStream) -> Result<()> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        info!("[{}] client connected from {}", self.id, self.peer);

        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let greeting = self.dispatcher.greeting().await;
        log!(self.level, "[{}] sent: {greeting}", self.id);
        ws_tx.send(Message::text(greeting)).await?;

        while let Some(message) = ws_rx.next().await {
            match message? {
                Message::Text(text) => {
                    let response = self.respond(text.as_str()).await;
                    ws_tx.send(Message::text(response)).await?;
                }
                Message::Binary(payload) => {
                    debug!(
                        "[{}] ignoring binary message with {} bytes",
                        self.id,
                        payload.len()
                    );
                }
                Message::Close(frame) => {
                    trace!("[{}] close frame: {frame:?}", self.id);
                    break;
                }
                // Pings are answered by tungstenite on the next read or write.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("[{}] control frame", self.id);
                }
            }
        }

        Ok(())
    }

    async fn respond(&self, text: &str) -> String {
        // Do not handle exceedingly large messages to prevent out of memory
        // conditions.
        let size = text.len();
        if size > MAX_FRAME_SIZE {
            warn!("[{}] ignoring oversized message with {size} bytes", self.id);
            return format::error(Error::out_of_range(format!(
                "message too large ({size} bytes)"
            )));
        }

        log!(self.level, "[{}] command received: {text}", self.id);
        let response = self.dispatcher.dispatch(text).await;
        log!(self.level, "[{}] sent: {response}", self.id);

        response
    }
}
