//! TCP ingest for tracking devices.
//!
//! Every device keeps one connection open. Each connection gets its own task
//! running a [`ConnectionHandler`].

pub mod connection;

use std::net::SocketAddr;

use gps_tracker_protocol::FrameDecoder;
use gps_tracker_types::DecodedRecord;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub use crate::ingest::connection::{
    ConnectionHandler,
    ConnectionSummary,
};
use crate::database::Database;

#[derive(Debug, thiserror::Error)]
#[error("ingest error")]
pub enum Error {
    Io(#[from] std::io::Error),
}

/// Stores decoded records.
pub trait Persistence: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn persist(
        &self,
        record: &DecodedRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Publishes decoded records to live subscribers.
pub trait Broadcast: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the number of subscribers the record was published to.
    fn broadcast(
        &self,
        record: &DecodedRecord,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;
}

impl<T: ?Sized + Persistence> Persistence for &T {
    type Error = <T as Persistence>::Error;

    fn persist(
        &self,
        record: &DecodedRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        T::persist(*self, record)
    }
}

impl<T: ?Sized + Broadcast> Broadcast for &T {
    type Error = <T as Broadcast>::Error;

    fn broadcast(
        &self,
        record: &DecodedRecord,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send {
        T::broadcast(*self, record)
    }
}

impl Persistence for Database {
    type Error = crate::database::Error;

    fn persist(
        &self,
        record: &DecodedRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.insert_record(record)
    }
}

/// Accepts device connections.
#[derive(Debug)]
pub struct IngestServer<P, B> {
    tcp_listener: TcpListener,
    decoder: FrameDecoder,
    persistence: P,
    broadcast: B,
    shutdown: CancellationToken,
}

impl<P, B> IngestServer<P, B> {
    pub fn new(
        tcp_listener: TcpListener,
        decoder: FrameDecoder,
        persistence: P,
        broadcast: B,
    ) -> Self {
        Self {
            tcp_listener,
            decoder,
            persistence,
            broadcast,
            shutdown: CancellationToken::new(),
        }
    }

    /// Provide a [`CancellationToken`] with which the server (and all device
    /// connections) can be shut down.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.tcp_listener.local_addr()?)
    }
}

impl<P, B> IngestServer<P, B>
where
    P: Persistence + Clone + 'static,
    B: Broadcast + Clone + 'static,
{
    /// Serve incoming connections
    pub async fn serve(self) -> Result<(), Error> {
        tracing::info!(
            address = ?self.tcp_listener.local_addr().ok(),
            protocol = %self.decoder.selection(),
            "waiting for device connections"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.tcp_listener.accept() => {
                    let (connection, address) = result?;
                    let handler = ConnectionHandler::new(
                        connection,
                        address,
                        self.decoder,
                        self.persistence.clone(),
                        self.broadcast.clone(),
                        self.shutdown.clone(),
                    );
                    let span = tracing::info_span!("connection", %address);
                    tokio::spawn(
                        async move {
                            tracing::debug!("device connected");
                            match handler.run().await {
                                Ok(summary) => tracing::debug!(?summary, "device disconnected"),
                                Err(error) => {
                                    tracing::error!(?error, "connection closed with error");
                                }
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }

        Ok(())
    }
}
