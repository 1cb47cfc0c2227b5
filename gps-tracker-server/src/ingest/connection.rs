use std::net::SocketAddr;

use bytes::BytesMut;
use gps_tracker_protocol::{
    ConnectionContext,
    FrameDecoder,
};
use tokio::io::{
    AsyncRead,
    AsyncReadExt,
    AsyncWrite,
    AsyncWriteExt,
};
use tokio_util::sync::CancellationToken;

use crate::ingest::{
    Broadcast,
    Error,
    Persistence,
};

/// Written back to the device after every frame.
pub const ACK: u8 = 0x01;

/// size of the read buffer: 1 KiB, plenty for one frame
const READ_BUFFER_SIZE: usize = 0x400;

/// What happened on a connection, returned when it closes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub frames: usize,
    pub persistence_failures: usize,
    pub broadcast_failures: usize,
}

/// Handles a single device connection.
///
/// Every read from the stream is decoded as one frame. Frames split across
/// reads, or several frames coalesced into one read, are not reassembled.
///
/// For every frame the record is persisted, then broadcast, then [`ACK`] is
/// written back. Persistence and broadcast failures are logged and counted but
/// don't stop the other steps. The device gets its acknowledgement either way.
///
/// A new handler is connected. [`run`](Self::run) receives until the
/// connection closes, and consumes the handler so a closed connection can't do
/// any more I/O.
#[derive(Debug)]
pub struct ConnectionHandler<S, P, B> {
    stream: S,
    context: ConnectionContext,
    decoder: FrameDecoder,
    persistence: P,
    broadcast: B,
    shutdown: CancellationToken,
    summary: ConnectionSummary,
    read_buffer: BytesMut,
}

impl<S, P, B> ConnectionHandler<S, P, B>
where
    S: AsyncRead + AsyncWrite + Unpin,
    P: Persistence,
    B: Broadcast,
{
    pub fn new(
        stream: S,
        peer_address: SocketAddr,
        decoder: FrameDecoder,
        persistence: P,
        broadcast: B,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stream,
            context: ConnectionContext::new(peer_address),
            decoder,
            persistence,
            broadcast,
            shutdown,
            summary: Default::default(),
            read_buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    /// Receives frames until the device disconnects, the transport fails, or
    /// the server shuts down.
    ///
    /// The connection's identity is dropped with the handler.
    pub async fn run(mut self) -> Result<ConnectionSummary, Error> {
        let result = self.receive().await;

        tracing::debug!(
            peer_address = %self.context.peer_address(),
            imei = ?self.context.identity().map(|identity| identity.value()),
            summary = ?self.summary,
            ?result,
            "connection closed"
        );

        result.map(|()| self.summary)
    }

    async fn receive(&mut self) -> Result<(), Error> {
        loop {
            self.read_buffer.clear();

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.stream.read_buf(&mut self.read_buffer) => {
                    if result? == 0 {
                        break;
                    }
                    self.handle_frame().await?;
                }
            }
        }

        Ok(())
    }

    async fn handle_frame(&mut self) -> Result<(), Error> {
        tracing::trace!(frame = %hex::encode(&self.read_buffer), "received frame");

        let decoded = self.decoder.decode(&mut self.context, &self.read_buffer);
        for (field, reason) in decoded.fallbacks() {
            tracing::debug!(field, %reason, variant = %decoded.variant, "field fell back");
        }

        let record = decoded.into_record();
        self.summary.frames += 1;

        if let Err(error) = self.persistence.persist(&record).await {
            self.summary.persistence_failures += 1;
            tracing::error!(?error, imei = %record.imei, "failed to persist record");
        }

        match self.broadcast.broadcast(&record).await {
            Ok(num_subscribers) => {
                tracing::trace!(num_subscribers, imei = %record.imei, "record broadcast");
            }
            Err(error) => {
                self.summary.broadcast_failures += 1;
                tracing::warn!(?error, imei = %record.imei, "failed to broadcast record");
            }
        }

        self.stream.write_all(&[ACK]).await?;
        self.stream.flush().await?;

        Ok(())
    }
}
