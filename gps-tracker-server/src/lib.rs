//! Ingest server for GPS tracking devices.
//!
//! Devices connect over TCP and stream binary frames. Each frame is decoded,
//! stored in Postgres and published to live websocket subscribers. A small
//! HTTP API serves the stored records.

pub mod api;
pub mod broker;
pub mod database;
pub mod ingest;

#[derive(Debug, thiserror::Error)]
#[error("gps-tracker error")]
pub enum Error {
    Io(#[from] std::io::Error),
    Database(#[from] database::Error),
    Ingest(#[from] ingest::Error),
}
