use std::net::{
    Ipv4Addr,
    SocketAddr,
};

use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::Error;
use gps_tracker_protocol::{
    ConnectionContext,
    FrameDecoder,
    ProtocolSelection,
};
use gps_tracker_server::{
    api::Api,
    broker::Broker,
    database::Database,
    ingest::IngestServer,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            database_url,
            port,
            api_address,
            protocol,
        } => {
            let database = Database::connect(&database_url).await?;
            let broker = Broker::new();
            let shutdown = CancellationToken::new();

            let tcp_listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
            let ingest = IngestServer::new(
                tcp_listener,
                FrameDecoder::new(protocol),
                database.clone(),
                broker.clone(),
            )
            .with_shutdown(shutdown.clone());
            let api = Api::new(database, broker).with_shutdown(shutdown.clone());

            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    if let Err(error) = tokio::signal::ctrl_c().await {
                        tracing::error!(?error, "failed to listen for ctrl-c");
                        return;
                    }
                    tracing::info!("shutting down");
                    shutdown.cancel();
                }
            });

            tokio::try_join!(
                async { ingest.serve().await.map_err(Error::from) },
                async { api.serve(api_address.as_str()).await.map_err(Error::from) },
            )?;
        }
        Command::Decode { frame, protocol } => {
            let frame: String = frame.split_whitespace().collect();
            let frame = hex::decode(frame)?;

            let mut context = ConnectionContext::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));
            let decoded = FrameDecoder::new(protocol).decode(&mut context, &frame);

            tracing::info!(variant = %decoded.variant, length = frame.len(), "decoded frame");
            for (field, reason) in decoded.fallbacks() {
                tracing::warn!(field, %reason, "field fell back");
            }

            println!("{}", serde_json::to_string_pretty(&decoded.into_record())?);
        }
    }

    Ok(())
}

#[derive(Debug, Parser)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accept device connections and serve the HTTP API.
    Serve {
        #[clap(long, env = "DATABASE_URL")]
        database_url: String,

        /// TCP port devices connect to.
        #[clap(short, long, env = "PORT")]
        port: u16,

        #[clap(short, long, env = "API_ADDRESS", default_value = "0.0.0.0:8080")]
        api_address: String,

        /// auto, compact or extended
        #[clap(long, env = "PROTOCOL", default_value = "auto")]
        protocol: ProtocolSelection,
    },
    /// Decode a single hex-encoded frame and print the record as JSON.
    Decode {
        frame: String,

        #[clap(long, default_value = "auto")]
        protocol: ProtocolSelection,
    },
}
