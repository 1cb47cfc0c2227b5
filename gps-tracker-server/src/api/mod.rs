pub mod live;
pub mod records;

use axum::{
    Json,
    Router,
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
    routing,
};
use serde::Serialize;
use tokio::net::{
    TcpListener,
    ToSocketAddrs,
};
use tokio_util::sync::CancellationToken;

use crate::{
    broker::Broker,
    database::Database,
};

#[derive(Clone, Debug)]
pub struct Api {
    pub database: Database,
    pub broker: Broker,
    pub shutdown: CancellationToken,
}

impl Api {
    pub fn new(database: Database, broker: Broker) -> Self {
        Self {
            database,
            broker,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn router(&self) -> Router<()> {
        Router::new()
            .route("/", routing::get(status))
            .route("/gps-data", routing::get(records::get_records))
            .route("/get-all", routing::get(records::get_records))
            .route("/live", routing::get(live::get_live))
            .fallback(routing::get(not_found))
            .with_state(self.clone())
    }

    pub async fn serve(&self, listen_address: impl ToSocketAddrs) -> Result<(), crate::Error> {
        let tcp_listener = TcpListener::bind(listen_address).await?;
        let shutdown = self.shutdown.clone();

        tracing::info!(address = ?tcp_listener.local_addr().ok(), "serving api");

        axum::serve(tcp_listener, self.router().into_make_service())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await?;

        Ok(())
    }
}

async fn status() -> impl IntoResponse {
    "Server is running"
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: ErrorResponseInner,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponseInner {
    message: String,
    error: ApiError,
}

impl From<ApiError> for ErrorResponse {
    fn from(value: ApiError) -> Self {
        Self {
            error: ErrorResponseInner {
                message: value.to_string(),
                error: value,
            },
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.error.error.status_code(), Json(self)).into_response()
    }
}

#[derive(Debug, thiserror::Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiError {
    #[error("internal server error")]
    InternalServerError,
    #[error("invalid limit: {limit} (must be between 1 and {max})")]
    InvalidLimit { limit: i64, max: i64 },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidLimit { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<crate::database::Error> for ApiError {
    fn from(value: crate::database::Error) -> Self {
        tracing::error!(error = ?value, "database error while handling request");
        Self::InternalServerError
    }
}

impl From<crate::database::Error> for ErrorResponse {
    fn from(value: crate::database::Error) -> Self {
        ApiError::from(value).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        http::StatusCode,
        response::IntoResponse,
    };
    use tokio::{
        io::{
            AsyncReadExt,
            AsyncWriteExt,
        },
        net::{
            TcpListener,
            TcpStream,
        },
    };

    use crate::{
        api::{
            Api,
            ApiError,
        },
        broker::Broker,
        database::Database,
    };

    /// Serves the router on a random port. Nothing here touches the database.
    async fn serve() -> SocketAddr {
        let database = Database::connect_lazy("postgres://localhost/gps_tracker").unwrap();
        let api = Api::new(database, Broker::new());
        let tcp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = tcp_listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(tcp_listener, api.router().into_make_service())
                .await
                .unwrap();
        });
        address
    }

    async fn get(address: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(address).await.unwrap();
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn it_routes_requests() {
        let address = serve().await;

        let response = get(address, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("Server is running"), "{response}");

        // the limit is checked before the database is queried
        for path in ["/gps-data?limit=0", "/get-all?limit=5000"] {
            let response = get(address, path).await;
            assert!(response.starts_with("HTTP/1.1 400"), "{path}: {response}");
            assert!(response.contains("invalid_limit"), "{path}: {response}");
        }

        let response = get(address, "/no-such-path").await;
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(
            ApiError::InternalServerError.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::InvalidLimit { limit: 0, max: 1000 }
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
