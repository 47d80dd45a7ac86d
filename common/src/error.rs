use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tungstenite::Error),

    #[error("Exchange API error: {0}")]
    ExchangeError(String),

    #[error("Parsing error: {0}")]
    ParseError(String),
}
