#![forbid(unsafe_code)]

//! API routes.

use axum::extract::Request;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rate_limit::{RESET_PATH, client_ip};

pub const MESSAGE_PATH: &str = "/api/message";

/// `{"message": ...}` body shared by both routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Route table, without middleware.
pub fn router() -> Router {
    Router::new()
        .route(MESSAGE_PATH, get(message))
        .route(RESET_PATH, get(reset))
}

async fn message() -> Json<MessageBody> {
    Json(MessageBody {
        message: "Hello world!".to_owned(),
    })
}

/// Acknowledges a reset for the caller. Counters are left untouched.
async fn reset(req: Request) -> Json<MessageBody> {
    let ip = client_ip(&req);
    info!(%ip, "reset requested");
    Json(MessageBody {
        message: format!("Success reset for {ip}"),
    })
}
