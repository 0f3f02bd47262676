//! TW Screener Library
//!
//! Concurrent momentum screener for TWSE (上市) and TPEx (上櫃) equities.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    tw-screener (Rust Service)                       │
//! │                           :4436                                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Universe       │  │  Scan           │  │  Ranker /       │      │
//! │  │  (ISIN pages)   │─▶│  Orchestrator   │─▶│  Reports        │      │
//! │  └─────────────────┘  └────────┬────────┘  └─────────────────┘      │
//! │                                │                                    │
//! │                       ┌────────▼────────┐                           │
//! │                       │ History (Yahoo) │                           │
//! │                       └─────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Screening rule
//! - Latest session volume above 1000 lots (1 lot = 1000 shares)
//! - Two consecutive rising closes (C2 < C1 < C0)
//! - Top 20 by latest change%

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod routes;
pub mod screener;
pub mod universe;

use anyhow::Result;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::routes::{build_router, ScreenerState};
use crate::screener::ScreenerEngine;

/// HTTP front end for the screener.
pub struct ScreenerService {
    state: ScreenerState,
    shutdown: CancellationToken,
}

impl ScreenerService {
    pub fn new(engine: ScreenerEngine) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            state: ScreenerState::with_shutdown(engine, shutdown.clone()),
            shutdown,
        }
    }

    /// Token that stops the server and any running scan's dispatch.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until the shutdown token is cancelled.
    pub async fn start(self, host: &str, port: u16) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        let app = build_router(self.state).layer(cors);

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let shutdown = self.shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
