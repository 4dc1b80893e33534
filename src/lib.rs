//! # vigil
//!
//! Disaster event aggregation and streaming service. Vigil continuously
//! polls heterogeneous public safety feeds (text-message broadcasts, HTML
//! dashboards, a binary earthquake early-warning stream, JSON and CSV
//! APIs), normalizes everything into one append-only event log, and fans
//! fresh events out in real time to SSE clients on every instance.
//!
//! ## Architecture
//!
//! ```text
//! Upstream feeds
//!     │  (source adapters, ingest/)
//!     ├── Job Queue (queue/, Redis streams)
//!     ├── Ingest Worker → Event Writer
//!     │
//!     ├── Event Log (persistence/, PostgreSQL)
//!     ├── Event Bus (bus/, Redis pub/sub)
//!     │
//!     ├── SSE Hub (sse/)
//!     └── Query API (api/)
//!             │
//!         Clients (JSON list, SSE stream with `since` catch-up)
//! ```
//!
//! Any number of instances share the database and Redis; one instance's
//! insert reaches every instance's connected clients within one bus
//! round-trip plus one database read.

pub mod api;
pub mod app_state;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod persistence;
pub mod queue;
pub mod shutdown;
pub mod sse;
