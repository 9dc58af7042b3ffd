//! Warden - Proxy Pool Manager
//!
//! A centralized pool of proxy endpoints shared by automation workers.
//!
//! ## Features
//!
//! - Proxy lifecycle management with idempotent batch ingestion
//! - Per-operation selection policies with progressive constraint relaxation
//! - Six selection strategies (round-robin, LRU, weighted-random, best-reputation, fastest-response, random)
//! - EMA-based reputation scoring with automatic deactivation
//! - Background health monitoring over SOCKS and HTTP CONNECT probes
//! - Encrypted credential storage behind an injected vault
//! - In-memory and PostgreSQL store backends

pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod pool;
pub mod reputation;
pub mod selection;
pub mod store;
pub mod vault;

pub use config::Config;
pub use error::{PoolError, Result};
pub use pool::ProxyPool;
