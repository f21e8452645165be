//! # ragchat
//!
//! A conversation-scoped retrieval-augmented generation pipeline.
//!
//! Documents and web pages are ingested into per-conversation vector
//! collections; questions are answered by rewriting them against recent
//! history, retrieving the closest chunks through a relevance gate, and
//! generating a grounded reply.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Extractor   │──▶│ Chunker │──▶│ Embedding   │──▶│   SQLite    │
//! │ pdf/docx/csv │   │ 1500/150│   │ provider    │   │ vectors +   │
//! │ text/url     │   └─────────┘   └─────────────┘   │ doc records │
//! └──────────────┘                                   └──────┬──────┘
//!                                                           │
//!   question ──▶ rewrite ──▶ search ──▶ relevance gate ──▶ generate
//!                (history)              (or top-k fallback)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | File and URL text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | LLM provider abstraction |
//! | [`index`] | Per-conversation vector collections |
//! | [`store`] | Document-record store boundary |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Query pipeline |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod store;
