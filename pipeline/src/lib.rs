//! Staged RAG ingestion pipeline
//!
//! Four queue-driven workers take raw documents to an embedding-ready
//! hybrid index:
//!
//! ```text
//! clean_flow ─► Clean ─► chunk_flow ─► Chunk ─► enrich_flow ─► Enrich ─► index_flow ─► Index
//!               parse,     │            split,    │             LLM        │            batched
//!               fragment   ▼            re-node   ▼             fan-out    ▼            dual-write
//!                        payload               payload                  payload
//! ```
//!
//! Payloads are persisted to the object store between hops; queue messages
//! only carry paths. Delivery is at-least-once with per-consumer
//! pending-entry recovery, and every stage transition is idempotent.

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod embedding;
pub mod llm;
pub mod stages;
pub mod utils;
