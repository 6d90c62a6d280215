//! Dadyar - Persian Legal Question Answering
//!
//! A retrieval-augmented generation pipeline over a Persian legal corpus:
//! documents are segmented into legal units (articles, principles, notes,
//! clauses), tagged with a document type and legal domain, embedded into a
//! local vector index, and queried through a domain-classifying,
//! re-ranking, caching answer chain with optional conversation memory.

pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod domain;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod retrieval;
pub mod segment;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{DadyarError, Result};
