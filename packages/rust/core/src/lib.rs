//! Document store, chunker, retrieval engine, and ingest pipeline for newsrag.
//!
//! This crate ties the fetch layer and the vector index together into the
//! two end-to-end workflows: [`pipeline::ingest`] and
//! [`retrieval::assemble_context`].

pub mod chunker;
pub mod documents;
pub mod pipeline;
pub mod retrieval;
