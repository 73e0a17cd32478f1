//! # Briefweave: Resumable Research-Brief Pipeline Engine
//!
//! Briefweave turns a topic request into a synthesized, source-backed research
//! brief by driving a fixed multi-stage pipeline: plan queries, search, fetch
//! content, summarize sources, synthesize a brief, persist results.
//!
//! ## Core Concepts
//!
//! - **Stages**: Async units of work that transform the shared pipeline state
//! - **State**: A single owned record threaded mutably through every stage
//! - **Router**: Conditional continue/retry/skip decisions at two points
//! - **Machine**: An explicit, build-time-validated stage transition table
//! - **Engine**: Sequenced execution with per-stage checkpoints and resume
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use briefweave::config::EngineConfig;
//! use briefweave::engine::WorkflowEngine;
//! use briefweave::models::{ResearchDepth, ResearchRequest};
//! use briefweave::services::InMemoryContextStore;
//! # use briefweave::services::{GenerationService, SearchService};
//! # async fn example(
//! #     generation: Arc<dyn GenerationService>,
//! #     search: Arc<dyn SearchService>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let engine = WorkflowEngine::builder()
//!     .generation(generation)
//!     .search(search)
//!     .store(Arc::new(InMemoryContextStore::new()))
//!     .config(EngineConfig::default())
//!     .build()?;
//!
//! let request = ResearchRequest::new(
//!     "Artificial Intelligence in Healthcare",
//!     ResearchDepth::Medium,
//!     false,
//!     "u1",
//! )?;
//!
//! let result = engine.execute(request).await?;
//! if result.success {
//!     println!("brief: {:?}", result.brief);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The pipeline distinguishes three failure classes:
//!
//! 1. **Per-item**: one search query, one fetch, one summarization fails —
//!    recorded as a string in the state's error log, siblings continue.
//! 2. **Per-stage**: a stage's primary path fails — a deterministic fallback
//!    value is substituted and the pipeline continues.
//! 3. **Fatal**: a [`stages::StageError`] escapes a stage boundary — the whole
//!    execution aborts and surfaces as `success = false`.
//!
//! Callers always receive either a complete (possibly degraded) brief with a
//! populated error log, or an explicit failure — never a partial result.
//!
//! ## Module Guide
//!
//! - [`models`] - Domain schemas and validation
//! - [`state`] - The pipeline state record
//! - [`stages`] - The stage trait and the seven pipeline stages
//! - [`engine`] - State machine, router, checkpointing, and the engine itself
//! - [`concurrency`] - Bounded fan-out helpers
//! - [`services`] - Collaborator contracts (generation, search, history store)
//! - [`events`] - Progress event channel
//! - [`config`] - Engine tunables
//! - [`telemetry`] - Tracing initialization

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod events;
pub mod models;
pub mod services;
pub mod stages;
pub mod state;
pub mod telemetry;
pub mod utils;
