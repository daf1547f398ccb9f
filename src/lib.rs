// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # artdoc
//!
//! Client-side controller for a rule-based diagnostic expert system.
//!
//! A user selects observed symptoms; a [`DiagnosticSession`] then either runs
//! forward diagnosis (which rules fire, and what they conclude) or backward
//! verification (is a chosen conclusion supported, and why).
//!
//! ## Architecture
//!
//! - **Result model** (`model`): identifiers, fired rules, verdicts, and
//!   validation of raw engine responses
//! - **Catalog** (`catalog`): symptom and conclusion listings fetched at start
//! - **Session state** (`session`): the symptom selection
//! - **Controller** (`controller`): preconditions, one analysis in flight, results
//! - **Engine bridge** (`client`): the [`EngineClient`] boundary, local or HTTP
//! - **Rule base** (`kb`): CSV rules with forward and backward chaining
//! - **Rendering** (`render`): text and JSON output
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use artdoc::client::EngineBridge;
//! use artdoc::controller::DiagnosticSession;
//! use artdoc::kb::KnowledgeBase;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let kb = KnowledgeBase::load("datasets/knowledge_base.csv".as_ref())?;
//! let session = DiagnosticSession::start(EngineBridge::local(Arc::new(kb))).await?;
//! session.toggle(&"fever".into())?;
//! session.toggle(&"cough".into())?;
//! let result = session.run_diagnosis().await?;
//! for rule in &result.fired_rules {
//!     println!("{} -> {}", rule.rule_id, rule.conclusion);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`DiagnosticSession`]: controller::DiagnosticSession
//! [`EngineClient`]: client::EngineClient

pub mod catalog;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod kb;
pub mod model;
pub mod paths;
pub mod render;
pub mod session;
