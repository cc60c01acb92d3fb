//! liftlog: a resumable workout session engine.
//!
//! The engine drives one in-progress training session at a time: it logs
//! sets, runs fixed and open-ended rest, survives restarts through a single
//! persisted record, and only turns a session into a finished workout once it
//! passes the completion checks.

pub mod archive;
pub mod catalog;
pub mod clock;
pub mod db;
pub mod engine;
pub mod error;
pub mod kv;
pub mod lookup;
pub mod models;
pub mod profile;
pub mod storage;

pub use error::{EngineError, Result};
