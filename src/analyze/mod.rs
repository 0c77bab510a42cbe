// src/analyze/mod.rs
//! Candidate analysis: content filtering and persona matching.

pub mod filter;
pub mod matcher;

pub use crate::analyze::filter::{ContentFilter, FilterConfig, RejectReason, Verdict};
pub use crate::analyze::matcher::{rank, RankedPersona};
