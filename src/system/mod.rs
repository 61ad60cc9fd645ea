//! System utilities and monitoring
//!
//! This module contains metrics and other process-level utilities shared by
//! both halves of the pipeline.

pub mod metrics;
