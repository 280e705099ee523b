//! # Architecture Abstraction Layer
//!
//! The hardware side of the context-switch protocol. Currently implements
//! the ARMv7-M (Cortex-M3) port; other cores get sibling modules.

pub mod cortex_m3;
