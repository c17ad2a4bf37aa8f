//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into family and resource use-cases.
//! - Gate actions through the permission engine before storage is touched.
//!
//! # Invariants
//! - Services never bypass repository enforcement; their checks only
//!   short-circuit calls storage would refuse anyway.

pub mod family_service;
pub mod resource_service;
