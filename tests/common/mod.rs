//! Common test utilities for skel-queue integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod service;

pub use fixtures::*;
pub use service::*;
