//! hwlock - License server binding license keys to hardware IDs
//!
//! This library provides the license validation/registration state machine,
//! the document store it runs on, and the public and admin HTTP handlers.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod licensing;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod util;
