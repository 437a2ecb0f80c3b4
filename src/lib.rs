//! Tollgate - Request Throttling Service
//!
//! This crate protects a username-availability lookup endpoint with two
//! cooperating in-process throttles keyed by client IP: a sliding-window
//! rate limiter and a failed-attempt tracker with escalating lockouts.
//! The throttles are plain library components; the HTTP surface composes
//! them in front of the real lookup.

pub mod config;
pub mod error;
pub mod http;
pub mod throttle;
pub mod timeout;
