//! Thinkbot - guided problem-framing assistant for the LINE platform.
//!
//! Users pick a problem category from a numbered menu, confirm it, and then
//! hold a category-scoped dialogue with an LLM. The conversation
//! orchestration engine lives in `application::handlers`.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
