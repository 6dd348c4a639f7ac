//! Pipeline stages for handling one job.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the engine adapter can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ workspace ──▶ engine ──▶ discover
//! (JSON)     (scratch)    (MinerU)   (*.md)
//! ```
//!
//! 1. [`input`]     — validate the job payload and decode the base64 PDF
//! 2. [`workspace`] — private scratch directory, removed on every exit path
//! 3. [`engine`]    — the [`engine::Converter`] seam and its CLI adapter
//! 4. [`native`]    — the in-process adapter (text-layer extraction)
//! 5. [`discover`]  — deterministic enumeration of what the engine wrote

pub mod discover;
pub mod engine;
pub mod input;
pub mod native;
pub mod workspace;
