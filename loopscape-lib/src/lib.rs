//! # Loopscape Library
//!
//! Core of the loopscape renderer: loudness normalization, beat-aligned loop
//! padding, loop-length reconciliation and a bounded-memory streaming mixer
//! that turns a handful of short clips into an arbitrarily long soundscape.

pub mod audio;
pub mod beats;
pub mod config;
pub mod constants;
pub mod dsp;
pub mod error;
pub mod export;
pub mod generate;
pub mod mix;

pub use error::MixError;
