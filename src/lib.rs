//! INLEARN Client Core Library
//!
//! This crate provides the session and playback orchestration core of
//! the INLEARN training platform client: the diagnostic assessment
//! workflow, simulation conversation state, exclusive audio playback
//! arbitration, persistence, and telemetry.

pub mod api;
pub mod audio;
pub mod config;
pub mod diagnostic;
pub mod persistence;
pub mod persona;
pub mod simulation;
pub mod telemetry;
