//! End-to-end and property-based test suite for Ember.
//!
//! Builds real signed transactions against in-memory explorers and checks
//! the value-conservation, determinism, and encoding invariants of the
//! coin selector and assembler under randomized inputs.

pub mod helpers;
