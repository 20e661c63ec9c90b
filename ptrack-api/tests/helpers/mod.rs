//! Test Helper Utilities
//!
//! Shared utilities for testing ptrack-api

#![allow(dead_code)]

pub mod fake_collaborators;
pub mod test_app;

pub use fake_collaborators::{
    fake_collaborators, DeletingTranscriber, ScriptedAdvisor, ScriptedAnalyzer,
    ScriptedTranscriber, SlowTranscriber,
};
pub use test_app::{multipart_body, send, MultipartPart, TestApp, BOUNDARY};
