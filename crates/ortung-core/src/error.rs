// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Ortung.
//
// These cover the provider-facing operations (starting updates, requesting
// permission). Problems inside a single delivery never surface here: they
// reach the handler as a `Failure` event or are dropped at the dispatch
// boundary.

use thiserror::Error;

/// Top-level error type for all Ortung operations.
#[derive(Debug, Error)]
pub enum OrtungError {
    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("Android environment unavailable: {0}")]
    AndroidEnvironment(String),

    #[error("location manager must be created on the main thread")]
    NotMainThread,

    #[error("location permission denied")]
    PermissionDenied,

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OrtungError>;
