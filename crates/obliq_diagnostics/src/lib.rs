//! Diagnostic creation, severity management, and terminal rendering.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels,
//! error codes, source labels, and suggested fixes. The thread-safe [`DiagnosticSink`]
//! accumulates diagnostics during validation, flattening, simulation, and code
//! generation; [`DiagnosticRenderer`] implementations format them for humans.
//! This *is* the system's logging: there is no separate `log`/`tracing` layer,
//! because every message a user needs is already a typed, collectible value.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod label;
pub mod renderer;
pub mod severity;
pub mod sink;
pub mod suggested_fix;

pub use code::{codes, Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use label::{Label, LabelStyle};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
pub use suggested_fix::{Replacement, SuggestedFix};
