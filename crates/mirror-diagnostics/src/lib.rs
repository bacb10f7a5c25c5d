//! Rich error diagnostics for gitmirror.
//!
//! Uses miette for error formatting with actionable suggestions. Only
//! whole-run failures live here: per-repository errors are a `SyncResult`
//! classification, not a thrown error, and never appear as a `MirrorError`.

pub use miette::{Diagnostic, Report, Result};
use mirror_types::SyncResult;
use thiserror::Error;

/// A whole-run gitmirror error.
#[derive(Error, Diagnostic, Debug)]
pub enum MirrorError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(mirror::config::invalid))]
    Configuration { message: String },

    #[error("must specify exactly one of --user or --org")]
    #[diagnostic(
        code(mirror::config::target_ambiguous),
        help("pass either --user <name> or --org <name>, not both and not neither")
    )]
    NoTarget,

    #[error("failed to list repositories: {message}")]
    #[diagnostic(code(mirror::enumeration::failed))]
    Enumeration { message: String },

    #[error("git executable not found")]
    #[diagnostic(
        code(mirror::vcs::tool_missing),
        help("install git and make sure it is on your PATH")
    )]
    ToolMissing,

    /// The run was cancelled mid-flight. Carries whatever `SyncResult` had
    /// been assembled so far, since a cancelled run still reports the
    /// repositories it did manage to classify before the abort fired.
    #[error("sync was cancelled")]
    #[diagnostic(code(mirror::cancelled))]
    Cancelled { partial: SyncResult },
}

impl MirrorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::Enumeration {
            message: message.into(),
        }
    }
}

/// Install miette's pretty-printing hook. Safe to call more than once.
pub fn setup() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))
    .ok();
}
