//! Process-wide tracing span.

use tracing::{Span, span::Entered};

use crate::init::build_version;

/// Keeps the process span entered for the lifetime of the guard.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter a `siphon` span tagged with `command` and the build version.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "siphon",
            command = %command,
            version = %build_version()
        )));
        Self {
            _guard: span.enter(),
        }
    }
}
