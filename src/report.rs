//! Diagnostic sink shared by the import layer and the layout core.
//!
//! Recoverable problems (a staff number out of range, a backup past the
//! start of a measure) are corrected in place and recorded here so the
//! embedding application can surface them.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Column being built when the problem was found, if any
    pub column: Option<usize>,
    pub message: String,
}

/// Collects diagnostics and mirrors each one to the `log` facade.
#[derive(Debug, Default, Clone)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, column: Option<usize>, message: impl Into<String>) {
        self.push(Severity::Info, column, message.into());
    }

    pub fn warn(&mut self, column: Option<usize>, message: impl Into<String>) {
        self.push(Severity::Warning, column, message.into());
    }

    pub fn error(&mut self, column: Option<usize>, message: impl Into<String>) {
        self.push(Severity::Error, column, message.into());
    }

    fn push(&mut self, severity: Severity, column: Option<usize>, message: String) {
        match severity {
            Severity::Info => log::info!("[scorespacing] {message}"),
            Severity::Warning => log::warn!("[scorespacing] {message}"),
            Severity::Error => log::error!("[scorespacing] {message}"),
        }
        self.diagnostics.push(Diagnostic { severity, column, message });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_warnings(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity != Severity::Info)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Move the diagnostics of `other` into this sink without logging
    /// them again.
    pub fn append(&mut self, other: &mut Reporter) {
        self.diagnostics.append(&mut other.diagnostics);
    }

    /// Hand over the collected diagnostics, leaving the sink empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order() {
        let mut r = Reporter::new();
        r.info(None, "start");
        r.warn(Some(3), "staff 4 clamped to 1");
        assert_eq!(r.diagnostics().len(), 2);
        assert_eq!(r.diagnostics()[1].column, Some(3));
        assert!(r.has_warnings());
    }

    #[test]
    fn take_empties_the_sink() {
        let mut r = Reporter::new();
        r.error(None, "boom");
        let taken = r.take();
        assert_eq!(taken.len(), 1);
        assert!(r.is_empty());
        assert!(!r.has_warnings());
    }
}
