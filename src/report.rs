//! Run-scoped console/log reporting.
//!
//! A [`Report`] is created once per process run and handed to every stage by
//! `&mut`. It forwards each message to `tracing` and keeps the warning and
//! error tallies used for the closing status line.

use tracing::{error, info, warn};

use crate::config::{RunIdentity, Settings};

pub const RUN_SEPARATOR: &str = "###############################################################################";
pub const DIVIDER: &str = "-------------------------------------------------------";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Default)]
pub struct Report {
    warnings: usize,
    errors: usize,
    /// Every emitted line, kept in memory so the whole run log can be handed
    /// on as one text after the run, such as a status mail body.
    transcript: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the run with the application banner and session identity.
    pub fn header(&mut self, settings: &Settings, identity: &RunIdentity) {
        self.emit(Level::Info, RUN_SEPARATOR.to_string());
        self.emit(Level::Info, format!(" Application: {}", settings.app_name));
        self.emit(
            Level::Info,
            format!(
                " Session:     Running on {} in {} mode as the {} account",
                identity.computer, settings.environment, identity.user
            ),
        );
        self.emit(Level::Info, DIVIDER.to_string());
    }

    pub fn section(&mut self, message: impl AsRef<str>) {
        self.emit(Level::Info, format!(" {}", message.as_ref()));
    }

    pub fn step(&mut self, message: impl AsRef<str>) {
        self.emit(Level::Info, format!("    {}", message.as_ref()));
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.emit(Level::Info, format!("    - {}", message.as_ref()));
    }

    /// Secondary detail under an `info` line, such as list members.
    pub fn detail(&mut self, message: impl AsRef<str>) {
        self.emit(Level::Info, format!("    -    {}", message.as_ref()));
    }

    pub fn warning(&mut self, message: impl AsRef<str>) {
        self.warnings += 1;
        self.emit(Level::Warning, format!("    ! {}", message.as_ref()));
    }

    /// Continuation of the previous warning; not counted.
    pub fn warning_more(&mut self, message: impl AsRef<str>) {
        self.emit(Level::Warning, format!("    !    {}", message.as_ref()));
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.errors += 1;
        self.emit(Level::Error, format!("* {}", message.as_ref()));
    }

    /// Continuation of the previous error; not counted.
    pub fn error_more(&mut self, message: impl AsRef<str>) {
        self.emit(Level::Error, format!("       * {}", message.as_ref()));
    }

    pub fn blank(&mut self) {
        self.emit(Level::Info, String::new());
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn succeeded(&self) -> bool {
        self.errors == 0
    }

    /// Every line emitted so far, in order. This is the in-memory copy of
    /// the run log, independent of which `tracing` layers are installed.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn status_line(&self) -> String {
        match (self.errors, self.warnings) {
            (0, 0) => "Status: Success!".to_string(),
            (0, warnings) => format!("*** {} found ***", counted("warning", warnings, true)),
            (errors, 0) => format!("*** {} found ***", counted("error", errors, true)),
            (errors, warnings) => format!(
                "*** {} and {} found ***",
                counted("error", errors, false),
                counted("warning", warnings, true)
            ),
        }
    }

    /// Writes the closing status line at the level matching the tallies.
    pub fn finish(&mut self) {
        let level = if self.errors > 0 {
            Level::Error
        } else if self.warnings > 0 {
            Level::Warning
        } else {
            Level::Info
        };
        let status = self.status_line();
        self.blank();
        self.emit(level, status);
        self.blank();
    }

    fn emit(&mut self, level: Level, line: String) {
        match level {
            Level::Info => info!("{}", line),
            Level::Warning => warn!("{}", line),
            Level::Error => error!("{}", line),
        }
        self.transcript.push(line);
    }
}

/// `counted("error", 2, true)` gives `"2 errors were"`; without the verb, `"2 errors"`.
pub fn counted(noun: &str, count: usize, with_verb: bool) -> String {
    let (suffix, verb) = if count == 1 { ("", "was") } else { ("s", "were") };
    if with_verb {
        format!("{} {}{} {}", count, noun, suffix, verb)
    } else {
        format!("{} {}{}", count, noun, suffix)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("error", 1, true, "1 error was")]
    #[case("error", 2, true, "2 errors were")]
    #[case("error", 1, false, "1 error")]
    #[case("warning", 2, false, "2 warnings")]
    #[case("warning", 0, true, "0 warnings were")]
    fn test_counted(
        #[case] noun: &str,
        #[case] count: usize,
        #[case] with_verb: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(counted(noun, count, with_verb), expected);
    }

    #[test]
    fn test_continuation_lines_are_not_counted() {
        let mut report = Report::new();
        report.warning("first");
        report.warning_more("more detail");
        report.error("boom");
        report.error_more("hint");

        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.error_count(), 1);
        assert!(!report.succeeded());
        assert_eq!(
            report.transcript(),
            &["    ! first", "    !    more detail", "* boom", "       * hint"]
        );
    }

    #[test]
    fn test_status_line() {
        let mut report = Report::new();
        assert_eq!(report.status_line(), "Status: Success!");

        report.warning("a");
        report.warning("b");
        assert_eq!(report.status_line(), "*** 2 warnings were found ***");

        report.error("c");
        assert_eq!(
            report.status_line(),
            "*** 1 error and 2 warnings were found ***"
        );

        let mut only_errors = Report::new();
        only_errors.error("x");
        assert_eq!(only_errors.status_line(), "*** 1 error was found ***");
    }

    #[test]
    fn test_finish_appends_status() {
        let mut report = Report::new();
        report.info("done");
        report.finish();
        assert_eq!(
            report.transcript(),
            &["    - done", "", "Status: Success!", ""]
        );
    }
}
