//! Error rendering using ariadne
//!
//! Formats the diagnostics carried by a compilation [`Error`] against the
//! original source, with spans underlined and severities color-coded. The
//! core crate stays terminal-agnostic; everything presentational lives
//! here.

use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;

use crate::{Diagnostic, Error, Severity};

const ORIGIN: &str = "<script>";

/// Render an error against its source with formatting to stderr.
pub fn render_error(source: &str, error: &Error) {
    render_error_to_writer(source, error, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer.
///
/// Useful when the output goes to a file, a buffer, or a custom stream.
pub fn render_error_to(source: &str, error: &Error, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(source, error, writer, true)
}

/// Render an error to a String (useful for tests, web UIs, etc.).
pub fn render_error_to_string(source: &str, error: &Error) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(source, error, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without ANSI color codes, making the output
/// easier to compare in tests.
pub fn render_error_to_string_no_color(source: &str, error: &Error) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(source, error, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    source: &str,
    error: &Error,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    render_diagnostics(source, error.diagnostics(), writer, use_color)
}

fn render_diagnostics(
    source: &str,
    diagnostics: &[Diagnostic],
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    for diag in diagnostics {
        let mut colors = ColorGenerator::new();
        colors.next(); // Skip the first color.

        let kind = match diag.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Normal | Severity::Trace => ReportKind::Advice,
        };

        // Clamp to the source so a default span still renders.
        let mut range = diag.span.range();
        range.start = range.start.min(source.len());
        range.end = range.end.clamp(range.start, source.len());

        let color = colors.next();
        Report::build(kind, (ORIGIN, range.clone()))
            .with_message(diag.message.as_str())
            .with_config(ariadne::Config::default().with_color(use_color))
            .with_label(
                Label::new((ORIGIN, range))
                    .with_message(diag.message.as_str())
                    .with_color(color),
            )
            .finish()
            .write((ORIGIN, Source::from(source)), &mut *writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, Options};

    #[test]
    fn renders_undefined_identifier_with_source_line() {
        let source = "a = nope;";
        let err = compile(source, Options::default()).unwrap_err();
        let output = render_error_to_string_no_color(source, &err);
        assert!(output.contains("nope"), "{output}");
        assert!(output.contains("Error"), "{output}");
    }

    #[test]
    fn renders_multiple_diagnostics() {
        let source = "a = x;\nb = y;";
        let err = compile(source, Options::default()).unwrap_err();
        let output = render_error_to_string_no_color(source, &err);
        assert!(output.lines().count() > 2, "{output}");
    }
}
