//! Human-readable syntax error reports

use crate::parser::ParseError;
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};

impl ParseError {
    /// Render this error against its source text as a plain-text report
    /// with the offending location underlined.
    pub fn report(&self, source: &str) -> String {
        let start = self.position().min(source.len());
        let end = source[start..]
            .chars()
            .next()
            .map_or(start, |c| start + c.len_utf8());

        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, start..end)
            .with_config(
                Config::default()
                    .with_color(false)
                    .with_index_type(IndexType::Byte),
            )
            .with_message("invalid nginx configuration")
            .with_label(Label::new(start..end).with_message(self.to_string()))
            .finish()
            .write(Source::from(source), &mut out);

        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}
