// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ReportEntry, ReportStatus};
use crate::errors::ReportParseError;
use camino::Utf8PathBuf;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

/// Parses a JUnit XML report into its test cases, in document order.
///
/// `<testsuite>` elements may nest to any depth. A test case without a `file` attribute inherits
/// the `file` of its closest enclosing suite.
pub fn parse_junit(xml: &str) -> Result<Vec<ReportEntry>, ReportParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut suite_files: Vec<Option<Utf8PathBuf>> = Vec::new();
    let mut pending: Option<PendingCase> = None;
    let mut saw_root = false;
    // Elements opened but not yet closed.
    let mut open = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|error| ReportParseError::Xml {
                position: reader.error_position() as u64,
                error,
            })?;
        match event {
            Event::Start(start) => {
                open += 1;
                match start.name().as_ref() {
                    b"testsuites" => saw_root = true,
                    b"testsuite" => {
                        saw_root = true;
                        suite_files.push(attribute(&start, b"file")?.map(Utf8PathBuf::from));
                    }
                    b"testcase" => {
                        pending = Some(PendingCase::new(&start, inherited_file(&suite_files))?);
                    }
                    name => {
                        if let Some(case) = &mut pending {
                            case.start_child(name, &start, true)?;
                        }
                    }
                }
            }
            Event::Empty(start) => match start.name().as_ref() {
                b"testsuites" | b"testsuite" => saw_root = true,
                b"testcase" => {
                    let case = PendingCase::new(&start, inherited_file(&suite_files))?;
                    entries.push(case.finish());
                }
                name => {
                    if let Some(case) = &mut pending {
                        case.start_child(name, &start, false)?;
                    }
                }
            },
            Event::End(end) => {
                open = open.saturating_sub(1);
                match end.name().as_ref() {
                    b"testsuite" => {
                        suite_files.pop();
                    }
                    b"testcase" => {
                        if let Some(case) = pending.take() {
                            entries.push(case.finish());
                        }
                    }
                    b"failure" | b"error" | b"skipped" => {
                        if let Some(case) = &mut pending {
                            case.collecting = false;
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(text) => {
                if let Some(case) = pending.as_mut().filter(|case| case.collecting) {
                    let text = text.unescape().map_err(|error| ReportParseError::Xml {
                        position: reader.buffer_position() as u64,
                        error,
                    })?;
                    case.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(case) = pending.as_mut().filter(|case| case.collecting) {
                    case.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => {
                if open > 0 {
                    return Err(ReportParseError::Truncated {
                        position: reader.buffer_position() as u64,
                        unclosed: open,
                    });
                }
                break;
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(ReportParseError::NotJunit);
    }
    Ok(entries)
}

fn inherited_file(suite_files: &[Option<Utf8PathBuf>]) -> Option<Utf8PathBuf> {
    suite_files.iter().rev().find_map(|file| file.clone())
}

fn attribute(start: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, ReportParseError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|error| ReportParseError::Attribute { error })?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|error| ReportParseError::Xml { position: 0, error })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

#[derive(Debug)]
struct PendingCase {
    name: String,
    classname: Option<String>,
    file: Option<Utf8PathBuf>,
    line: Option<u32>,
    status: ReportStatus,
    message: Option<String>,
    text: String,
    collecting: bool,
}

impl PendingCase {
    fn new(
        start: &BytesStart<'_>,
        suite_file: Option<Utf8PathBuf>,
    ) -> Result<Self, ReportParseError> {
        let classname = match attribute(start, b"class")? {
            Some(class) => Some(class),
            None => attribute(start, b"classname")?,
        };
        Ok(Self {
            name: attribute(start, b"name")?.unwrap_or_default(),
            classname: classname.filter(|class| !class.is_empty()),
            file: attribute(start, b"file")?.map(Utf8PathBuf::from).or(suite_file),
            line: attribute(start, b"line")?.and_then(|line| line.parse().ok()),
            status: ReportStatus::Passed,
            message: None,
            text: String::new(),
            collecting: false,
        })
    }

    fn start_child(
        &mut self,
        name: &[u8],
        start: &BytesStart<'_>,
        has_content: bool,
    ) -> Result<(), ReportParseError> {
        let status = match name {
            b"failure" => ReportStatus::Failed,
            b"error" => ReportStatus::Error,
            b"skipped" => ReportStatus::Skipped,
            _ => return Ok(()),
        };
        // The first non-passing child decides the status.
        if self.status == ReportStatus::Passed {
            self.status = status;
            self.message = attribute(start, b"message")?.filter(|message| !message.is_empty());
            self.collecting = has_content;
        }
        Ok(())
    }

    fn finish(self) -> ReportEntry {
        let text = self.text.trim();
        let failure_detail = match (self.message, text.is_empty()) {
            (Some(message), true) => Some(message),
            (Some(message), false) if text.starts_with(message.as_str()) => Some(text.to_owned()),
            (Some(message), false) => Some(format!("{message}\n{text}")),
            (None, false) => Some(text.to_owned()),
            (None, true) => None,
        };
        ReportEntry {
            name: self.name,
            classname: self.classname,
            file: self.file,
            line: self.line,
            status: self.status,
            failure_detail,
        }
    }
}
