//! SRU searchRetrieve response parser using quick-xml
//!
//! Works for SRU 1.2 and 2.0: elements are matched by local name, so the
//! `srw:` / `sru:` prefixes (or none) make no difference.

use std::fmt::Display;

use harvestline_core::PipelineError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

/// Read access to a record without committing to a particular XML tree API.
pub trait RecordDocument {
    /// Text of the first descendant element named `local_name`, in any namespace.
    fn find_text(&self, local_name: &str) -> Option<String>;
}

/// One `recordData` element, serialized as a standalone document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordElement {
    xml: Vec<u8>,
}

impl RecordElement {
    pub fn new(xml: impl Into<Vec<u8>>) -> Self {
        Self { xml: xml.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.xml
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.xml
    }
}

impl RecordDocument for RecordElement {
    fn find_text(&self, local_name: &str) -> Option<String> {
        let mut reader = Reader::from_reader(self.xml.as_slice());
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).ok()? {
                Event::Start(e) if e.local_name().as_ref() == local_name.as_bytes() => {
                    return element_text(&mut reader).ok();
                }
                Event::Empty(e) if e.local_name().as_ref() == local_name.as_bytes() => {
                    return Some(String::new());
                }
                Event::Eof => return None,
                _ => {}
            }
            buf.clear();
        }
    }
}

/// Parsed page of an SRU response.
#[derive(Debug, Default)]
pub struct SearchResponse {
    pub records: Vec<RecordElement>,
    /// `numberOfRecords` reported by the server, if any
    pub number_of_records: Option<u64>,
    /// Diagnostic messages (`diagnostic/message`, `diagnostic/details`)
    pub diagnostics: Vec<String>,
}

fn xml_error(e: impl Display) -> PipelineError {
    PipelineError::Parse(e.to_string())
}

/// Parse one searchRetrieve response body.
///
/// Every `recordData` element is copied out together with the namespace
/// declarations in scope on its ancestors.
pub fn parse_response(xml: &[u8]) -> Result<SearchResponse, PipelineError> {
    let mut reader = Reader::from_reader(xml);
    let mut response = SearchResponse::default();
    let mut buf = Vec::new();
    // xmlns declarations of each open ancestor element
    let mut scopes: Vec<Vec<(Vec<u8>, Vec<u8>)>> = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"recordData" => {
                let start = with_inherited_namespaces(&e, &scopes)?;
                response
                    .records
                    .push(RecordElement::new(copy_element(&mut reader, start)?));
            }
            Event::Empty(e) if e.local_name().as_ref() == b"recordData" => {
                let start = with_inherited_namespaces(&e, &scopes)?;
                let mut writer = Writer::new(Vec::new());
                writer.write_event(Event::Empty(start)).map_err(xml_error)?;
                response.records.push(RecordElement::new(writer.into_inner()));
            }
            Event::Start(e) if e.local_name().as_ref() == b"numberOfRecords" => {
                let text = reader.read_text(e.name()).map_err(xml_error)?;
                response.number_of_records = text.trim().parse().ok();
            }
            Event::Start(e) if e.local_name().as_ref() == b"diagnostic" => {
                let diagnostic = RecordElement::new(copy_element(&mut reader, e.into_owned())?);
                let message = [diagnostic.find_text("message"), diagnostic.find_text("details")]
                    .into_iter()
                    .flatten()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(": ");
                response.diagnostics.push(message);
            }
            Event::Start(e) => {
                saw_root = true;
                scopes.push(namespace_declarations(&e)?);
            }
            Event::Empty(_) => saw_root = true,
            Event::End(_) => {
                scopes.pop();
            }
            Event::Eof if !scopes.is_empty() => {
                return Err(PipelineError::Parse(
                    "document ended inside an open element".into(),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root && response.records.is_empty() {
        return Err(PipelineError::Parse("response contains no XML element".into()));
    }
    Ok(response)
}

/// Concatenated, unescaped text up to the end of the current element.
fn element_text(reader: &mut Reader<&[u8]>) -> Result<String, PipelineError> {
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(xml_error)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(text.trim().to_string())
}

fn namespace_declarations(e: &BytesStart<'_>) -> Result<Vec<(Vec<u8>, Vec<u8>)>, PipelineError> {
    let mut decls = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            decls.push((key.to_vec(), attr.value.into_owned()));
        }
    }
    Ok(decls)
}

/// Owned copy of `e` carrying every ancestor xmlns declaration it doesn't redeclare.
fn with_inherited_namespaces(
    e: &BytesStart<'_>,
    scopes: &[Vec<(Vec<u8>, Vec<u8>)>],
) -> Result<BytesStart<'static>, PipelineError> {
    let own = namespace_declarations(e)?;
    let mut inherited: Vec<(&[u8], &[u8])> = Vec::new();
    for (key, value) in scopes.iter().flatten() {
        match inherited.iter_mut().find(|(k, _)| *k == key.as_slice()) {
            Some(slot) => slot.1 = value.as_slice(),
            None => inherited.push((key.as_slice(), value.as_slice())),
        }
    }

    let mut start = e.to_owned();
    for (key, value) in inherited {
        if !own.iter().any(|(k, _)| k.as_slice() == key) {
            start.push_attribute((key, value));
        }
    }
    Ok(start)
}

/// Re-serialize the element whose start tag was just read, through its end tag.
fn copy_element(
    reader: &mut Reader<&[u8]>,
    start: BytesStart<'static>,
) -> Result<Vec<u8>, PipelineError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(start)).map_err(xml_error)?;

    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => {
                writer.write_event(event).map_err(xml_error)?;
                break;
            }
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(PipelineError::Parse(
                    "document ended inside an open element".into(),
                ));
            }
            _ => {}
        }
        writer.write_event(event).map_err(xml_error)?;
        buf.clear();
    }
    Ok(writer.into_inner())
}
