//! Pull-based event source over an export document
//!
//! Reads the document in one forward pass and yields one [`RawEvent`] per
//! `Record` or `Workout` element, at any depth. The read buffer is reused
//! for every XML event and each yielded event owns only its attributes, so
//! memory does not grow with file size.
//!
//! The parser never resolves entities: the DOCTYPE is skipped, nothing is
//! fetched, and only the predefined XML entities and character references
//! are decoded. Any other entity reference is a structural error.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::classify::{ElementKind, RawEvent};
use crate::error::{HealthError, Result};

const READ_BUFFER: usize = 256 * 1024;

pub struct EventSource<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    seen_root: bool,
    finished: bool,
}

impl EventSource<BufReader<File>> {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(READ_BUFFER, file)))
    }
}

impl<R: BufRead> EventSource<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        reader.check_end_names(true);
        reader.expand_empty_elements(false);

        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
            seen_root: false,
            finished: false,
        }
    }

    fn next_event(&mut self) -> Result<Option<RawEvent>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    self.depth += 1;
                    self.seen_root = true;
                    if let Some(kind) = ElementKind::from_tag(e.name().as_ref()) {
                        return raw_event(kind, &e).map(Some);
                    }
                }
                Event::Empty(e) => {
                    self.seen_root = true;
                    if let Some(kind) = ElementKind::from_tag(e.name().as_ref()) {
                        return raw_event(kind, &e).map(Some);
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                }
                Event::Eof => {
                    if !self.seen_root {
                        return Err(HealthError::malformed("document has no root element"));
                    }
                    if self.depth > 0 {
                        return Err(HealthError::malformed(format!(
                            "unexpected end of document at position {} ({} unclosed elements)",
                            self.reader.buffer_position(),
                            self.depth
                        )));
                    }
                    return Ok(None);
                }
                // DOCTYPE, declarations, comments, text
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for EventSource<R> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn raw_event(kind: ElementKind, element: &BytesStart) -> Result<RawEvent> {
    let mut attributes = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| HealthError::malformed(format!("invalid attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(RawEvent::new(kind, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn events(xml: &str) -> Vec<Result<RawEvent>> {
        EventSource::new(Cursor::new(xml.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_yields_records_and_workouts() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
  <ExportDate value="2024-01-15 10:00:00 -0500"/>
  <Record type="HKQuantityTypeIdentifierStepCount" value="5000"/>
  <Record type="HKQuantityTypeIdentifierHeartRate" value="72">
    <MetadataEntry key="HKMetadataKeyHeartRateMotionContext" value="0"/>
  </Record>
  <Workout workoutActivityType="HKWorkoutActivityTypeRunning" duration="30">
    <WorkoutEvent type="HKWorkoutEventTypeSegment"/>
  </Workout>
</HealthData>"#;

        let events: Vec<RawEvent> = events(xml).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, ElementKind::Record);
        assert_eq!(events[0].attr("value"), Some("5000"));
        assert_eq!(events[1].attr("type"), Some("HKQuantityTypeIdentifierHeartRate"));
        assert_eq!(events[2].kind, ElementKind::Workout);
        assert_eq!(events[2].attr("duration"), Some("30"));
    }

    #[test]
    fn test_nested_records_are_yielded() {
        let xml = r#"<HealthData>
  <Correlation type="HKCorrelationTypeIdentifierBloodPressure">
    <Record type="HKQuantityTypeIdentifierBloodPressureSystolic" value="120"/>
    <Record type="HKQuantityTypeIdentifierBloodPressureDiastolic" value="80"/>
  </Correlation>
</HealthData>"#;
        let events = events(xml);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[test]
    fn test_predefined_entities_are_decoded() {
        let xml = r#"<HealthData><Record type="x" sourceName="Bob&apos;s &amp; Watch"/></HealthData>"#;
        let event = events(xml).remove(0).unwrap();
        assert_eq!(event.attr("sourceName"), Some("Bob's & Watch"));
    }

    #[test]
    fn test_declared_entities_are_never_expanded() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE HealthData [
  <!ENTITY xxe SYSTEM "file:///etc/passwd">
]>
<HealthData>
  <Record type="HKQuantityTypeIdentifierStepCount" sourceName="&xxe;" value="1"/>
</HealthData>"#;
        let events = events(xml);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(HealthError::Malformed(_))));
    }

    #[test]
    fn test_doctype_with_internal_subset_is_skipped() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE HealthData [
<!ELEMENT HealthData (ExportDate,Me,(Record|Workout)*)>
<!ATTLIST HealthData locale CDATA #REQUIRED>
]>
<HealthData locale="en_US">
  <Record type="HKQuantityTypeIdentifierStepCount" value="1"/>
</HealthData>"#;
        let events = events(xml);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[test]
    fn test_truncated_document_is_an_error() {
        let xml = r#"<HealthData>
  <Record type="HKQuantityTypeIdentifierStepCount" value="1"/>
  <Record type="HKQuantityTypeIdentifierStepCount" value="2"/>"#;
        let events = events(xml);
        assert_eq!(events.len(), 3);
        assert!(events[0].is_ok() && events[1].is_ok());
        assert!(matches!(events[2], Err(HealthError::Malformed(_))));
    }

    #[test]
    fn test_mismatched_tags_are_an_error() {
        let events = events("<HealthData><Workout></Record></HealthData>");
        assert!(events.iter().any(|e| e.is_err()));
    }

    #[test]
    fn test_non_xml_input_is_an_error() {
        let events = events("not xml at all");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(HealthError::Malformed(_))));
    }

    #[test]
    fn test_empty_root_yields_nothing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
</HealthData>"#;
        assert!(events(xml).is_empty());
    }

    #[test]
    fn test_source_stops_after_error() {
        let mut source = EventSource::new(Cursor::new(b"garbage".to_vec()));
        assert!(source.next().unwrap().is_err());
        assert!(source.next().is_none());
    }
}
