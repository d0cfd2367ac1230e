use crate::prelude::*;

use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;

use super::error::ParsedNameOrBytes;

use std::fmt;

/// short description of an xml event for error messages
#[derive(From, Debug)]
pub(crate) struct EventSummary {
    name: Option<ParsedNameOrBytes>,
    e_type: &'static str,
}

impl fmt::Display for EventSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "element {name} with type {}", self.e_type),
            None => write!(f, "unnamed name with type {}", self.e_type),
        }
    }
}

impl EventSummary {
    pub(crate) fn new(e: &Event) -> Self {
        Self {
            name: byte_name(e).map(ParsedNameOrBytes::from),
            e_type: event_type(e),
        }
    }

    pub(crate) fn start(bytes: &BytesStart<'_>) -> Self {
        Self {
            name: Some(ParsedNameOrBytes::from(bytes.name())),
            e_type: "start",
        }
    }

    pub(crate) fn end(bytes: &BytesEnd<'_>) -> Self {
        Self {
            name: Some(ParsedNameOrBytes::from(bytes.name())),
            e_type: "end",
        }
    }
}

fn byte_name<'a>(event: &'a Event<'_>) -> Option<QName<'a>> {
    match event {
        Event::Start(s) | Event::Empty(s) => Some(s.name()),
        Event::End(e) => Some(e.name()),
        _ => None,
    }
}

fn event_type(event: &Event) -> &'static str {
    match event {
        Event::Start(_) => "start",
        Event::End(_) => "end",
        Event::Empty(_) => "empty",
        Event::Text(_) => "text",
        Event::Comment(_) => "comment",
        Event::CData(_) => "cdata",
        Event::Decl(_) => "decl",
        Event::PI(_) => "pi",
        Event::DocType(_) => "doctype",
        Event::Eof => "eof",
    }
}
