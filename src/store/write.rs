//! Serialization of a node store into an XML node document.

use super::{NodeRecord, StoreError};
use crate::array::DataBuffer;
use crate::config::FileType;
use crate::traits::NodeId;
use crate::utils;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use std::io::Write;

pub(crate) const DOCUMENT_ELEMENT: &str = "CGNSNodeFile";
pub(crate) const DOCUMENT_VERSION: &str = "1.0";

/// encoding of a single `<Data>` payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Encoding {
    Ascii,
    Base64,
}

impl Encoding {
    pub(crate) fn to_str(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::Base64 => "base64",
        }
    }

    /// character payloads are always base64 so that blanks and nul bytes survive
    fn for_payload(file_type: FileType, data: &DataBuffer) -> Self {
        match (file_type, data) {
            (_, DataBuffer::Character(_)) => Encoding::Base64,
            (FileType::Ascii, _) => Encoding::Ascii,
            (FileType::Base64, _) => Encoding::Base64,
        }
    }
}

pub(crate) fn write_document<W: Write>(
    writer: W,
    nodes: &[Option<NodeRecord>],
    free: &[u64],
    file_type: FileType,
) -> Result<(), StoreError> {
    let mut writer = Writer::new_with_indent(writer, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut start = BytesStart::new(DOCUMENT_ELEMENT);
    start.push_attribute(("version", DOCUMENT_VERSION));
    start.push_attribute(("encoding", file_type.as_str()));
    writer.write_event(Event::Start(start))?;

    if let Some(Some(root)) = nodes.first() {
        write_node(&mut writer, nodes, NodeId(0), root, file_type)?;
    }

    if !free.is_empty() {
        let mut element = BytesStart::new("Free");
        element.push_attribute(("ids", join(free.iter()).as_str()));
        writer.write_event(Event::Empty(element))?;
    }

    writer.write_event(Event::End(BytesEnd::new(DOCUMENT_ELEMENT)))?;
    writer.into_inner().flush()?;

    Ok(())
}

fn write_node<W: Write>(
    writer: &mut Writer<W>,
    nodes: &[Option<NodeRecord>],
    id: NodeId,
    record: &NodeRecord,
    file_type: FileType,
) -> Result<(), StoreError> {
    let id_string = id.0.to_string();

    if let Some(link) = &record.link {
        let mut element = BytesStart::new("Link");
        element.push_attribute(("id", id_string.as_str()));
        element.push_attribute(("name", record.name.as_str()));
        element.push_attribute(("file", link.file.as_str()));
        element.push_attribute(("path", link.path.as_str()));
        writer.write_event(Event::Empty(element))?;
        return Ok(());
    }

    let mut element = BytesStart::new("Node");
    element.push_attribute(("id", id_string.as_str()));
    element.push_attribute(("name", record.name.as_str()));
    element.push_attribute(("label", record.label.as_str()));

    if let Some(data_type) = record.data_type {
        element.push_attribute(("type", data_type.code()));
        element.push_attribute(("dims", join(record.dims.iter()).as_str()));
    }

    if record.data.is_none() && record.children.is_empty() {
        writer.write_event(Event::Empty(element))?;
        return Ok(());
    }

    writer.write_event(Event::Start(element))?;

    if let Some(data) = &record.data {
        write_data(writer, data, file_type)?;
    }

    for child in &record.children {
        if let Some(Some(child_record)) = nodes.get(child.index()) {
            write_node(writer, nodes, *child, child_record, file_type)?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("Node")))?;
    Ok(())
}

fn write_data<W: Write>(
    writer: &mut Writer<W>,
    data: &DataBuffer,
    file_type: FileType,
) -> Result<(), StoreError> {
    let encoding = Encoding::for_payload(file_type, data);

    let text = match encoding {
        Encoding::Ascii => ascii_text(data),
        Encoding::Base64 => base64::encode(utils::buffer_to_le_bytes(data)),
    };

    let mut element = BytesStart::new("Data");
    element.push_attribute(("format", encoding.to_str()));

    if text.is_empty() {
        writer.write_event(Event::Empty(element))?;
    } else {
        writer.write_event(Event::Start(element))?;
        writer.write_event(Event::Text(BytesText::new(&text)))?;
        writer.write_event(Event::End(BytesEnd::new("Data")))?;
    }

    Ok(())
}

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

/// whitespace separated text of a numeric buffer, floats formatted with `ryu`
fn ascii_text(data: &DataBuffer) -> String {
    let mut buffer = ryu::Buffer::new();
    let mut out = Vec::with_capacity(data.len());

    match data {
        DataBuffer::Integer(v) => out.extend(v.iter().map(|x| x.to_string())),
        DataBuffer::LongInteger(v) => out.extend(v.iter().map(|x| x.to_string())),
        DataBuffer::RealSingle(v) => out.extend(v.iter().map(|x| buffer.format(*x).to_string())),
        DataBuffer::RealDouble(v) => out.extend(v.iter().map(|x| buffer.format(*x).to_string())),
        DataBuffer::ComplexSingle(v) => v.iter().for_each(|x| {
            out.push(buffer.format(x.re).to_string());
            out.push(buffer.format(x.im).to_string());
        }),
        DataBuffer::ComplexDouble(v) => v.iter().for_each(|x| {
            out.push(buffer.format(x.re).to_string());
            out.push(buffer.format(x.im).to_string());
        }),
        DataBuffer::Character(v) => out.push(String::from_utf8_lossy(v).into_owned()),
    }

    out.join(" ")
}
