//! Reading an XML node document back into node records.

use super::error::{self, ParseError};
use super::event_summary::EventSummary;
use super::write::{Encoding, DOCUMENT_ELEMENT};
use super::NodeRecord;
use crate::array::{Complex, DataBuffer, DataType};
use crate::config::FileType;
use crate::traits::{Link, NodeId};
use crate::utils;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use std::io::BufRead;
use std::str::FromStr;

pub(crate) struct Document {
    pub(crate) nodes: Vec<Option<NodeRecord>>,
    pub(crate) free: Vec<u64>,
    pub(crate) file_type: FileType,
}

impl Document {
    fn place(&mut self, id: NodeId, record: NodeRecord) {
        if self.nodes.len() <= id.index() {
            self.nodes.resize(id.index() + 1, None);
        }
        self.nodes[id.index()] = Some(record);
    }
}

/// read an entire node document
pub(crate) fn read_document<R: BufRead>(reader: R) -> Result<Document, ParseError> {
    let mut reader = Reader::from_reader(reader);
    reader.trim_text(true);
    let mut buffer = Vec::new();

    let header = read_document_header(&mut reader, &mut buffer)?;
    let encoding = attribute_string(&header, "encoding", DOCUMENT_ELEMENT)?;
    let file_type = FileType::parse(&encoding).ok_or_else(|| {
        error::UnexpectedAttributeValue::new(
            DOCUMENT_ELEMENT.into(),
            "encoding".into(),
            "ascii or base64".into(),
            encoding.as_str().into(),
        )
    })?;

    let mut document = Document {
        nodes: Vec::new(),
        free: Vec::new(),
        file_type,
    };

    loop {
        let event = read_event(&mut reader, &mut buffer)?;
        match event {
            Event::Start(start) if is_named(&start, "Node") => {
                read_node(&mut reader, &mut buffer, &start, None, true, &mut document)?;
            }
            Event::Empty(empty) if is_named(&empty, "Node") => {
                read_node(&mut reader, &mut buffer, &empty, None, false, &mut document)?;
            }
            Event::Empty(empty) if is_named(&empty, "Free") => {
                document.free = parse_list(&attribute_string(&empty, "ids", "Free")?, "Free")?;
            }
            Event::End(end) if end.name().as_ref() == DOCUMENT_ELEMENT.as_bytes() => break,
            other => {
                let actual = EventSummary::new(&other);
                return Err(error::UnexpectedElement::new("Node", actual).into());
            }
        }
    }

    if !matches!(document.nodes.first(), Some(Some(_))) {
        return Err(error::InvalidPayload::new(
            DOCUMENT_ELEMENT.into(),
            "the document has no root node".into(),
        )
        .into());
    }

    Ok(document)
}

fn read_event<R: BufRead>(
    reader: &mut Reader<R>,
    buffer: &mut Vec<u8>,
) -> Result<Event<'static>, ParseError> {
    buffer.clear();
    let event = reader
        .read_event_into(buffer)
        .map_err(error::MalformedXml::from)?;
    Ok(event.into_owned())
}

/// skip the declaration and comments up to the opening document element
fn read_document_header<R: BufRead>(
    reader: &mut Reader<R>,
    buffer: &mut Vec<u8>,
) -> Result<BytesStart<'static>, ParseError> {
    loop {
        match read_event(reader, buffer)? {
            Event::Decl(_) | Event::Comment(_) | Event::DocType(_) => continue,
            Event::Start(start) if is_named(&start, DOCUMENT_ELEMENT) => return Ok(start),
            Event::Start(start) => {
                let actual = EventSummary::start(&start);
                return Err(error::UnexpectedElement::new(DOCUMENT_ELEMENT, actual).into());
            }
            other => {
                let actual = EventSummary::new(&other);
                return Err(error::UnexpectedElement::new(DOCUMENT_ELEMENT, actual).into());
            }
        }
    }
}

fn read_node<R: BufRead>(
    reader: &mut Reader<R>,
    buffer: &mut Vec<u8>,
    element: &BytesStart<'_>,
    parent: Option<NodeId>,
    has_body: bool,
    document: &mut Document,
) -> Result<NodeId, ParseError> {
    let id = NodeId(parse_attribute::<u64>(element, "id", "Node")?);
    let name = attribute_string(element, "name", "Node")?;
    let label = attribute_string(element, "label", "Node")?;

    let mut record = NodeRecord::new(&name, &label, parent);

    if let Some(code) = optional_attribute(element, "type")? {
        let data_type = DataType::from_code(&code)
            .map_err(|e| error::InvalidPayload::new(name.clone(), e.to_string()))?;
        let dims_text = attribute_string(element, "dims", "Node")?;
        record.data_type = Some(data_type);
        record.dims = parse_list(&dims_text, "Node")?;
    }

    if has_body {
        loop {
            match read_event(reader, buffer)? {
                Event::Start(start) if is_named(&start, "Data") => {
                    let format = attribute_string(&start, "format", "Data")?;
                    let text = read_text_until_end(reader, buffer, "Data")?;
                    record.data = Some(decode_payload(&record, &format, &text)?);
                }
                Event::Empty(empty) if is_named(&empty, "Data") => {
                    let format = attribute_string(&empty, "format", "Data")?;
                    record.data = Some(decode_payload(&record, &format, "")?);
                }
                Event::Start(start) if is_named(&start, "Node") => {
                    let child = read_node(reader, buffer, &start, Some(id), true, document)?;
                    record.children.push(child);
                }
                Event::Empty(empty) if is_named(&empty, "Node") => {
                    let child = read_node(reader, buffer, &empty, Some(id), false, document)?;
                    record.children.push(child);
                }
                Event::Empty(empty) if is_named(&empty, "Link") => {
                    let child = read_link(&empty, id, document)?;
                    record.children.push(child);
                }
                Event::End(end) if end.name().as_ref() == b"Node" => break,
                other => {
                    let actual = EventSummary::new(&other);
                    return Err(error::UnexpectedElement::new("Node, Link or Data", actual).into());
                }
            }
        }
    }

    // an array written without payload is all zeros
    if let (Some(data_type), None) = (record.data_type, &record.data) {
        let len = record.dims.iter().product();
        record.data = Some(DataBuffer::zeros(data_type, len));
    }

    document.place(id, record);
    Ok(id)
}

fn read_link(
    element: &BytesStart<'_>,
    parent: NodeId,
    document: &mut Document,
) -> Result<NodeId, ParseError> {
    let id = NodeId(parse_attribute::<u64>(element, "id", "Link")?);
    let name = attribute_string(element, "name", "Link")?;

    let mut record = NodeRecord::new(&name, "", Some(parent));
    record.link = Some(Link {
        file: attribute_string(element, "file", "Link")?,
        path: attribute_string(element, "path", "Link")?,
    });

    document.place(id, record);
    Ok(id)
}

/// read the text body of an element and its closing tag
fn read_text_until_end<R: BufRead>(
    reader: &mut Reader<R>,
    buffer: &mut Vec<u8>,
    element_name: &str,
) -> Result<String, ParseError> {
    let text = match read_event(reader, buffer)? {
        Event::Text(text) => text
            .unescape()
            .map_err(error::MalformedXml::from)?
            .into_owned(),
        Event::End(end) if end.name().as_ref() == element_name.as_bytes() => {
            return Ok(String::new())
        }
        other => {
            let actual = EventSummary::new(&other);
            return Err(error::UnexpectedElement::new("body element", actual).into());
        }
    };

    match read_event(reader, buffer)? {
        Event::End(end) if end.name().as_ref() == element_name.as_bytes() => Ok(text),
        Event::End(end) => {
            let actual = EventSummary::end(&end);
            Err(error::UnexpectedElement::new(format!("/{element_name}"), actual).into())
        }
        other => {
            let actual = EventSummary::new(&other);
            Err(error::UnexpectedElement::new(format!("/{element_name}"), actual).into())
        }
    }
}

fn decode_payload(record: &NodeRecord, format: &str, text: &str) -> Result<DataBuffer, ParseError> {
    let invalid = |reason: String| error::InvalidPayload::new(record.name.clone(), reason);

    let data_type = record
        .data_type
        .ok_or_else(|| invalid("payload on a node without a data type".into()))?;

    let encoding = match format {
        "ascii" => Encoding::Ascii,
        "base64" => Encoding::Base64,
        other => {
            return Err(error::UnexpectedAttributeValue::new(
                "Data".into(),
                "format".into(),
                "ascii or base64".into(),
                other.into(),
            )
            .into())
        }
    };

    let data = match encoding {
        Encoding::Base64 => {
            let bytes = base64::decode(text.trim()).map_err(|e| invalid(e.to_string()))?;
            utils::buffer_from_le_bytes(data_type, &bytes).ok_or_else(|| {
                invalid(format!("{} bytes do not hold whole {data_type} values", bytes.len()))
            })?
        }
        Encoding::Ascii => parse_ascii(data_type, text).map_err(invalid)?,
    };

    let expected: usize = record.dims.iter().product();
    if data.len() != expected {
        return Err(invalid(format!("expected {expected} values, found {}", data.len())).into());
    }

    Ok(data)
}

fn parse_ascii(data_type: DataType, text: &str) -> Result<DataBuffer, String> {
    fn numbers<T: FromStr>(text: &str) -> Result<Vec<T>, String> {
        text.split_ascii_whitespace()
            .map(|x| x.parse().map_err(|_| format!("`{x}` is not a number")))
            .collect()
    }

    fn pairs<T: FromStr + Copy>(text: &str) -> Result<Vec<Complex<T>>, String> {
        let parts: Vec<T> = numbers(text)?;
        if parts.len() % 2 != 0 {
            return Err("complex values need two parts".into());
        }
        Ok(parts.chunks_exact(2).map(|c| Complex::new(c[0], c[1])).collect())
    }

    let data = match data_type {
        DataType::Integer => DataBuffer::Integer(numbers(text)?),
        DataType::LongInteger => DataBuffer::LongInteger(numbers(text)?),
        DataType::RealSingle => DataBuffer::RealSingle(numbers(text)?),
        DataType::RealDouble => DataBuffer::RealDouble(numbers(text)?),
        DataType::ComplexSingle => DataBuffer::ComplexSingle(pairs(text)?),
        DataType::ComplexDouble => DataBuffer::ComplexDouble(pairs(text)?),
        DataType::Character => DataBuffer::Character(text.as_bytes().to_vec()),
    };

    Ok(data)
}

fn is_named(element: &BytesStart<'_>, name: &str) -> bool {
    element.name().as_ref() == name.as_bytes()
}

fn get_attribute_value<'a>(
    bytes_start: &'a BytesStart<'_>,
    attribute_key: &str,
    element_name: &str,
) -> Result<Option<Attribute<'a>>, ParseError> {
    for attribute in bytes_start.attributes() {
        let attribute = attribute.map_err(error::MalformedAttribute::from)?;
        if attribute.key.as_ref() == attribute_key.as_bytes() {
            return Ok(Some(attribute));
        }
    }

    log::trace!("no `{attribute_key}` attribute on {element_name}");
    Ok(None)
}

fn optional_attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, ParseError> {
    match get_attribute_value(element, key, "node")? {
        Some(attribute) => {
            let value = attribute
                .unescape_value()
                .map_err(error::MalformedXml::from)?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn attribute_string(
    element: &BytesStart<'_>,
    key: &str,
    element_name: &str,
) -> Result<String, ParseError> {
    optional_attribute(element, key)?
        .ok_or_else(|| error::MissingAttribute::new(element_name.into(), key.into()).into())
}

fn parse_attribute<T: FromStr>(
    element: &BytesStart<'_>,
    key: &str,
    element_name: &str,
) -> Result<T, ParseError> {
    let text = attribute_string(element, key, element_name)?;
    text.parse().map_err(|_| {
        error::UnexpectedAttributeValue::new(
            element_name.into(),
            key.into(),
            "a number".into(),
            text.as_str().into(),
        )
        .into()
    })
}

fn parse_list<T: FromStr>(text: &str, element_name: &str) -> Result<Vec<T>, ParseError> {
    text.split_ascii_whitespace()
        .map(|x| {
            x.parse().map_err(|_| {
                ParseError::from(error::UnexpectedAttributeValue::new(
                    element_name.into(),
                    "list".into(),
                    "whitespace separated numbers".into(),
                    x.into(),
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::traits::NodeStore;

    fn sample_store(file_type: FileType) -> MemoryStore {
        let mut store = MemoryStore::diskless(file_type);
        let root = store.root_id();
        let base = store
            .create_node(root, "Base & <co>", "CGNSBase_t")
            .unwrap();
        store.set_dimensions(base, DataType::Integer, &[2]).unwrap();
        store
            .write_all_data(base, &DataBuffer::Integer(vec![3, 3]))
            .unwrap();

        let x = store.create_node(base, "x", "DataArray_t").unwrap();
        store
            .set_dimensions(x, DataType::RealDouble, &[2, 2])
            .unwrap();
        store
            .write_all_data(x, &DataBuffer::RealDouble(vec![0.1, 1e-300, -5.0, f64::MAX]))
            .unwrap();

        let text = store.create_node(base, "text", "Descriptor_t").unwrap();
        store
            .set_dimensions(text, DataType::Character, &[5])
            .unwrap();
        store
            .write_all_data(text, &DataBuffer::from_text("a  b\0"))
            .unwrap();

        let empty = store.create_node(base, "empty", "IndexArray_t").unwrap();
        store
            .set_dimensions(empty, DataType::LongInteger, &[3, 0])
            .unwrap();

        store
            .create_link(base, "alias", "", "/Base & <co>/x")
            .unwrap();
        let gone = store
            .create_node(root, "gone", "UserDefinedData_t")
            .unwrap();
        store.delete_node(root, gone).unwrap();
        store
    }

    fn round_trip(file_type: FileType) {
        let store = sample_store(file_type);
        let mut bytes = Vec::new();
        store.write_document(&mut bytes).unwrap();

        let document = read_document(bytes.as_slice()).unwrap();
        assert_eq!(document.file_type, file_type);
        assert_eq!(document.free.len(), 1);

        let base = document.nodes[1].as_ref().unwrap();
        assert_eq!(base.name, "Base & <co>");
        assert_eq!(base.data, Some(DataBuffer::Integer(vec![3, 3])));
        assert_eq!(base.children.len(), 4);

        let x = document.nodes[2].as_ref().unwrap();
        assert_eq!(
            x.data,
            Some(DataBuffer::RealDouble(vec![0.1, 1e-300, -5.0, f64::MAX]))
        );

        let text = document.nodes[3].as_ref().unwrap();
        assert_eq!(text.data, Some(DataBuffer::from_text("a  b\0")));

        let empty = document.nodes[4].as_ref().unwrap();
        assert_eq!(empty.dims, vec![3, 0]);
        assert_eq!(empty.data, Some(DataBuffer::LongInteger(vec![])));

        let link = document.nodes[5].as_ref().unwrap();
        assert_eq!(link.link.as_ref().unwrap().path, "/Base & <co>/x");
    }

    #[test]
    fn ascii_document_round_trip() {
        round_trip(FileType::Ascii);
    }

    #[test]
    fn base64_document_round_trip() {
        round_trip(FileType::Base64);
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        let doc = r#"<?xml version="1.0"?>
<CGNSNodeFile version="1.0" encoding="ascii">
  <Node id="0" name="root" label="Root Node of CGNS File">
    <Node id="1" name="x" label="DataArray_t" type="I4" dims="3">
      <Data format="ascii">1 2</Data>
    </Node>
  </Node>
</CGNSNodeFile>"#;
        let err = read_document(doc.as_bytes()).err().unwrap();
        assert!(matches!(err, ParseError::InvalidPayload(_)));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let doc = r#"<CGNSNodeFile version="1.0" encoding="raw"></CGNSNodeFile>"#;
        let err = read_document(doc.as_bytes()).err().unwrap();
        assert!(matches!(err, ParseError::UnexpectedAttributeValue(_)));
    }

    #[test]
    fn missing_root_is_rejected() {
        let doc = r#"<CGNSNodeFile version="1.0" encoding="ascii"></CGNSNodeFile>"#;
        assert!(read_document(doc.as_bytes()).is_err());
    }
}
