use crate::array::{ConversionError, DataType, SlabError};
use crate::prelude::*;
use crate::traits::NodeId;

use super::event_summary::EventSummary;

use quick_xml::name::QName;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("node {0} does not exist")]
    NoNode(NodeId),
    #[error("node {parent} has no child named `{name}`")]
    NoChild { parent: NodeId, name: String },
    #[error("node {parent} already has a child named `{name}`")]
    DuplicateName { parent: NodeId, name: String },
    #[error("invalid node name `{0}`")]
    InvalidName(String),
    #[error("node {0} has no data")]
    NoData(NodeId),
    #[error("{0}")]
    Size(SizeMismatch),
    #[error("the store cannot convert {from} data to {to}")]
    TypeMismatch { from: DataType, to: DataType },
    #[error("arrays must have between 1 and 12 dimensions, got {0}")]
    InvalidRank(usize),
    #[error("the extents of node {0} overflow the addressable size")]
    TooLarge(NodeId),
    #[error("{0}")]
    Conversion(#[from] ConversionError),
    #[error("{0}")]
    Slab(#[from] SlabError),
    #[error("node links to `{path}` in the external file `{file}`")]
    ExternalLink { file: String, path: String },
    #[error("link chain starting at node {0} is too deep")]
    LinkDepth(NodeId),
    #[error("the root node cannot be deleted")]
    DeleteRoot,
    #[error("the store was opened read only")]
    ReadOnly,
    #[error("An io error occured: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("Could not write XML data to file: `{0}`")]
    XmlWrite(#[from] quick_xml::Error),
    #[error("Error while parsing node document: {0}")]
    Parse(#[from] ParseError),
}

impl From<SizeMismatch> for StoreError {
    fn from(x: SizeMismatch) -> Self {
        StoreError::Size(x)
    }
}

#[derive(Display, Debug, Constructor)]
#[display(fmt = "node {node} holds {expected} values, got {actual}")]
pub struct SizeMismatch {
    node: NodeId,
    expected: usize,
    actual: usize,
}

/// failures while reading a node document
#[derive(Debug, thiserror::Error, From)]
pub enum ParseError {
    #[error("{0}")]
    MalformedXml(MalformedXml),
    #[error("{0}")]
    MalformedAttribute(MalformedAttribute),
    #[error("{0}")]
    MissingAttribute(MissingAttribute),
    #[error("{0}")]
    UnexpectedElement(UnexpectedElement),
    #[error("{0}")]
    UnexpectedAttributeValue(UnexpectedAttributeValue),
    #[error("{0}")]
    InvalidPayload(InvalidPayload),
}

#[derive(From, Display, Debug)]
#[display(fmt = "failed to parse an xml element: {xml_err}")]
pub struct MalformedXml {
    xml_err: quick_xml::Error,
}

#[derive(From, Display, Debug)]
#[display(fmt = "failed to parse an xml attribute: {att_err}")]
pub struct MalformedAttribute {
    att_err: quick_xml::events::attributes::AttrError,
}

#[derive(From, Display, Debug)]
#[display(fmt = "unexpected element. Expected `{expected_name}`, got {actual_element}")]
pub struct UnexpectedElement {
    expected_name: String,
    actual_element: EventSummary,
}

impl UnexpectedElement {
    pub(crate) fn new<T: Into<String>>(expected_name: T, actual_element: EventSummary) -> Self {
        Self {
            expected_name: expected_name.into(),
            actual_element,
        }
    }
}

#[derive(From, Display, Debug, Constructor)]
#[display(
    fmt = "unexpected attribute value for {attribute_name} in {element_name} element: expected {expected_value}, got {actual_value}"
)]
pub struct UnexpectedAttributeValue {
    pub(crate) element_name: String,
    pub(crate) attribute_name: String,
    pub(crate) expected_value: String,
    pub(crate) actual_value: ParsedNameOrBytes,
}

#[derive(From, Display, Debug, Constructor)]
#[display(fmt = "missing attribute `{attribute_name}` in {element_name} element")]
pub struct MissingAttribute {
    element_name: String,
    attribute_name: String,
}

#[derive(Display, Debug, Constructor)]
#[display(fmt = "could not decode the payload of node `{node_name}`: {reason}")]
pub struct InvalidPayload {
    node_name: String,
    reason: String,
}

#[derive(From, Display, Debug)]
pub enum ParsedNameOrBytes {
    #[display(fmt = "{_0}")]
    Utf8(String),
    #[display(fmt = "{_0:?} (cannot convert to UTF8 string)")]
    Bytes(Vec<u8>),
}

impl ParsedNameOrBytes {
    fn new(bytes: &[u8]) -> Self {
        let vec = Vec::from(bytes);
        match String::from_utf8(vec) {
            Ok(string) => Self::Utf8(string),
            Err(e) => Self::Bytes(e.into_bytes()),
        }
    }
}

impl<'a> From<QName<'a>> for ParsedNameOrBytes {
    fn from(x: QName) -> Self {
        Self::new(x.as_ref())
    }
}

impl<'a> From<std::borrow::Cow<'a, [u8]>> for ParsedNameOrBytes {
    fn from(x: std::borrow::Cow<'a, [u8]>) -> Self {
        Self::new(x.as_ref())
    }
}

impl<'a> From<&'a str> for ParsedNameOrBytes {
    fn from(x: &str) -> Self {
        Self::Utf8(x.into())
    }
}
