//! Loading of stored pose annotations
//!
//! An annotation file holds a mapping of sub-objects, each of which maps
//! `bbox` to four corner coordinates and every keypoint name to an `(x, y)`
//! pair. Files are Python pickles, or JSON when they carry a `.json`
//! extension. Both are lowered into [`Node`] so extraction is format-agnostic.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_pickle::DeOptions;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{BboxError, ConversionError, Result};

/// A decoded annotation value. Mappings keep their stored entry order.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Seq(Vec<Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Int(i) => Some(*i as f64),
            Node::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Mapping keys are strings here; pickled dicts are often keyed by ints.
    fn into_key(self) -> String {
        match self {
            Node::Text(s) => s,
            Node::Int(i) => i.to_string(),
            Node::Float(f) => f.to_string(),
            Node::Bool(b) => b.to_string(),
            other => format!("{:?}", other),
        }
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an annotation value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Node, E> {
        Ok(Node::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Node, E> {
        Ok(Node::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Node, E> {
        Ok(i64::try_from(v).map_or(Node::Float(v as f64), Node::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Node, E> {
        Ok(Node::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Node, E> {
        Ok(Node::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Node, E> {
        Ok(Node::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Node, E> {
        Ok(Node::Text(String::from_utf8_lossy(v).into_owned()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Node, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Node>()? {
            items.push(item);
        }
        Ok(Node::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Node, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<Node, Node>()? {
            entries.push((key.into_key(), value));
        }
        Ok(Node::Map(entries))
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

/// One object inside an annotation file.
#[derive(Debug, Clone)]
pub struct SubAnnotation {
    pub key: String,
    pub data: Node,
}

impl SubAnnotation {
    /// Corner-form bbox `[x0, y0, x1, y1]`. Extra trailing values are ignored.
    pub fn bbox(&self) -> std::result::Result<[f64; 4], BboxError> {
        let raw = match &self.data {
            Node::Map(_) => self.data.get("bbox").ok_or(BboxError::Missing)?,
            _ => return Err(BboxError::NotAMapping),
        };
        let values = match raw {
            Node::Seq(values) => values,
            _ => return Err(BboxError::NotASequence),
        };
        if values.len() < 4 {
            return Err(BboxError::TooShort(values.len()));
        }
        let mut bbox = [0.0; 4];
        for (i, slot) in bbox.iter_mut().enumerate() {
            *slot = values[i].as_f64().ok_or(BboxError::NotANumber(i))?;
        }
        Ok(bbox)
    }

    /// Pixel `(x, y)` of a named keypoint. Malformed entries are errors.
    pub fn keypoint(&self, name: &str) -> std::result::Result<(f64, f64), String> {
        let raw = match &self.data {
            Node::Map(_) => self.data.get(name).ok_or_else(|| "is missing".to_string())?,
            _ => return Err("cannot be looked up in a non-mapping object".to_string()),
        };
        match raw {
            Node::Seq(values) if values.len() == 2 => {
                let (x, y) = (values[0].as_f64(), values[1].as_f64());
                // A -1 on either axis hides the point whatever the other axis holds.
                if x == Some(-1.0) || y == Some(-1.0) {
                    return Ok((x.unwrap_or(-1.0), y.unwrap_or(-1.0)));
                }
                match (x, y) {
                    (Some(x), Some(y)) => Ok((x, y)),
                    _ => Err("has non-numeric coordinates".to_string()),
                }
            }
            Node::Seq(values) => Err(format!("has {} values, expected 2", values.len())),
            _ => Err("is not an (x, y) pair".to_string()),
        }
    }
}

/// All sub-objects of one annotation file, in stored order.
#[derive(Debug, Clone)]
pub struct PoseAnnotation {
    pub path: PathBuf,
    pub objects: Vec<SubAnnotation>,
}

impl PoseAnnotation {
    pub fn from_node(path: &Path, node: Node) -> Result<Self> {
        match node {
            Node::Map(entries) => Ok(Self {
                path: path.to_path_buf(),
                objects: entries
                    .into_iter()
                    .map(|(key, data)| SubAnnotation { key, data })
                    .collect(),
            }),
            _ => Err(ConversionError::NotAMapping(path.to_path_buf())),
        }
    }
}

/// Read an annotation file, picking the decoder from its extension.
pub fn load_annotation(path: &Path) -> Result<PoseAnnotation> {
    let file = File::open(path).map_err(|e| ConversionError::io(path, e))?;
    let reader = BufReader::new(file);

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    // Decoding straight into Node visits dict entries in stored order.
    let node: Node = if is_json {
        serde_json::from_reader(reader).map_err(|source| ConversionError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        let options = DeOptions::new().decode_strings().replace_unresolved_globals();
        serde_pickle::from_reader(reader, options).map_err(|source| ConversionError::Pickle {
            path: path.to_path_buf(),
            source,
        })?
    };

    PoseAnnotation::from_node(path, node)
}
