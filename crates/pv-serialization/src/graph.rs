//! ---
//! pv_section: "03-graph-serialization"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Node graph file format model and validation."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::{GraphError, Result};

/// Identifier of a node within a graph.
pub type NodeId = i32;
/// Identifier of an attribute (pin) within a graph.
pub type AttributeId = i32;
/// Identifier of a link within a graph.
pub type LinkId = i32;

/// Last `.`-separated segment of a class discriminator.
///
/// `"io.github.deltacv.easyvision.node.vision.InputMatNode"` becomes `"InputMatNode"`.
pub fn short_class_name(class: &str) -> &str {
    class.rsplit('.').next().unwrap_or(class)
}

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodePosition {
    /// Horizontal canvas coordinate.
    pub x: f32,
    /// Vertical canvas coordinate.
    pub y: f32,
}

/// Common data stored for every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Node id.
    pub id: NodeId,
    /// Position on the canvas.
    #[serde(default)]
    pub node_pos: NodePosition,
}

/// Common data stored for every attribute.
///
/// Value-carrying attributes persist their value next to the id (e.g.
/// `{"id": 4, "value": [255, 0, 0]}`); those keys are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeData {
    /// Attribute id.
    pub id: AttributeId,
    /// Remaining keys of the record, in file order.
    #[serde(flatten)]
    pub extra: IndexMap<String, JsonValue>,
}

impl AttributeData {
    /// Data of an attribute that persists nothing but its id.
    pub fn new(id: AttributeId) -> Self {
        Self {
            id,
            extra: IndexMap::new(),
        }
    }
}

/// Serialized attribute of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttributeEntry {
    /// Discriminator of `data`.
    pub data_class: String,
    /// Attribute data.
    pub data: AttributeData,
    /// Discriminator of the attribute type.
    pub object_class: String,
}

/// Field of a node's `object` map.
///
/// A field is read as an attribute only when it has exactly the attribute
/// record keys and its `data` is not node data (no `nodePos`). Anything else,
/// nested node records included, is kept verbatim as a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObjectField {
    /// Nested attribute record.
    Attribute(AttributeEntry),
    /// Any other persisted value.
    Value(JsonValue),
}

impl<'de> Deserialize<'de> for ObjectField {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = JsonValue::deserialize(deserializer)?;
        let node_data = value
            .get("data")
            .is_some_and(|data| data.get("nodePos").is_some());
        if !node_data {
            if let Ok(entry) = AttributeEntry::deserialize(&value) {
                return Ok(ObjectField::Attribute(entry));
            }
        }
        Ok(ObjectField::Value(value))
    }
}

impl ObjectField {
    /// Attribute record, if this field holds one.
    pub fn as_attribute(&self) -> Option<&AttributeEntry> {
        match self {
            ObjectField::Attribute(entry) => Some(entry),
            ObjectField::Value(_) => None,
        }
    }
}

/// Serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntry {
    /// Discriminator of `data`.
    pub data_class: String,
    /// Node data.
    pub data: NodeData,
    /// Discriminator of the node type.
    pub object_class: String,
    /// Named fields of the node, in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<IndexMap<String, ObjectField>>,
}

impl NodeEntry {
    /// Node id.
    pub fn id(&self) -> NodeId {
        self.data.id
    }

    /// Short node type name.
    pub fn type_name(&self) -> &str {
        short_class_name(&self.object_class)
    }

    /// Attribute fields of this node, in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeEntry)> {
        self.object
            .iter()
            .flat_map(|object| object.iter())
            .filter_map(|(name, field)| field.as_attribute().map(|entry| (name.as_str(), entry)))
    }
}

/// Endpoints of a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkData {
    /// Link id.
    pub id: LinkId,
    /// Attribute at one end.
    pub a: AttributeId,
    /// Attribute at the other end.
    pub b: AttributeId,
}

/// Serialized link between two attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEntry {
    /// Discriminator of `data`.
    pub data_class: String,
    /// Link data.
    pub data: LinkData,
    /// Discriminator of the link type.
    pub object_class: String,
}

/// Whole persisted graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphData {
    /// Node records.
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    /// Link records.
    #[serde(default)]
    pub links: Vec<LinkEntry>,
}

impl GraphData {
    /// Parse a graph from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let graph: GraphData = serde_json::from_str(json)?;
        debug!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            "graph parsed"
        );
        Ok(graph)
    }

    /// Parse a graph from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Read a graph file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading graph file");
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Pretty-printed JSON representation.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    /// Every attribute in the graph with its owning node and field name.
    pub fn attributes(&self) -> impl Iterator<Item = (NodeId, &str, &AttributeEntry)> {
        self.nodes.iter().flat_map(|node| {
            node.attributes()
                .map(move |(name, entry)| (node.id(), name, entry))
        })
    }

    /// Check id uniqueness and that every link joins two distinct known attributes.
    pub fn validate(&self) -> Result<()> {
        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id()) {
                return Err(GraphError::DuplicateNode(node.id()));
            }
        }

        let mut attribute_ids = HashSet::new();
        for (_, _, attribute) in self.attributes() {
            if !attribute_ids.insert(attribute.data.id) {
                return Err(GraphError::DuplicateAttribute(attribute.data.id));
            }
        }

        let mut link_ids = HashSet::new();
        for link in &self.links {
            let data = &link.data;
            if !link_ids.insert(data.id) {
                return Err(GraphError::DuplicateLink(data.id));
            }
            if data.a == data.b {
                return Err(GraphError::SelfLink(data.id));
            }
            for attribute in [data.a, data.b] {
                if !attribute_ids.contains(&attribute) {
                    return Err(GraphError::DanglingLink {
                        link: data.id,
                        attribute,
                    });
                }
            }
        }
        Ok(())
    }
}
