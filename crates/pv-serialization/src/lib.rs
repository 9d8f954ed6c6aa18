//! ---
//! pv_section: "03-graph-serialization"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Node graph file format model and validation."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
//! Node graph file format used by the editor to persist pipelines.
//!
//! A graph is a list of node records plus a list of links. Every record carries
//! two class discriminators (`dataClass` for the shape of `data`, `objectClass`
//! for the editor type it restores into) so readers can rebuild the right node
//! or attribute without a schema registry.
#![warn(missing_docs)]

pub mod graph;

use graph::{AttributeId, LinkId, NodeId};

/// Shared result type for graph (de)serialization.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while reading or validating a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Two nodes share an id.
    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),
    /// Two attributes share an id.
    #[error("duplicate attribute id {0}")]
    DuplicateAttribute(AttributeId),
    /// Two links share an id.
    #[error("duplicate link id {0}")]
    DuplicateLink(LinkId),
    /// A link references an attribute that no node declares.
    #[error("link {link} references unknown attribute {attribute}")]
    DanglingLink {
        /// Offending link.
        link: LinkId,
        /// Missing attribute id.
        attribute: AttributeId,
    },
    /// A link connects an attribute to itself.
    #[error("link {0} connects an attribute to itself")]
    SelfLink(LinkId),
    /// Wrapper for IO errors encountered while reading graph files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON syntax or shape problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use graph::{
    short_class_name, AttributeData, AttributeEntry, GraphData, LinkData, LinkEntry, NodeData,
    NodeEntry, NodePosition, ObjectField,
};
