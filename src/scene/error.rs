/// Structural errors raised while assembling a scene
use thiserror::Error;

use super::{ClusterId, NodeId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    /// An edge endpoint was never declared through this builder
    #[error("edge references undeclared node #{}", .0.index())]
    UnknownNode(NodeId),

    /// A scene description names a node id that is not declared (yet)
    #[error("edge references undeclared node '{0}'")]
    UnresolvedNode(String),

    #[error("node id '{0}' is declared more than once")]
    DuplicateNode(String),

    /// A cluster scope was closed while an inner scope was still open
    #[error("cluster '{closing}' closed while '{innermost}' is still open")]
    ClusterOrder { closing: String, innermost: String },

    #[error("cluster '{0}' was never closed")]
    UnclosedCluster(String),

    #[error("fan-out edge from node #{} has no targets", .0.index())]
    EmptyFanOut(NodeId),

    #[error("cluster handle #{} does not belong to this scene", .0.index())]
    UnknownCluster(ClusterId),
}
