/// Scene graph model for topology diagrams
pub mod builder;
pub mod error;

pub use builder::{ClusterHandle, SceneBuilder};
pub use error::SceneError;

use serde::{Deserialize, Serialize};

/// Identifier of a node declared through a [`SceneBuilder`]
///
/// Carries the identity of the issuing builder, so an id is only valid in
/// the scene it was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId {
    #[serde(skip)]
    pub(crate) scene: u64,
    pub(crate) index: usize,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

/// Identifier of a cluster declared through a [`SceneBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClusterId {
    #[serde(skip)]
    pub(crate) scene: u64,
    pub(crate) index: usize,
}

impl ClusterId {
    pub fn index(self) -> usize {
        self.index
    }
}

/// Icon category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    /// Public network / DNS on the internet
    Internet,
    /// VPN gateway or tunnel endpoint
    Vpn,
    /// Internal network segment
    Subnet,
    /// Host running containers (e.g. Docker)
    ContainerHost,
    /// Physical server
    BareMetal,
    /// Kubernetes API server / control plane
    ApiServer,
    /// Generic compute unit (e.g. a pod or worker VM)
    Compute,
}

/// Line style of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Bold,
}

impl EdgeStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeStyle::Solid => "solid",
            EdgeStyle::Dashed => "dashed",
            EdgeStyle::Dotted => "dotted",
            EdgeStyle::Bold => "bold",
        }
    }
}

/// Arrow direction of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// `a >> b`
    #[default]
    Forward,
    /// `a << b`
    Back,
    /// `a - b`
    Undirected,
}

/// Optional presentation metadata of an edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Minimum rank span, a layout hint only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minlen: Option<u32>,
}

impl EdgeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn style(mut self, style: EdgeStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn minlen(mut self, minlen: u32) -> Self {
        self.minlen = Some(minlen);
        self
    }
}

/// Layout direction of the whole diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB")]
    TopToBottom,
    #[serde(rename = "BT")]
    BottomToTop,
    #[serde(rename = "LR")]
    LeftToRight,
    #[serde(rename = "RL")]
    RightToLeft,
}

impl Direction {
    pub fn rankdir(self) -> &'static str {
        match self {
            Direction::TopToBottom => "TB",
            Direction::BottomToTop => "BT",
            Direction::LeftToRight => "LR",
            Direction::RightToLeft => "RL",
        }
    }
}

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
    Svg,
    Pdf,
    /// Raw DOT source, written without invoking the layout engine
    Dot,
}

impl OutputFormat {
    /// File extension, also the `-T` argument passed to the layout engine
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Dot => "dot",
        }
    }
}

/// Edge routing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Splines {
    /// Axis-aligned segments
    #[default]
    Ortho,
    /// Curved splines around nodes
    Spline,
    /// Straight segments around nodes
    Polyline,
    Curved,
    /// Straight lines, may cross nodes
    Line,
    /// No edges drawn
    None,
}

impl Splines {
    pub fn as_str(self) -> &'static str {
        match self {
            Splines::Ortho => "ortho",
            Splines::Spline => "spline",
            Splines::Polyline => "polyline",
            Splines::Curved => "curved",
            Splines::Line => "line",
            Splines::None => "none",
        }
    }
}

/// Global layout options understood by the layout engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphAttributes {
    /// Edge routing mode
    pub splines: Splines,

    /// Allow edges between clusters
    pub compound: bool,

    /// Margin around the drawing, in inches
    pub pad: f64,

    /// Title font size, in points
    pub fontsize: u32,

    /// Minimum space between nodes of the same rank, in inches
    pub nodesep: f64,

    /// Minimum space between ranks, in inches
    pub ranksep: f64,
}

impl Default for GraphAttributes {
    fn default() -> Self {
        Self {
            splines: Splines::Ortho,
            compound: false,
            pad: 2.0,
            fontsize: 15,
            nodesep: 0.6,
            ranksep: 0.75,
        }
    }
}

/// Root attributes of a diagram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramAttributes {
    pub title: String,
    pub filename: String,
    pub outformat: OutputFormat,
    pub direction: Direction,
    pub graph_attr: GraphAttributes,
}

impl DiagramAttributes {
    /// Create attributes with the filename derived from the title
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let filename = filename_from_title(&title);
        Self {
            title,
            filename,
            outformat: OutputFormat::default(),
            direction: Direction::default(),
            graph_attr: GraphAttributes::default(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_format(mut self, outformat: OutputFormat) -> Self {
        self.outformat = outformat;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_graph_attr(mut self, graph_attr: GraphAttributes) -> Self {
        self.graph_attr = graph_attr;
        self
    }

    /// Output file name including extension
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.filename, self.outformat.extension())
    }
}

/// Derive an output file name from a diagram title
///
/// Whitespace runs become a single `_` and the result is lowercased.
pub fn filename_from_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// A labeled infrastructure entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub icon: Icon,
    /// Innermost enclosing cluster, `None` for the diagram root
    pub cluster: Option<ClusterId>,
}

/// Child of the diagram root or of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Member {
    Node(NodeId),
    Cluster(ClusterId),
}

/// A titled visual grouping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub title: String,
    pub parent: Option<ClusterId>,
    /// Nodes and sub-clusters in declaration order
    pub members: Vec<Member>,
}

/// A single rendered connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub direction: EdgeDirection,
    pub attributes: EdgeAttributes,
}

/// Finished, validated scene graph ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub diagram: DiagramAttributes,
    pub nodes: Vec<Node>,
    pub clusters: Vec<Cluster>,
    pub edges: Vec<Edge>,
    /// Direct children of the diagram root in declaration order
    pub root: Vec<Member>,
}

impl Scene {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index)
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index)
    }

    /// Members of a scope, the diagram root when `scope` is `None`
    pub fn members(&self, scope: Option<ClusterId>) -> &[Member] {
        match scope.and_then(|id| self.cluster(id)) {
            Some(cluster) => &cluster.members,
            None => &self.root,
        }
    }

    /// Nesting depth of a cluster, 0 for clusters directly under the root
    pub fn depth(&self, id: ClusterId) -> usize {
        let mut depth = 0;
        let mut current = self.cluster(id).and_then(|c| c.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.cluster(parent).and_then(|c| c.parent);
        }
        depth
    }
}
