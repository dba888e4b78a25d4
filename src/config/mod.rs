/// Scene description files for topodraw
pub mod builtin;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::scene::{
    filename_from_title, DiagramAttributes, Direction, EdgeAttributes, EdgeDirection, EdgeStyle,
    GraphAttributes, Icon, NodeId, OutputFormat, Scene, SceneBuilder, SceneError,
};

/// Environment variable overriding the layout engine binary
pub const DOT_BINARY_ENV: &str = "TOPODRAW_DOT";

/// Complete description of one diagram
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    /// Diagram title, drawn above the topology
    pub title: String,

    /// Output file name without extension (derived from the title if omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Output format
    #[serde(default)]
    pub outformat: OutputFormat,

    /// Layout direction
    #[serde(default)]
    pub direction: Direction,

    /// Global layout options
    #[serde(default)]
    pub graph_attr: GraphAttributes,

    /// Nodes directly under the diagram root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeConfig>,

    /// Top-level clusters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterConfig>,

    /// Edges declared after every cluster is closed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeConfig>,
}

/// Cluster scope: its nodes, then sub-clusters, then edges are declared in that order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub title: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeConfig>,
}

/// Node declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Identifier used by edges, unique within the file
    pub id: String,

    /// Display label (may contain line breaks)
    pub label: String,

    pub icon: Icon,
}

/// One edge target or a fan-out list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeTargets {
    One(String),
    Many(Vec<String>),
}

impl EdgeTargets {
    fn ids(&self) -> &[String] {
        match self {
            EdgeTargets::One(id) => std::slice::from_ref(id),
            EdgeTargets::Many(ids) => ids,
        }
    }
}

/// Edge declaration
///
/// The presentation fields are listed inline rather than flattened from
/// [`EdgeAttributes`], so that misspelled keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeConfig {
    pub from: String,

    pub to: EdgeTargets,

    #[serde(default)]
    pub direction: EdgeDirection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Minimum rank span between the endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minlen: Option<u32>,
}

impl EdgeConfig {
    fn attributes(&self) -> EdgeAttributes {
        let mut attributes = EdgeAttributes::new();
        if let Some(label) = &self.label {
            attributes = attributes.label(label.clone());
        }
        if let Some(style) = self.style {
            attributes = attributes.style(style);
        }
        if let Some(color) = &self.color {
            attributes = attributes.color(color.clone());
        }
        if let Some(minlen) = self.minlen {
            attributes = attributes.minlen(minlen);
        }
        attributes
    }
}

impl SceneConfig {
    /// Load a scene description from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid scene file {}", path.display()))
    }

    /// Parse a scene description from YAML text
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: SceneConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the description
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.title.trim().is_empty() {
            anyhow::bail!("title cannot be empty");
        }

        // a filename derived from the title must not escape the output directory either
        let filename = self.diagram_attributes().filename;
        if filename.trim().is_empty() || filename.contains(['/', '\\']) {
            anyhow::bail!("Invalid output filename: {:?}", filename);
        }

        Self::validate_nodes(&self.nodes)?;
        Self::validate_clusters(&self.clusters)?;

        Ok(())
    }

    fn validate_nodes(nodes: &[NodeConfig]) -> anyhow::Result<()> {
        for node in nodes {
            if node.id.trim().is_empty() {
                anyhow::bail!("node id cannot be empty (label {:?})", node.label);
            }
        }
        Ok(())
    }

    fn validate_clusters(clusters: &[ClusterConfig]) -> anyhow::Result<()> {
        for cluster in clusters {
            if cluster.title.trim().is_empty() {
                anyhow::bail!("cluster title cannot be empty");
            }
            Self::validate_nodes(&cluster.nodes)?;
            Self::validate_clusters(&cluster.clusters)?;
        }
        Ok(())
    }

    /// Diagram root attributes
    pub fn diagram_attributes(&self) -> DiagramAttributes {
        let filename = self
            .filename
            .clone()
            .unwrap_or_else(|| filename_from_title(&self.title));

        DiagramAttributes::new(self.title.clone())
            .with_filename(filename)
            .with_format(self.outformat)
            .with_direction(self.direction)
            .with_graph_attr(self.graph_attr.clone())
    }

    /// Assemble the scene graph through a [`SceneBuilder`]
    pub fn build(&self) -> Result<Scene, SceneError> {
        let mut builder = SceneBuilder::new(self.diagram_attributes());
        let mut ids = HashMap::new();

        declare_nodes(&mut builder, &mut ids, &self.nodes)?;
        for cluster in &self.clusters {
            declare_cluster(&mut builder, &mut ids, cluster)?;
        }
        declare_edges(&mut builder, &ids, &self.edges)?;

        builder.finish()
    }

    /// Generate an example scene description
    pub fn example() -> Self {
        let node = |id: &str, label: &str, icon| NodeConfig {
            id: id.to_string(),
            label: label.to_string(),
            icon,
        };
        let edge = |from: &str, to: EdgeTargets, label: &str| EdgeConfig {
            from: from.to_string(),
            to,
            direction: EdgeDirection::Forward,
            label: Some(label.to_string()),
            style: None,
            color: None,
            minlen: None,
        };

        Self {
            title: "Example Topology".to_string(),
            filename: Some("example_topology".to_string()),
            outformat: OutputFormat::Png,
            direction: Direction::TopToBottom,
            graph_attr: GraphAttributes {
                compound: true,
                pad: 0.5,
                fontsize: 14,
                ..GraphAttributes::default()
            },
            nodes: vec![],
            clusters: vec![
                ClusterConfig {
                    title: "External Access".to_string(),
                    nodes: vec![
                        node("dns", "example.com\n(external DNS)", Icon::Internet),
                        node("vpn", "VPN Gateway", Icon::Vpn),
                    ],
                    clusters: vec![],
                    edges: vec![],
                },
                ClusterConfig {
                    title: "Kubernetes Cluster".to_string(),
                    nodes: vec![node("control_plane", "Control Plane", Icon::ApiServer)],
                    clusters: vec![ClusterConfig {
                        title: "Workers".to_string(),
                        nodes: vec![
                            node("worker_1", "Worker 1", Icon::Compute),
                            node("worker_2", "Worker 2", Icon::Compute),
                        ],
                        clusters: vec![],
                        edges: vec![],
                    }],
                    edges: vec![],
                },
            ],
            edges: vec![
                edge("dns", EdgeTargets::One("vpn".to_string()), "resolves to"),
                EdgeConfig {
                    style: Some(EdgeStyle::Dashed),
                    ..edge(
                        "vpn",
                        EdgeTargets::One("control_plane".to_string()),
                        "VPN tunnel",
                    )
                },
                EdgeConfig {
                    color: Some("orange".to_string()),
                    ..edge(
                        "control_plane",
                        EdgeTargets::Many(vec!["worker_1".to_string(), "worker_2".to_string()]),
                        "schedules",
                    )
                },
            ],
        }
    }
}

fn declare_nodes(
    builder: &mut SceneBuilder,
    ids: &mut HashMap<String, NodeId>,
    nodes: &[NodeConfig],
) -> Result<(), SceneError> {
    for node in nodes {
        if ids.contains_key(&node.id) {
            return Err(SceneError::DuplicateNode(node.id.clone()));
        }
        let id = builder.add_node(node.label.clone(), node.icon);
        ids.insert(node.id.clone(), id);
    }
    Ok(())
}

fn declare_cluster(
    builder: &mut SceneBuilder,
    ids: &mut HashMap<String, NodeId>,
    cluster: &ClusterConfig,
) -> Result<(), SceneError> {
    let handle = builder.begin_cluster(cluster.title.clone());

    declare_nodes(builder, ids, &cluster.nodes)?;
    for child in &cluster.clusters {
        declare_cluster(builder, ids, child)?;
    }
    declare_edges(builder, ids, &cluster.edges)?;

    builder.end_cluster(handle)?;
    Ok(())
}

fn resolve(ids: &HashMap<String, NodeId>, id: &str) -> Result<NodeId, SceneError> {
    ids.get(id)
        .copied()
        .ok_or_else(|| SceneError::UnresolvedNode(id.to_string()))
}

fn declare_edges(
    builder: &mut SceneBuilder,
    ids: &HashMap<String, NodeId>,
    edges: &[EdgeConfig],
) -> Result<(), SceneError> {
    for edge in edges {
        let from = resolve(ids, &edge.from)?;
        let attributes = edge.attributes();
        let targets = edge
            .to
            .ids()
            .iter()
            .map(|id| resolve(ids, id))
            .collect::<Result<Vec<_>, _>>()?;

        match edge.to {
            EdgeTargets::One(_) => {
                builder.connect(from, targets[0], edge.direction, attributes)?
            }
            EdgeTargets::Many(_) => {
                builder.fan_out(from, &targets, edge.direction, attributes)?
            }
        }
    }
    Ok(())
}

/// Where a scene description comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneSource {
    Builtin(&'static str),
    File(PathBuf),
}

impl SceneSource {
    /// Built-in topology names win over file paths
    pub fn parse(arg: &str) -> Self {
        match builtin::lookup(arg) {
            Some((name, _)) => SceneSource::Builtin(name),
            None => SceneSource::File(PathBuf::from(arg)),
        }
    }

    pub fn load(&self) -> anyhow::Result<SceneConfig> {
        match self {
            SceneSource::Builtin(name) => {
                debug!("Loading built-in topology {}", name);
                builtin::load(name)
            }
            SceneSource::File(path) => {
                debug!("Loading scene file {}", path.display());
                SceneConfig::from_file(path)
            }
        }
    }
}

impl std::fmt::Display for SceneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneSource::Builtin(name) => write!(f, "{}", name),
            SceneSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Layout engine binary from the CLI, then the environment, then `dot`
pub fn dot_binary(cli_value: Option<&Path>) -> PathBuf {
    cli_value
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(DOT_BINARY_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("dot"))
}
