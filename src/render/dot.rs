/// Graphviz DOT serialization of a finished scene
use crate::scene::{ClusterId, EdgeDirection, Icon, Member, NodeId, Scene};

const FONT_NAME: &str = "Sans-Serif";
const FONT_COLOR: &str = "#2D3436";
const EDGE_COLOR: &str = "#7B8894";
const CLUSTER_PEN_COLOR: &str = "#AEB6BE";

/// Cluster background colors, cycling with nesting depth
const CLUSTER_BG_COLORS: [&str; 4] = ["#E5F5FD", "#EBF3E7", "#ECE8F6", "#FDF7E3"];

/// Shape, style and fill color used for an icon category
fn icon_style(icon: Icon) -> (&'static str, &'static str, &'static str) {
    match icon {
        Icon::Internet => ("ellipse", "filled", "#D6EAF8"),
        Icon::Vpn => ("hexagon", "filled", "#FADBD8"),
        Icon::Subnet => ("tab", "filled", "#E8DAEF"),
        Icon::ContainerHost => ("box3d", "filled", "#D4E6F1"),
        Icon::BareMetal => ("box", "filled", "#E5E8E8"),
        Icon::ApiServer => ("component", "filled", "#D5F5E3"),
        Icon::Compute => ("box", "rounded,filled", "#FCF3CF"),
    }
}

fn edge_dir(direction: EdgeDirection) -> &'static str {
    match direction {
        EdgeDirection::Forward => "forward",
        EdgeDirection::Back => "back",
        EdgeDirection::Undirected => "none",
    }
}

/// Escape a string for a quoted DOT value
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn attr_list(attrs: &[(&str, String)]) -> String {
    let body = attrs
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, escape(value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", body)
}

fn node_name(id: NodeId) -> String {
    format!("n{}", id.index())
}

/// Render the scene as a Graphviz DOT document
///
/// Output depends only on the scene, so the same scene always produces
/// the same bytes.
pub fn to_dot(scene: &Scene) -> String {
    let diagram = &scene.diagram;
    let graph_attr = &diagram.graph_attr;
    let mut out = String::new();

    out.push_str(&format!("digraph \"{}\" {{\n", escape(&diagram.title)));
    out.push_str(&format!(
        "  graph {};\n",
        attr_list(&[
            ("label", diagram.title.clone()),
            ("labelloc", "t".to_string()),
            ("fontname", FONT_NAME.to_string()),
            ("fontsize", graph_attr.fontsize.to_string()),
            ("fontcolor", FONT_COLOR.to_string()),
            ("rankdir", diagram.direction.rankdir().to_string()),
            ("splines", graph_attr.splines.as_str().to_string()),
            ("compound", graph_attr.compound.to_string()),
            ("pad", graph_attr.pad.to_string()),
            ("nodesep", graph_attr.nodesep.to_string()),
            ("ranksep", graph_attr.ranksep.to_string()),
        ])
    ));
    out.push_str(&format!(
        "  node {};\n",
        attr_list(&[
            ("fontname", FONT_NAME.to_string()),
            ("fontsize", "13".to_string()),
            ("fontcolor", FONT_COLOR.to_string()),
            ("margin", "0.2,0.1".to_string()),
        ])
    ));
    out.push_str(&format!(
        "  edge {};\n",
        attr_list(&[
            ("fontname", FONT_NAME.to_string()),
            ("fontsize", "13".to_string()),
            ("fontcolor", FONT_COLOR.to_string()),
            ("color", EDGE_COLOR.to_string()),
        ])
    ));
    out.push('\n');

    write_members(scene, scene.members(None), 1, &mut out);

    if !scene.edges.is_empty() {
        out.push('\n');
    }
    for edge in &scene.edges {
        let mut attrs = vec![("dir", edge_dir(edge.direction).to_string())];
        let meta = &edge.attributes;
        if let Some(label) = &meta.label {
            attrs.push(("label", label.clone()));
        }
        if let Some(color) = &meta.color {
            attrs.push(("color", color.clone()));
        }
        if let Some(style) = meta.style {
            attrs.push(("style", style.as_str().to_string()));
        }
        if let Some(minlen) = meta.minlen {
            attrs.push(("minlen", minlen.to_string()));
        }

        out.push_str(&format!(
            "  {} -> {} {};\n",
            node_name(edge.from),
            node_name(edge.to),
            attr_list(&attrs)
        ));
    }

    out.push_str("}\n");
    out
}

fn write_members(scene: &Scene, members: &[Member], indent: usize, out: &mut String) {
    for member in members {
        match *member {
            Member::Node(id) => write_node(scene, id, indent, out),
            Member::Cluster(id) => write_cluster(scene, id, indent, out),
        }
    }
}

fn write_node(scene: &Scene, id: NodeId, indent: usize, out: &mut String) {
    let Some(node) = scene.node(id) else {
        return;
    };
    let (shape, style, fill) = icon_style(node.icon);
    out.push_str(&format!(
        "{}{} {};\n",
        "  ".repeat(indent),
        node_name(id),
        attr_list(&[
            ("label", node.label.clone()),
            ("shape", shape.to_string()),
            ("style", style.to_string()),
            ("fillcolor", fill.to_string()),
        ])
    ));
}

fn write_cluster(scene: &Scene, id: ClusterId, indent: usize, out: &mut String) {
    let Some(cluster) = scene.cluster(id) else {
        return;
    };
    let pad = "  ".repeat(indent);
    let bgcolor = CLUSTER_BG_COLORS[scene.depth(id) % CLUSTER_BG_COLORS.len()];

    out.push_str(&format!("{}subgraph \"cluster_{}\" {{\n", pad, id.index()));
    out.push_str(&format!(
        "{}  graph {};\n",
        pad,
        attr_list(&[
            ("label", cluster.title.clone()),
            ("labeljust", "l".to_string()),
            ("style", "rounded".to_string()),
            ("pencolor", CLUSTER_PEN_COLOR.to_string()),
            ("fontname", FONT_NAME.to_string()),
            ("fontsize", "12".to_string()),
            ("bgcolor", bgcolor.to_string()),
        ])
    ));
    write_members(scene, scene.members(Some(cluster.id)), indent + 1, out);
    out.push_str(&format!("{}}}\n", pad));
}
