/// Topology diagram builder with explicit, LIFO-ordered cluster scopes
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{
    Cluster, ClusterId, DiagramAttributes, Edge, EdgeAttributes, EdgeDirection, Icon, Member,
    Node, NodeId, Scene, SceneError,
};

/// Open cluster scope returned by [`SceneBuilder::begin_cluster`]
///
/// Not `Clone`: a scope can only be closed once.
#[derive(Debug)]
#[must_use = "a cluster scope must be closed with SceneBuilder::end_cluster"]
pub struct ClusterHandle {
    id: ClusterId,
}

static NEXT_SCENE: AtomicU64 = AtomicU64::new(0);

/// Builds a [`Scene`] one declaration at a time
///
/// Nodes and clusters are attached to the innermost open cluster scope.
/// Edges may be declared at any point once both endpoints exist. Ids and
/// handles issued by another builder are rejected.
pub struct SceneBuilder {
    scene: u64,
    diagram: DiagramAttributes,
    nodes: Vec<Node>,
    clusters: Vec<Cluster>,
    edges: Vec<Edge>,
    root: Vec<Member>,
    open: Vec<ClusterId>,
}

impl SceneBuilder {
    /// Open a new diagram root
    pub fn new(diagram: DiagramAttributes) -> Self {
        Self {
            scene: NEXT_SCENE.fetch_add(1, Ordering::Relaxed),
            diagram,
            nodes: Vec::new(),
            clusters: Vec::new(),
            edges: Vec::new(),
            root: Vec::new(),
            open: Vec::new(),
        }
    }

    fn current_scope(&self) -> Option<ClusterId> {
        self.open.last().copied()
    }

    fn push_member(&mut self, member: Member) {
        match self.current_scope() {
            Some(id) => self.clusters[id.index].members.push(member),
            None => self.root.push(member),
        }
    }

    /// Open a cluster scope inside the innermost open scope
    pub fn begin_cluster(&mut self, title: impl Into<String>) -> ClusterHandle {
        let id = ClusterId {
            scene: self.scene,
            index: self.clusters.len(),
        };
        let parent = self.current_scope();
        self.clusters.push(Cluster {
            id,
            title: title.into(),
            parent,
            members: Vec::new(),
        });
        self.push_member(Member::Cluster(id));
        self.open.push(id);
        ClusterHandle { id }
    }

    /// Close a cluster scope; it must be the innermost one still open
    pub fn end_cluster(&mut self, handle: ClusterHandle) -> Result<ClusterId, SceneError> {
        let id = handle.id;
        let closing = match self.clusters.get(id.index) {
            Some(closing) if id.scene == self.scene => closing,
            _ => return Err(SceneError::UnknownCluster(id)),
        };

        if self.current_scope() != Some(id) {
            let innermost = self
                .current_scope()
                .map(|open| self.clusters[open.index].title.clone())
                .unwrap_or_else(|| "(diagram root)".to_string());
            return Err(SceneError::ClusterOrder {
                closing: closing.title.clone(),
                innermost,
            });
        }

        self.open.pop();
        Ok(id)
    }

    /// Declare a node in the innermost open scope
    pub fn add_node(&mut self, label: impl Into<String>, icon: Icon) -> NodeId {
        let id = NodeId {
            scene: self.scene,
            index: self.nodes.len(),
        };
        let cluster = self.current_scope();
        self.nodes.push(Node {
            id,
            label: label.into(),
            icon,
            cluster,
        });
        self.push_member(Member::Node(id));
        id
    }

    fn check_node(&self, id: NodeId) -> Result<(), SceneError> {
        if id.scene == self.scene && id.index < self.nodes.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownNode(id))
        }
    }

    /// Declare one edge between two declared nodes
    pub fn connect(
        &mut self,
        from: NodeId,
        to: NodeId,
        direction: EdgeDirection,
        attributes: EdgeAttributes,
    ) -> Result<(), SceneError> {
        self.check_node(from)?;
        self.check_node(to)?;
        self.edges.push(Edge {
            from,
            to,
            direction,
            attributes,
        });
        Ok(())
    }

    /// Declare one edge from `from` to each of `targets`, all sharing `attributes`
    ///
    /// Every endpoint is checked before any edge is added.
    pub fn fan_out(
        &mut self,
        from: NodeId,
        targets: &[NodeId],
        direction: EdgeDirection,
        attributes: EdgeAttributes,
    ) -> Result<(), SceneError> {
        self.check_node(from)?;
        if targets.is_empty() {
            return Err(SceneError::EmptyFanOut(from));
        }
        for &to in targets {
            self.check_node(to)?;
        }

        self.edges.extend(targets.iter().map(|&to| Edge {
            from,
            to,
            direction,
            attributes: attributes.clone(),
        }));
        Ok(())
    }

    /// Close the diagram root and return the finished scene
    pub fn finish(self) -> Result<Scene, SceneError> {
        if let Some(&open) = self.open.last() {
            return Err(SceneError::UnclosedCluster(
                self.clusters[open.index].title.clone(),
            ));
        }

        debug!(
            "Scene '{}' assembled: {} nodes, {} clusters, {} edges",
            self.diagram.title,
            self.nodes.len(),
            self.clusters.len(),
            self.edges.len()
        );

        Ok(Scene {
            diagram: self.diagram,
            nodes: self.nodes,
            clusters: self.clusters,
            edges: self.edges,
            root: self.root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::EdgeStyle;

    fn builder() -> SceneBuilder {
        SceneBuilder::new(DiagramAttributes::new("Test Topology"))
    }

    #[test]
    fn test_minimal_topology() {
        let mut b = builder();
        let a = b.add_node("A", Icon::Internet);
        let vpn = b.add_node("B", Icon::Vpn);
        b.connect(
            a,
            vpn,
            EdgeDirection::Forward,
            EdgeAttributes::new().label("resolves to"),
        )
        .unwrap();

        let scene = b.finish().unwrap();
        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.edges.len(), 1);
        assert_eq!(scene.edges[0].attributes.label.as_deref(), Some("resolves to"));
        assert_eq!(scene.root, vec![Member::Node(a), Member::Node(vpn)]);
    }

    #[test]
    fn test_edge_to_undeclared_node_fails() {
        let mut b = builder();
        let a = b.add_node("A", Icon::Internet);

        // same index as `a`, but issued by another builder
        let mut other = builder();
        let foreign = other.add_node("C", Icon::Compute);
        assert_eq!(foreign.index(), a.index());

        let err = b
            .connect(a, foreign, EdgeDirection::Forward, EdgeAttributes::new())
            .unwrap_err();
        assert_eq!(err, SceneError::UnknownNode(foreign));
        assert_eq!(
            b.fan_out(foreign, &[a], EdgeDirection::Forward, EdgeAttributes::new()),
            Err(SceneError::UnknownNode(foreign))
        );
        assert!(b.finish().unwrap().edges.is_empty());
    }

    #[test]
    fn test_foreign_cluster_handle_is_rejected() {
        let mut b = builder();
        let mine = b.begin_cluster("Mine");

        let mut other = builder();
        let foreign = other.begin_cluster("Other Cluster");

        assert!(matches!(
            b.end_cluster(foreign),
            Err(SceneError::UnknownCluster(id)) if id.index() == 0
        ));

        // the local scope is still open and closes normally
        b.add_node("inside", Icon::Compute);
        let mine_id = b.end_cluster(mine).unwrap();
        let scene = b.finish().unwrap();
        assert_eq!(scene.nodes[0].cluster, Some(mine_id));
    }

    #[test]
    fn test_fan_out_shares_attributes() {
        let mut b = builder();
        let cp = b.add_node("Control Plane", Icon::ApiServer);
        let pool = b.begin_cluster("Worker Node Pool");
        let workers: Vec<_> = (1..=3)
            .map(|i| b.add_node(format!("Worker {}", i), Icon::Compute))
            .collect();
        b.end_cluster(pool).unwrap();

        let attrs = EdgeAttributes::new()
            .label("kubelet/CNI traffic")
            .color("orange")
            .style(EdgeStyle::Bold);
        b.fan_out(cp, &workers, EdgeDirection::Forward, attrs.clone())
            .unwrap();

        let scene = b.finish().unwrap();
        assert_eq!(scene.edges.len(), 3);
        for (edge, worker) in scene.edges.iter().zip(&workers) {
            assert_eq!(edge.from, cp);
            assert_eq!(edge.to, *worker);
            assert_eq!(edge.attributes, attrs);
        }
    }

    #[test]
    fn test_fan_out_is_all_or_nothing() {
        let mut b = builder();
        let cp = b.add_node("cp", Icon::ApiServer);
        let w = b.add_node("w", Icon::Compute);
        let stray = builder().add_node("stray", Icon::Compute);

        assert_eq!(
            b.fan_out(cp, &[], EdgeDirection::Forward, EdgeAttributes::new()),
            Err(SceneError::EmptyFanOut(cp))
        );
        assert!(b
            .fan_out(cp, &[w, stray], EdgeDirection::Forward, EdgeAttributes::new())
            .is_err());
        assert!(b.finish().unwrap().edges.is_empty());
    }

    #[test]
    fn test_cluster_scopes_are_lifo() {
        let mut b = builder();
        let outer = b.begin_cluster("Internal LAN");
        let inner = b.begin_cluster("Management Layer");

        let err = b.end_cluster(outer).unwrap_err();
        assert_eq!(
            err,
            SceneError::ClusterOrder {
                closing: "Internal LAN".to_string(),
                innermost: "Management Layer".to_string(),
            }
        );

        b.end_cluster(inner).unwrap();
        assert!(matches!(
            b.finish(),
            Err(SceneError::UnclosedCluster(title)) if title == "Internal LAN"
        ));
    }

    #[test]
    fn test_unclosed_cluster_fails_finish() {
        let mut b = builder();
        let _open = b.begin_cluster("External Access");
        b.add_node("dns", Icon::Internet);
        assert_eq!(
            b.finish().unwrap_err(),
            SceneError::UnclosedCluster("External Access".to_string())
        );
    }

    #[test]
    fn test_nesting_integrity() {
        let mut b = builder();
        let top = b.add_node("top", Icon::Internet);
        let lan = b.begin_cluster("LAN");
        let dns = b.add_node("dns", Icon::Subnet);
        let mgmt = b.begin_cluster("Mgmt");
        let hub = b.add_node("hub", Icon::ContainerHost);
        let mgmt_id = b.end_cluster(mgmt).unwrap();
        let infra = b.begin_cluster("Infra");
        let host = b.add_node("host", Icon::BareMetal);
        let infra_id = b.end_cluster(infra).unwrap();
        let lan_id = b.end_cluster(lan).unwrap();
        let scene = b.finish().unwrap();

        assert_eq!(scene.node(top).unwrap().cluster, None);
        assert_eq!(scene.node(dns).unwrap().cluster, Some(lan_id));
        assert_eq!(scene.node(hub).unwrap().cluster, Some(mgmt_id));
        assert_eq!(scene.node(host).unwrap().cluster, Some(infra_id));

        // every node is a member of exactly one scope
        for node in &scene.nodes {
            let mut owners = scene
                .clusters
                .iter()
                .filter(|c| c.members.contains(&Member::Node(node.id)))
                .count();
            if scene.root.contains(&Member::Node(node.id)) {
                owners += 1;
            }
            assert_eq!(owners, 1, "node {:?}", node.id);
        }

        // parents are declared before children, so the tree is acyclic
        for cluster in &scene.clusters {
            if let Some(parent) = cluster.parent {
                assert!(parent < cluster.id);
            }
        }

        assert_eq!(scene.depth(lan_id), 0);
        assert_eq!(scene.depth(mgmt_id), 1);
        assert_eq!(
            scene.members(Some(lan_id)),
            &[
                Member::Node(dns),
                Member::Cluster(mgmt_id),
                Member::Cluster(infra_id)
            ]
        );
    }
}
