/// Topologies shipped inside the binary
use anyhow::Context;

use super::SceneConfig;

const BUILTINS: &[(&str, &str)] = &[
    (
        "network_topology",
        include_str!("../../topologies/network_topology.yaml"),
    ),
    (
        "omni_talos_proxmox_enhanced",
        include_str!("../../topologies/omni_talos_proxmox_enhanced.yaml"),
    ),
];

/// Names of all built-in topologies
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

/// Find a built-in topology by name, returning its name and YAML source
pub fn lookup(name: &str) -> Option<(&'static str, &'static str)> {
    BUILTINS.iter().copied().find(|(n, _)| *n == name)
}

/// Parse a built-in topology
pub fn load(name: &str) -> anyhow::Result<SceneConfig> {
    let (name, source) =
        lookup(name).with_context(|| format!("Unknown built-in topology: {}", name))?;
    SceneConfig::from_yaml(source).with_context(|| format!("Invalid built-in topology {}", name))
}
