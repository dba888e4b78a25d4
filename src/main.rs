/// topodraw - network topology diagrams for Omni + Talos infrastructure
///
/// Builds scene graphs of clusters, nodes and edges from YAML descriptions
/// (or the built-in topologies) and renders them with Graphviz.
mod config;
mod render;
mod scene;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{builtin, SceneConfig, SceneSource};
use crate::render::DiagramRenderer;
use crate::scene::{OutputFormat, Scene};

#[derive(Parser)]
#[command(name = "topodraw")]
#[command(about = "Render network topology diagrams with Graphviz", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output directory for rendered diagrams
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Graphviz `dot` binary (defaults to $TOPODRAW_DOT, then `dot` on PATH)
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render diagrams (all built-in topologies when none are given)
    Render {
        /// Built-in topology names or scene files
        scenes: Vec<String>,
    },

    /// Print the DOT source of a diagram
    Dot {
        /// Built-in topology name or scene file
        scene: String,
    },

    /// Validate scene descriptions without rendering
    Check {
        /// Built-in topology names or scene files
        scenes: Vec<String>,
    },

    /// Print the validated scene graph as JSON
    Inspect {
        /// Built-in topology name or scene file
        scene: String,
    },

    /// Generate example scene file
    Init {
        /// Where to write the example
        #[arg(default_value = "topology.yaml")]
        path: PathBuf,
    },

    /// List built-in topologies
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("topodraw={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Execute command
    let result = match cli.command {
        None => render_diagrams(&cli, &[]).await,
        Some(Commands::Render { ref scenes }) => render_diagrams(&cli, scenes).await,
        Some(Commands::Dot { ref scene }) => print_dot(scene),
        Some(Commands::Check { ref scenes }) => check_scenes(scenes),
        Some(Commands::Inspect { ref scene }) => inspect_scene(scene),
        Some(Commands::Init { ref path }) => init_config(path).await,
        Some(Commands::List) => {
            builtin::names().for_each(|name| println!("{}", name));
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Resolve scene arguments, defaulting to every built-in topology
fn sources(args: &[String]) -> Vec<SceneSource> {
    if args.is_empty() {
        builtin::names().map(SceneSource::Builtin).collect()
    } else {
        args.iter().map(|arg| SceneSource::parse(arg)).collect()
    }
}

/// Load and assemble one scene graph
fn load_scene(source: &SceneSource) -> Result<Scene> {
    let config = source
        .load()
        .with_context(|| format!("Failed to load scene {}", source))?;
    config
        .build()
        .with_context(|| format!("Invalid topology in {}", source))
}

/// Render diagrams; every scene is validated before anything is written
async fn render_diagrams(cli: &Cli, args: &[String]) -> Result<()> {
    let scenes = sources(args)
        .iter()
        .map(load_scene)
        .collect::<Result<Vec<_>>>()?;

    let renderer = DiagramRenderer::new(&cli.output)
        .with_dot_binary(config::dot_binary(cli.dot.as_deref()));

    if scenes
        .iter()
        .any(|s| s.diagram.outformat != OutputFormat::Dot)
    {
        renderer
            .check_dot_installed()
            .await
            .context("Graphviz is required")?;
    }

    for scene in &scenes {
        renderer
            .render(scene)
            .await
            .with_context(|| format!("Failed to render '{}'", scene.diagram.title))?;
    }

    info!("✓ Rendered {} diagram(s)", scenes.len());
    Ok(())
}

/// Print the DOT source of a scene to stdout
fn print_dot(arg: &str) -> Result<()> {
    let scene = load_scene(&SceneSource::parse(arg))?;
    print!("{}", render::to_dot(&scene));
    Ok(())
}

/// Validate scenes without touching the layout engine
fn check_scenes(args: &[String]) -> Result<()> {
    for source in sources(args) {
        let scene = load_scene(&source)?;
        info!(
            "✓ {}: {} nodes, {} clusters, {} edges -> {}",
            source,
            scene.nodes.len(),
            scene.clusters.len(),
            scene.edges.len(),
            scene.diagram.output_file_name()
        );
    }
    Ok(())
}

/// Print the validated scene graph as JSON
fn inspect_scene(arg: &str) -> Result<()> {
    let scene = load_scene(&SceneSource::parse(arg))?;
    println!("{}", serde_json::to_string_pretty(&scene)?);
    Ok(())
}

/// Initialize example scene file
async fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Scene file already exists: {}", path.display());
    }

    let example = SceneConfig::example();
    let yaml = serde_yaml::to_string(&example)?;

    tokio::fs::write(path, yaml)
        .await
        .context("Failed to write scene file")?;

    info!("Example scene created: {}", path.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the scene to describe your topology");
    info!("  2. Check it:");
    info!("     topodraw check {}", path.display());
    info!("  3. Render it (requires Graphviz):");
    info!("     topodraw render {}", path.display());

    Ok(())
}
