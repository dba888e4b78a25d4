/// Diagram rendering through the Graphviz layout engine
pub mod dot;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::scene::{OutputFormat, Scene};
use crate::utils::command::{check_tool_installed, CommandBuilder};

pub use dot::to_dot;

const GRAPHVIZ_INSTALL_URL: &str = "https://graphviz.org/download/";

/// Errors raised while turning a scene into an output file
#[derive(Debug, Error)]
pub enum RenderError {
    /// The layout engine binary is missing or cannot be executed
    #[error("layout engine '{}' is unavailable: {reason}", .binary.display())]
    LayoutEngineMissing { binary: PathBuf, reason: String },

    /// The layout engine ran but rejected the scene
    #[error("layout engine failed to render '{title}': {stderr}")]
    LayoutFailed { title: String, stderr: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RenderError + '_ {
    move |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Renders finished scenes into image files
///
/// Each output is produced in a temporary file next to its final path and
/// renamed into place only after the layout engine succeeds.
pub struct DiagramRenderer {
    output_dir: PathBuf,
    dot_binary: PathBuf,
}

impl DiagramRenderer {
    /// Create a renderer writing into `output_dir` with `dot` from PATH
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            dot_binary: PathBuf::from("dot"),
        }
    }

    /// Use a specific layout engine binary
    pub fn with_dot_binary(mut self, dot_binary: impl Into<PathBuf>) -> Self {
        self.dot_binary = dot_binary.into();
        self
    }

    /// Final path of a scene's output file
    pub fn output_path(&self, scene: &Scene) -> PathBuf {
        self.output_dir.join(scene.diagram.output_file_name())
    }

    /// Check that the layout engine can be executed
    pub async fn check_dot_installed(&self) -> Result<(), RenderError> {
        check_tool_installed(self.dot_binary.as_os_str(), &["-V"], GRAPHVIZ_INSTALL_URL)
            .await
            .map_err(|e| RenderError::LayoutEngineMissing {
                binary: self.dot_binary.clone(),
                reason: e.to_string(),
            })
    }

    /// Render a scene to `<output_dir>/<filename>.<ext>`, returning the path written
    pub async fn render(&self, scene: &Scene) -> Result<PathBuf, RenderError> {
        let format = scene.diagram.outformat;
        let target = self.output_path(scene);
        info!(
            "Rendering '{}' to {}",
            scene.diagram.title,
            target.display()
        );

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_error(&self.output_dir))?;

        let source = to_dot(scene);
        debug!("Generated {} bytes of DOT", source.len());

        // removed on drop unless persisted
        let temp = tempfile::Builder::new()
            .prefix(".topodraw-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(&self.output_dir)
            .map_err(io_error(&self.output_dir))?;

        match format {
            OutputFormat::Dot => tokio::fs::write(temp.path(), source.as_bytes())
                .await
                .map_err(io_error(temp.path()))?,
            _ => self.run_layout(scene, source, temp.path()).await?,
        }

        temp.persist(&target).map_err(|e| RenderError::Io {
            path: target.clone(),
            source: e.error,
        })?;

        info!("✓ Wrote {}", target.display());
        Ok(target)
    }

    async fn run_layout(
        &self,
        scene: &Scene,
        source: String,
        out: &Path,
    ) -> Result<(), RenderError> {
        let format = scene.diagram.outformat.extension();
        debug!(
            "Running {} -T{} -o {}",
            self.dot_binary.display(),
            format,
            out.display()
        );

        let output = CommandBuilder::new(&self.dot_binary)
            .arg(format!("-T{}", format))
            .arg("-o")
            .arg(out)
            .stdin(source)
            .context(format!("Failed to execute {}", self.dot_binary.display()))
            .output()
            .await
            .map_err(|e| RenderError::LayoutEngineMissing {
                binary: self.dot_binary.clone(),
                reason: format!("{:#}", e),
            })?;

        if !output.success {
            let stderr = match (output.stderr.trim(), output.code) {
                ("", Some(code)) => format!("exited with status {}", code),
                ("", None) => "terminated by signal".to_string(),
                (stderr, _) => stderr.to_string(),
            };
            return Err(RenderError::LayoutFailed {
                title: scene.diagram.title.clone(),
                stderr,
            });
        }

        let written = tokio::fs::metadata(out).await.map_err(io_error(out))?;
        if written.len() == 0 {
            return Err(RenderError::LayoutFailed {
                title: scene.diagram.title.clone(),
                stderr: "layout engine produced no output".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin;
    use crate::scene::{DiagramAttributes, Icon, SceneBuilder};

    fn scene(format: OutputFormat) -> Scene {
        let mut b = SceneBuilder::new(
            DiagramAttributes::new("Render Test")
                .with_filename("render_test")
                .with_format(format),
        );
        b.add_node("A", Icon::Internet);
        b.finish().unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_render_dot_writes_exactly_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let scene = builtin::load("network_topology")
            .unwrap()
            .build()
            .map(|mut s| {
                s.diagram.outformat = OutputFormat::Dot;
                s
            })
            .unwrap();

        let renderer = DiagramRenderer::new(dir.path()).with_dot_binary("topodraw-no-such-dot");
        let path = renderer.render(&scene).await.unwrap();

        assert_eq!(path, dir.path().join("network_topology.dot"));
        assert_eq!(entries(dir.path()), ["network_topology.dot"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), to_dot(&scene));

        // re-running overwrites with identical bytes
        renderer.render(&scene).await.unwrap();
        assert_eq!(entries(dir.path()), ["network_topology.dot"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), to_dot(&scene));
    }

    #[tokio::test]
    async fn test_render_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("docs").join("assets");

        let path = DiagramRenderer::new(&nested)
            .render(&scene(OutputFormat::Dot))
            .await
            .unwrap();
        assert_eq!(path, nested.join("render_test.dot"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_engine_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let previous = dir.path().join("render_test.png");
        std::fs::write(&previous, b"previous image").unwrap();

        let renderer = DiagramRenderer::new(dir.path()).with_dot_binary("topodraw-no-such-dot");
        assert!(matches!(
            renderer.check_dot_installed().await,
            Err(RenderError::LayoutEngineMissing { .. })
        ));

        let err = renderer.render(&scene(OutputFormat::Png)).await.unwrap_err();
        assert!(matches!(err, RenderError::LayoutEngineMissing { .. }));

        // prior output untouched, no temporary file left behind
        assert_eq!(entries(dir.path()), ["render_test.png"]);
        assert_eq!(std::fs::read(&previous).unwrap(), b"previous image");
    }

    #[tokio::test]
    async fn test_failing_engine_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();

        let err = DiagramRenderer::new(dir.path())
            .with_dot_binary("false")
            .render(&scene(OutputFormat::Png))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RenderError::LayoutFailed { ref title, ref stderr }
                if title == "Render Test" && stderr == "exited with status 1"
        ));
        assert!(entries(dir.path()).is_empty());
    }

    /// Write an executable stand-in for `dot` and return its path
    #[cfg(unix)]
    fn stub_dot(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("stub-dot");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_through_layout_engine() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let previous = dir.path().join("render_test.svg");
        std::fs::write(&previous, b"previous image").unwrap();

        // expects `-Tsvg -o <path>` and the DOT source on stdin
        let dot = stub_dot(
            bin.path(),
            r#"[ "$1" = "-Tsvg" ] && [ "$2" = "-o" ] || exit 2
grep -q '^digraph "Render Test"' || exit 3
printf '<svg/>' > "$3""#,
        );

        let path = DiagramRenderer::new(dir.path())
            .with_dot_binary(dot)
            .render(&scene(OutputFormat::Svg))
            .await
            .unwrap();

        assert_eq!(path, previous);
        assert_eq!(entries(dir.path()), ["render_test.svg"]);
        assert_eq!(std::fs::read(&path).unwrap(), b"<svg/>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_layout_output_is_rejected() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dot = stub_dot(bin.path(), "cat > /dev/null\nexit 0");

        let err = DiagramRenderer::new(dir.path())
            .with_dot_binary(dot)
            .render(&scene(OutputFormat::Png))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RenderError::LayoutFailed { ref stderr, .. } if stderr.contains("no output")
        ));
        assert!(entries(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_layout_engine_stderr_is_reported() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dot = stub_dot(bin.path(), "echo 'syntax error in line 3' >&2\nexit 1");

        let err = DiagramRenderer::new(dir.path())
            .with_dot_binary(dot)
            .render(&scene(OutputFormat::Pdf))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("syntax error in line 3"));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_render_png_with_graphviz() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = DiagramRenderer::new(dir.path());

        // Graphviz may not be installed in CI
        if renderer.check_dot_installed().await.is_err() {
            return;
        }

        let scene = builtin::load("omni_talos_proxmox_enhanced")
            .unwrap()
            .build()
            .unwrap();
        let path = renderer.render(&scene).await.unwrap();

        assert_eq!(entries(dir.path()), ["omni_talos_proxmox_enhanced.png"]);
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }
}
