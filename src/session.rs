use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use crate::driver::{CancelToken, DisplaySink, StreamDriver, StreamSummary};
use crate::error::{TilewireError, TilewireResult};
use crate::process::RendererProcess;
use crate::protocol::{ByteOrder, ProtocolDecoder};
use crate::window::{CropBorder, RenderWindow};

fn default_passes() -> u32 {
    1
}

/// Per-render configuration: output resolution, renderer pass count, an
/// optional crop border, and the wire byte order.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_passes")]
    pub passes: u32,
    #[serde(default)]
    pub border: Option<CropBorder>,
    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl RenderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            passes: default_passes(),
            border: None,
            byte_order: ByteOrder::default(),
        }
    }

    pub fn validate(&self) -> TilewireResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TilewireError::validation(
                "render width/height must be non-zero",
            ));
        }
        if self.passes == 0 {
            return Err(TilewireError::validation("pass count must be non-zero"));
        }
        if let Some(border) = &self.border {
            border.validate()?;
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> TilewireResult<Self> {
        use anyhow::Context as _;
        let file = File::open(path)
            .with_context(|| format!("open render config '{}'", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| "parse render config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// The render window this configuration describes, validated.
    pub fn window(&self) -> TilewireResult<RenderWindow> {
        self.validate()?;
        match self.border {
            Some(border) => RenderWindow::with_border(self.width, self.height, border),
            None => RenderWindow::full(self.width, self.height),
        }
    }

    /// Expected pixel deliveries for the whole render: window area once per
    /// renderer pass.
    pub fn total_pixels(&self, window: &RenderWindow) -> u64 {
        window.area() * u64::from(self.passes)
    }
}

/// Dispatch point for render invocations.
///
/// Owns the serialization lock guaranteeing at most one renderer subprocess
/// and one active stream driver per `Renderer` at a time; concurrent calls
/// to [`Renderer::render`] queue on it.
#[derive(Default)]
pub struct Renderer {
    lock: Mutex<()>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `command`, decodes its tile stream into `sink`, and reports
    /// fractions through `on_progress`.
    ///
    /// Blocks until the stream ends, `cancel` is observed, or decoding
    /// fails. The subprocess is terminated on every exit path.
    pub fn render<'a>(
        &self,
        config: &RenderConfig,
        command: Command,
        sink: &'a mut dyn DisplaySink,
        cancel: CancelToken,
        on_progress: impl FnMut(f32) + 'a,
    ) -> TilewireResult<StreamSummary> {
        let window = config.window()?;
        let total_pixels = config.total_pixels(&window);

        let _guard = self
            .lock
            .lock()
            .map_err(|_| TilewireError::process("render serialization lock is poisoned"))?;

        let (process, stdout) = RendererProcess::spawn(command)?;
        tracing::debug!(pid = process.id(), "renderer spawned");

        let decoder = ProtocolDecoder::with_byte_order(stdout, config.byte_order);
        StreamDriver::new(decoder, window, total_pixels, sink)
            .with_cancel(cancel)
            .with_process(process)
            .on_progress(on_progress)
            .run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_in_from_json() {
        let config: RenderConfig = serde_json::from_str(r#"{"width":640,"height":480}"#).unwrap();
        assert_eq!(config.passes, 1);
        assert_eq!(config.border, None);
        assert_eq!(config.byte_order, ByteOrder::Little);
        config.validate().unwrap();
    }

    #[test]
    fn config_with_border_yields_the_cropped_window() {
        let config: RenderConfig = serde_json::from_str(
            r#"{
                "width": 100,
                "height": 100,
                "passes": 4,
                "border": {"min_x": 0.0, "min_y": 0.0, "max_x": 0.5, "max_y": 0.5},
                "byte_order": "little"
            }"#,
        )
        .unwrap();

        let window = config.window().unwrap();
        assert_eq!((window.min_x(), window.max_x()), (0, 49));
        assert_eq!((window.min_y(), window.max_y()), (50, 99));
        assert_eq!(config.total_pixels(&window), 50 * 50 * 4);
    }

    #[test]
    fn zero_extent_config_is_rejected() {
        assert!(RenderConfig::new(0, 480).validate().is_err());
        let mut config = RenderConfig::new(640, 480);
        config.passes = 0;
        assert!(config.validate().is_err());
    }
}
