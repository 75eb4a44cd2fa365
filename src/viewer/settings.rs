//! Persistent viewer settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::display::{BufferMode, DepthRange};
use crate::render::{Camera, RenderConfig, WorkerConfig};
use crate::util::{Quat, Result, Vec3};

/// Settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Framebuffer
    pub width: u32,
    pub height: u32,

    // Refinement
    pub max_passes: u32,
    pub scene_scale: f32,
    pub idle_backoff_ms: u64,
    pub failure_backoff_ms: u64,

    // Home camera
    pub eye: [f32; 3],
    pub look_at: [f32; 3],
    pub up: [f32; 3],
    pub fov: f32,

    // Display
    pub buffer_mode: BufferMode,
    pub depth_range: DepthRange,
    pub depth_pseudo_color: bool,

    // Last opened mesh
    pub last_mesh: Option<PathBuf>,

    // Recent meshes (most recent first, max 10)
    pub recent_meshes: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let render = RenderConfig::default();
        let worker = WorkerConfig::default();
        Self {
            width: render.width,
            height: render.height,
            max_passes: render.max_passes,
            scene_scale: render.scene_scale,
            idle_backoff_ms: worker.idle_backoff.as_millis() as u64,
            failure_backoff_ms: worker.failure_backoff.as_millis() as u64,
            eye: render.camera.eye.to_array(),
            look_at: render.camera.look_at.to_array(),
            up: render.camera.up.to_array(),
            fov: render.camera.fov,
            buffer_mode: BufferMode::default(),
            depth_range: DepthRange::default(),
            depth_pseudo_color: false,
            last_mesh: None,
            recent_meshes: Vec::new(),
        }
    }
}

const MAX_RECENT_MESHES: usize = 10;

impl Settings {
    /// Settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("facemesh-viewer");
            p.push("settings.json");
            p
        })
    }

    /// Load persisted settings; missing or unreadable files give defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Self::default()
        })
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Add mesh to recent list (moves to top if already present)
    pub fn add_recent(&mut self, path: PathBuf) {
        self.recent_meshes.retain(|p| p != &path);
        self.recent_meshes.insert(0, path.clone());
        self.recent_meshes.truncate(MAX_RECENT_MESHES);
        self.last_mesh = Some(path);
    }

    /// Recent meshes that still exist.
    pub fn recent_meshes(&self) -> Vec<&PathBuf> {
        self.recent_meshes.iter().filter(|p| p.exists()).collect()
    }

    pub fn camera(&self) -> Camera {
        Camera {
            eye: Vec3::from_array(self.eye),
            look_at: Vec3::from_array(self.look_at),
            up: Vec3::from_array(self.up),
            fov: self.fov,
            orientation: Quat::IDENTITY,
        }
    }

    /// Validated render configuration.
    pub fn render_config(&self) -> Result<RenderConfig> {
        let config = RenderConfig {
            camera: self.camera(),
            width: self.width,
            height: self.height,
            max_passes: self.max_passes,
            scene_scale: self.scene_scale,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            idle_backoff: Duration::from_millis(self.idle_backoff_ms),
            failure_backoff: Duration::from_millis(self.failure_backoff_ms),
        }
    }
}
