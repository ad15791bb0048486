//! Platform Probe
//!
//! Collects the ambient environment signals that make up a device's feature
//! vector. Every signal is read independently; a signal that cannot be read
//! contributes `0` or `""` instead of failing the whole probe.
//!
//! # Field order
//!
//! The vector is serialized in declaration order before hashing. Reordering,
//! renaming or adding fields changes every device uid derived afterwards.

use serde::{Deserialize, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::constants::{paths, probe};

// ============================================================================
// Feature Vector
// ============================================================================

/// Ordered record of environment signals fed into the identity hasher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub user_agent: String,
    pub platform: String,
    pub hardware_concurrency: u32,
    /// Coarse memory hint in GiB
    #[serde(serialize_with = "serialize_js_number")]
    pub device_memory: f64,
    pub max_touch_points: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub screen_color_depth: u32,
    pub screen_pixel_depth: u32,
    pub rendering_backend_fingerprint: String,
}

/// Whole numbers serialize without a fractional part (`8`, not `8.0`), so a
/// vector reported by a browser bridge hashes to the same uid it would in JS.
/// Non-finite values become `null`.
fn serialize_js_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        serializer.serialize_i64(*value as i64)
    } else if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Source of a feature vector for one target runtime
pub trait PlatformProbe {
    fn collect(&self) -> FeatureVector;
}

impl<P: PlatformProbe + ?Sized> PlatformProbe for Box<P> {
    fn collect(&self) -> FeatureVector {
        (**self).collect()
    }
}

// ============================================================================
// Rendering Backend Sub-probe
// ============================================================================

/// Graphics backend identity strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
}

impl RendererInfo {
    pub fn fingerprint(&self) -> String {
        let sep = probe::RENDERER_SEPARATOR;
        format!("{}{sep}{}{sep}{}", self.vendor, self.renderer, self.version)
    }
}

/// Queries the active graphics backend; `None` when no surface is available
pub trait RenderingBackend {
    fn describe(&self) -> Option<RendererInfo>;
}

/// Serialized rendering backend identity, or `""` when there is none
pub fn rendering_backend_fingerprint(backend: &dyn RenderingBackend) -> String {
    backend
        .describe()
        .map(|info| info.fingerprint())
        .unwrap_or_default()
}

/// Backend for headless hosts with no rendering surface
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderingBackend;

impl RenderingBackend for NoRenderingBackend {
    fn describe(&self) -> Option<RendererInfo> {
        None
    }
}

/// Reads GPU identity from the kernel DRM class directory
#[derive(Debug, Clone)]
pub struct DrmRenderingBackend {
    drm_root: PathBuf,
}

impl DrmRenderingBackend {
    pub fn new(drm_root: impl Into<PathBuf>) -> Self {
        Self {
            drm_root: drm_root.into(),
        }
    }
}

impl Default for DrmRenderingBackend {
    fn default() -> Self {
        Self::new(paths::DRM_CLASS)
    }
}

impl RenderingBackend for DrmRenderingBackend {
    fn describe(&self) -> Option<RendererInfo> {
        // First card node; connectors (card0-HDMI-A-1) are skipped
        let card = sorted_entries(&self.drm_root)
            .into_iter()
            .find(|name| name.starts_with("card") && !name.contains('-'))?;
        let device = self.drm_root.join(&card).join("device");

        let vendor = read_trimmed(&device.join("vendor")).unwrap_or_default();
        let renderer = read_trimmed(&device.join("device")).unwrap_or_default();
        if vendor.is_empty() && renderer.is_empty() {
            trace!(card = %card, "DRM card has no PCI identity");
            return None;
        }

        let version = fs::read_link(device.join("driver"))
            .ok()
            .and_then(|target| target.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_default();

        Some(RendererInfo {
            vendor,
            renderer,
            version,
        })
    }
}

// ============================================================================
// Host Probe (embedded OS agent)
// ============================================================================

/// Probe for a native display agent running directly on the device OS
pub struct HostProbe {
    drm_root: PathBuf,
    meminfo_path: PathBuf,
    renderer: Box<dyn RenderingBackend + Send + Sync>,
}

impl HostProbe {
    pub fn new() -> Self {
        Self {
            drm_root: PathBuf::from(paths::DRM_CLASS),
            meminfo_path: PathBuf::from(paths::MEMINFO),
            renderer: Box::new(DrmRenderingBackend::default()),
        }
    }

    /// Probe rooted at alternative sysfs/procfs locations
    pub fn with_roots(drm_root: impl Into<PathBuf>, meminfo_path: impl Into<PathBuf>) -> Self {
        let drm_root = drm_root.into();
        Self {
            renderer: Box::new(DrmRenderingBackend::new(drm_root.clone())),
            drm_root,
            meminfo_path: meminfo_path.into(),
        }
    }

    pub fn with_renderer(mut self, renderer: impl RenderingBackend + Send + Sync + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    fn device_memory(&self) -> f64 {
        read_trimmed(&self.meminfo_path)
            .and_then(|content| parse_meminfo_total_kb(&content))
            .map(|kb| bucket_device_memory(kb as f64 / (1024.0 * 1024.0)))
            .unwrap_or(0.0)
    }

    /// Resolution of the first connected connector's preferred mode
    fn screen_geometry(&self) -> Option<(u32, u32)> {
        sorted_entries(&self.drm_root)
            .into_iter()
            .filter(|name| name.starts_with("card") && name.contains('-'))
            .find_map(|connector| {
                let dir = self.drm_root.join(&connector);
                let status = read_trimmed(&dir.join("status"))?;
                if status != "connected" {
                    return None;
                }
                let modes = read_trimmed(&dir.join("modes"))?;
                parse_mode(modes.lines().next()?)
            })
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformProbe for HostProbe {
    fn collect(&self) -> FeatureVector {
        let (screen_width, screen_height) = self.screen_geometry().unwrap_or((0, 0));
        let depth = if screen_width > 0 {
            probe::DEFAULT_COLOR_DEPTH
        } else {
            0
        };

        FeatureVector {
            user_agent: host_user_agent(),
            platform: host_platform(),
            hardware_concurrency: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(0),
            device_memory: self.device_memory(),
            max_touch_points: 0,
            screen_width,
            screen_height,
            screen_color_depth: depth,
            screen_pixel_depth: depth,
            rendering_backend_fingerprint: rendering_backend_fingerprint(self.renderer.as_ref()),
        }
    }
}

/// User agent without a version number, so agent upgrades keep the same uid
pub fn host_user_agent() -> String {
    format!(
        "{} ({}; {})",
        probe::USER_AGENT_PRODUCT,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

pub fn host_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

// ============================================================================
// Static Probe
// ============================================================================

/// Returns a fixed vector, e.g. one reported by a browser bridge
#[derive(Debug, Clone, Default)]
pub struct StaticProbe(pub FeatureVector);

impl PlatformProbe for StaticProbe {
    fn collect(&self) -> FeatureVector {
        self.0.clone()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn sorted_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(e) => {
            trace!(dir = ?dir, error = %e, "Cannot list directory");
            Vec::new()
        }
    };
    names.sort();
    names
}

/// Extract `MemTotal` in kB from /proc/meminfo content
fn parse_meminfo_total_kb(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
}

/// Round down to the nearest memory bucket; tiny values clamp to the smallest
fn bucket_device_memory(gib: f64) -> f64 {
    if !(gib > 0.0) {
        return 0.0;
    }
    let buckets = probe::DEVICE_MEMORY_BUCKETS;
    buckets
        .iter()
        .rev()
        .copied()
        .find(|b| *b <= gib)
        .unwrap_or(buckets[0])
}

/// Parse a DRM mode line such as `1920x1080` or `1920x1080i`
fn parse_mode(line: &str) -> Option<(u32, u32)> {
    let (w, h) = line.trim().split_once('x')?;
    let h: String = h.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some((w.parse().ok()?, h.parse().ok()?))
}
