use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    Framebuffer,
    Kitty,
}

/// Viewer settings from `config.toml`; command-line flags override them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Degrees, applied on every render.
    pub rotation: i32,
    /// Initial zoom in tenths.
    pub zoom: i32,
    /// Zoom used by `z` without a count.
    pub default_zoom: i32,
    pub page: usize,
    /// Rows between the page top and the display top at startup.
    pub vertical_offset: i32,
    pub display: DisplayKind,
    pub framebuffer: PathBuf,
    pub touch_device: PathBuf,
    /// Touch rows above this value page forward, rows below it page back.
    pub touch_midpoint: i32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            rotation: 90,
            zoom: 22,
            default_zoom: 22,
            page: 1,
            vertical_offset: 122,
            display: DisplayKind::Framebuffer,
            framebuffer: PathBuf::from("/dev/fb0"),
            touch_device: PathBuf::from("/dev/input/by-id/usb-ELAN_Touchscreen-event-if00"),
            touch_midpoint: 1056,
        }
    }
}

impl ViewerConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {:?}", path))
            }
        };
        Self::parse(&text).with_context(|| format!("failed to parse config {:?}", path))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
