//! Configuration and color scheme management for jjgraph.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.jjgraph/config.toml`
//! - The log command and parser markers
//! - Built-in color schemes for the selection band and status bar
//!
//! # Configuration File
//!
//! ```toml
//! # Color scheme: default, solarized-dark, solarized-light,
//! #               monokai, nord, dracula, gruvbox-dark, tokyo-night
//! color_scheme = "tokyo-night"
//!
//! [log]
//! command = ["jj", "log", "--color", "always", "-r", "::@"]
//! batch_size = 50
//!
//! [graph]
//! elision_marker = "~"
//! hidden_marker = "hidden"
//!
//! [status_bar]
//! visible = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::ParseOptions;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Color scheme name
    pub color_scheme: String,
    /// Log command settings
    pub log: LogConfig,
    /// Graph parsing settings
    pub graph: GraphConfig,
    /// Status bar settings
    pub status_bar: StatusBarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color_scheme: "default".to_string(),
            log: LogConfig::default(),
            graph: GraphConfig::default(),
            status_bar: StatusBarConfig::default(),
        }
    }
}

/// Log command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Program and arguments printing the colored graph
    pub command: Vec<String>,
    /// Rows delivered per request
    pub batch_size: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            command: ["jj", "log", "--color", "always"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            batch_size: 50,
        }
    }
}

/// Graph parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub elision_marker: char,
    pub hidden_marker: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let options = ParseOptions::default();
        Self {
            elision_marker: options.elision_marker,
            hidden_marker: options.hidden_marker,
        }
    }
}

/// Status bar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    pub visible: bool,
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self { visible: true }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get the color scheme
    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }

    /// Parser markers
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            elision_marker: self.graph.elision_marker,
            hidden_marker: self.graph.hidden_marker.clone(),
        }
    }

    /// Rows per batch, never zero
    pub fn batch_size(&self) -> usize {
        self.log.batch_size.max(1)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }

    /// SGR parameters selecting this color as background
    pub fn bg_params(&self) -> Vec<u16> {
        vec![48, 2, self.r as u16, self.g as u16, self.b as u16]
    }

    /// Escape sequence selecting this color as foreground
    pub fn fg_escape(&self) -> String {
        format!("\x1b[38;2;{};{};{}m", self.r, self.g, self.b)
    }
}

/// Color scheme definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,

    // Selected row
    pub selection_bg: Color,

    // Status bar colors
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub status_error_fg: Color,

    // Decorations
    pub mark_fg: Color,
    pub detail_fg: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Default color scheme
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),
            selection_bg: Color::new(60, 60, 80),
            status_bar_bg: Color::new(0, 100, 0),
            status_bar_fg: Color::new(255, 255, 255),
            status_error_fg: Color::new(255, 90, 90),
            mark_fg: Color::new(200, 200, 0),
            detail_fg: Color::new(150, 150, 150),
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),
            selection_bg: Color::new(7, 54, 66),
            status_bar_bg: Color::new(7, 54, 66),
            status_bar_fg: Color::new(147, 161, 161),
            status_error_fg: Color::new(220, 50, 47),
            mark_fg: Color::new(181, 137, 0),
            detail_fg: Color::new(101, 123, 131),
        }
    }

    /// Solarized Light scheme
    pub fn solarized_light() -> Self {
        Self {
            name: "solarized-light".to_string(),
            selection_bg: Color::new(238, 232, 213),
            status_bar_bg: Color::new(238, 232, 213),
            status_bar_fg: Color::new(101, 123, 131),
            status_error_fg: Color::new(220, 50, 47),
            mark_fg: Color::new(181, 137, 0),
            detail_fg: Color::new(147, 161, 161),
        }
    }

    /// Monokai scheme
    pub fn monokai() -> Self {
        Self {
            name: "monokai".to_string(),
            selection_bg: Color::new(73, 72, 62),
            status_bar_bg: Color::new(60, 60, 54),
            status_bar_fg: Color::new(248, 248, 242),
            status_error_fg: Color::new(249, 38, 114),
            mark_fg: Color::new(166, 226, 46),
            detail_fg: Color::new(117, 113, 94),
        }
    }

    /// Nord scheme
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),
            selection_bg: Color::new(67, 76, 94),
            status_bar_bg: Color::new(59, 66, 82),
            status_bar_fg: Color::new(216, 222, 233),
            status_error_fg: Color::new(191, 97, 106),
            mark_fg: Color::new(163, 190, 140),
            detail_fg: Color::new(129, 161, 193),
        }
    }

    /// Dracula scheme
    pub fn dracula() -> Self {
        Self {
            name: "dracula".to_string(),
            selection_bg: Color::new(68, 71, 90),
            status_bar_bg: Color::new(68, 71, 90),
            status_bar_fg: Color::new(248, 248, 242),
            status_error_fg: Color::new(255, 85, 85),
            mark_fg: Color::new(80, 250, 123),
            detail_fg: Color::new(98, 114, 164),
        }
    }

    /// Gruvbox Dark scheme
    pub fn gruvbox_dark() -> Self {
        Self {
            name: "gruvbox-dark".to_string(),
            selection_bg: Color::new(80, 73, 69),
            status_bar_bg: Color::new(60, 56, 54),
            status_bar_fg: Color::new(235, 219, 178),
            status_error_fg: Color::new(251, 73, 52),
            mark_fg: Color::new(215, 153, 33),
            detail_fg: Color::new(168, 153, 132),
        }
    }

    /// Tokyo Night scheme
    pub fn tokyo_night() -> Self {
        Self {
            name: "tokyo-night".to_string(),
            selection_bg: Color::new(51, 59, 91),
            status_bar_bg: Color::new(36, 40, 59),
            status_bar_fg: Color::new(169, 177, 214),
            status_error_fg: Color::new(247, 118, 142),
            mark_fg: Color::new(158, 206, 106),
            detail_fg: Color::new(86, 95, 137),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "solarized-light" | "solarized_light" => Self::solarized_light(),
            "monokai" => Self::monokai(),
            "nord" => Self::nord(),
            "dracula" => Self::dracula(),
            "gruvbox-dark" | "gruvbox_dark" | "gruvbox" => Self::gruvbox_dark(),
            "tokyo-night" | "tokyo_night" | "tokyonight" => Self::tokyo_night(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec![
            "default",
            "solarized-dark",
            "solarized-light",
            "monokai",
            "nord",
            "dracula",
            "gruvbox-dark",
            "tokyo-night",
        ]
    }
}

/// `~/.jjgraph`, created on first use
pub fn data_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".jjgraph");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
