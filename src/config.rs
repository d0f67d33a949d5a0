//! Application configuration.
//!
//! Loaded once at startup from a JSON file
//! (`$XDG_CONFIG_HOME/opwm/config.json` unless `--config <path>` is given)
//! into an immutable [`Config`].  Every field is optional; a minimal `{}`
//! file is valid.
//!
//! # Example
//!
//! ```json
//! {
//!   "workspaces": 5,
//!   "layout": "hstack",
//!   "master_ratio": 0.6,
//!   "gap": 4,
//!   "border": { "width": 2, "focus": "#70898f", "unfocus": "#555555" },
//!   "bar": { "height": 20, "bottom": false },
//!   "register": { "capacity": 5, "merge_consecutive": false },
//!   "rules": [
//!     { "class": "mpv", "workspace": 3, "floating": true }
//!   ]
//! }
//! ```

use crate::layout::{LayoutKind, MAX_MASTER_RATIO, MIN_MASTER_RATIO};
use crate::workspace::WorkspaceDefaults;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of workspaces.
    pub workspaces: usize,
    /// Workspace shown at startup (1-based).
    pub default_workspace: usize,
    /// Layout every workspace starts with.
    pub layout: LayoutKind,
    /// Initial master ratio, inside `(0.1, 1.0)`.
    #[serde(deserialize_with = "ratio_in_range")]
    pub master_ratio: f64,
    /// Default gap around tiled clients.
    pub gap: u16,
    /// Step used by the gap operators.
    pub op_gap_size: u16,
    /// Apply gaps in the zoom layout as well.
    pub zoom_gap: bool,
    /// Centre clients when they become floating.
    pub center_floating: bool,
    /// Follow a client moved to another workspace.
    pub follow_move: bool,
    pub float_spawn_width: u16,
    pub float_spawn_height: u16,
    pub border: BorderConfig,
    pub bar: BarConfig,
    pub register: RegisterConfig,
    pub scratchpad: ScratchpadConfig,
    /// IPC socket path.  Defaults to `$XDG_RUNTIME_DIR/opwm.sock`.
    pub socket_path: Option<PathBuf>,
    /// Placement rules applied to new windows by class.
    pub rules: Vec<Rule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspaces: 5,
            default_workspace: 1,
            layout: LayoutKind::HStack,
            master_ratio: 0.6,
            gap: 0,
            op_gap_size: 4,
            zoom_gap: true,
            center_floating: true,
            follow_move: false,
            float_spawn_width: 500,
            float_spawn_height: 500,
            border: BorderConfig::default(),
            bar: BarConfig::default(),
            register: RegisterConfig::default(),
            scratchpad: ScratchpadConfig::default(),
            socket_path: None,
            rules: Vec::new(),
        }
    }
}

/// Border width and colours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderConfig {
    pub width: u16,
    pub focus: Color,
    pub unfocus: Color,
    /// Colour of the client focused just before the current one.
    pub prev_focus: Color,
    pub urgent: Color,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            width: 2,
            focus: Color(0x70898f),
            unfocus: Color(0x555555),
            prev_focus: Color(0x74718e),
            urgent: Color(0xff0000),
        }
    }
}

/// Space reserved for an external status bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    pub height: u16,
    /// Reserve the space at the bottom instead of the top.
    pub bottom: bool,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            height: 20,
            bottom: false,
        }
    }
}

/// Delete register sizing and grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// Maximum number of groups held.
    pub capacity: usize,
    /// Merge kills with no paste in between into one group.
    pub merge_consecutive: bool,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            merge_consecutive: false,
        }
    }
}

/// Size of a client brought back from the scratchpad.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchpadConfig {
    pub width: u16,
    pub height: u16,
}

impl Default for ScratchpadConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
        }
    }
}

/// Placement rule for windows whose class matches `class`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub class: String,
    /// Target workspace; `0` keeps the current one.
    #[serde(default)]
    pub workspace: usize,
    /// Switch to the target workspace as well.
    #[serde(default)]
    pub follow: bool,
    #[serde(default)]
    pub floating: bool,
    #[serde(default)]
    pub fullscreen: bool,
}

/// A 24-bit `0xRRGGBB` pixel value, written as `"#rrggbb"` in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u32);

impl Color {
    /// Parse `#rrggbb` (the `#` is optional).
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(Color)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("#{:06x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).ok_or_else(|| DeError::custom(format!("invalid colour: {:?}", s)))
    }
}

fn ratio_in_range<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let ratio = f64::deserialize(deserializer)?;
    if ratio > MIN_MASTER_RATIO && ratio < MAX_MASTER_RATIO {
        Ok(ratio)
    } else {
        Err(DeError::custom(format!(
            "master_ratio {} outside ({}, {})",
            ratio, MIN_MASTER_RATIO, MAX_MASTER_RATIO
        )))
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// The settings every workspace starts from.
    pub fn workspace_defaults(&self) -> WorkspaceDefaults {
        WorkspaceDefaults {
            layout: self.layout,
            master_ratio: self.master_ratio,
            bar_height: self.bar.height,
            gap: self.gap,
        }
    }

    /// The first rule matching `class`.
    pub fn rule_for(&self, class: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.class == class)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let json = r##"{
            "workspaces": 9,
            "default_workspace": 2,
            "layout": "vstack",
            "master_ratio": 0.5,
            "gap": 6,
            "op_gap_size": 2,
            "zoom_gap": false,
            "border": { "width": 1, "focus": "#ff8800", "urgent": "00ff00" },
            "bar": { "height": 16, "bottom": true },
            "register": { "capacity": 3, "merge_consecutive": true },
            "scratchpad": { "width": 800 },
            "socket_path": "/tmp/x.sock",
            "rules": [ { "class": "mpv", "workspace": 3, "floating": true } ]
        }"##;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.workspaces, 9);
        assert_eq!(cfg.default_workspace, 2);
        assert_eq!(cfg.layout, LayoutKind::VStack);
        assert_eq!(cfg.master_ratio, 0.5);
        assert_eq!(cfg.gap, 6);
        assert!(!cfg.zoom_gap);
        assert_eq!(cfg.border.width, 1);
        assert_eq!(cfg.border.focus, Color(0xff8800));
        assert_eq!(cfg.border.urgent, Color(0x00ff00));
        assert_eq!(cfg.border.unfocus, BorderConfig::default().unfocus);
        assert_eq!(cfg.bar.height, 16);
        assert!(cfg.bar.bottom);
        assert_eq!(cfg.register.capacity, 3);
        assert!(cfg.register.merge_consecutive);
        assert_eq!(cfg.scratchpad.width, 800);
        assert_eq!(cfg.scratchpad.height, 500);
        assert_eq!(cfg.socket_path.as_deref(), Some(Path::new("/tmp/x.sock")));
        let rule = cfg.rule_for("mpv").unwrap();
        assert_eq!(rule.workspace, 3);
        assert!(rule.floating);
        assert!(!rule.follow);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        let d = Config::default();
        assert_eq!(cfg.workspaces, d.workspaces);
        assert_eq!(cfg.layout, d.layout);
        assert_eq!(cfg.master_ratio, d.master_ratio);
        assert_eq!(cfg.bar.height, d.bar.height);
        assert_eq!(cfg.register.capacity, d.register.capacity);
        assert!(cfg.rules.is_empty());
        assert!(cfg.socket_path.is_none());
    }

    #[test]
    fn invalid_colour_is_rejected() {
        let json = r##"{ "border": { "focus": "#12" } }"##;
        assert!(serde_json::from_str::<Config>(json).is_err());
        let json = r##"{ "border": { "focus": "#gggggg" } }"##;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn master_ratio_outside_bounds_is_rejected() {
        for json in [r#"{ "master_ratio": 1.5 }"#, r#"{ "master_ratio": 1.0 }"#, r#"{ "master_ratio": 0.1 }"#] {
            let err = serde_json::from_str::<Config>(json).unwrap_err();
            assert!(err.to_string().contains("master_ratio"), "{err}");
        }
        let cfg: Config = serde_json::from_str(r#"{ "master_ratio": 0.75 }"#).unwrap();
        assert_eq!(cfg.master_ratio, 0.75);
    }

    #[test]
    fn load_rejects_out_of_range_ratio() {
        let path = std::env::temp_dir().join(format!("opwm-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "master_ratio": 1.5 }"#).unwrap();
        let err = Config::load(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(err.to_string().contains("failed to parse"), "{err}");
    }

    #[test]
    fn unknown_keys_ignored() {
        let json = r#"{ "future_section": { "key": 42 }, "gap": 1 }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.gap, 1);
    }

    #[test]
    fn colour_round_trips_through_text() {
        let json = serde_json::to_string(&Color(0x70898f)).unwrap();
        assert_eq!(json, r##""#70898f""##);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/opwm/config.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
