use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use tinyjson::JsonValue;

use crate::error::ConfigError;
use crate::renderer::RenderMode;

pub const CONFIG_ENV: &str = "MAPFORGE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "mapforge.json";

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Materials are read from `<game_dir>/materials`.
    pub game_dir: Option<PathBuf>,
    /// Degrees turned per 100 pixels of mouse drag.
    pub camera_sensitivity: f32,
    /// Units moved per frame while a movement key is held.
    pub camera_move_speed: f32,
    pub field_of_view: f32,
    pub preload_workers: usize,
    pub preload_channel_capacity: usize,
    pub preload_drain_per_frame: usize,
    pub texture_uploads_per_frame: usize,
    pub render_mode: RenderMode,
    /// A JSON document to open instead of the sample room.
    pub document: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> EditorConfig {
        EditorConfig {
            window_width: 948,
            window_height: 533,
            game_dir: None,
            camera_sensitivity: 4.0,
            camera_move_speed: 4.0,
            field_of_view: 70.0,
            preload_workers: 8,
            preload_channel_capacity: 1000,
            preload_drain_per_frame: 100,
            texture_uploads_per_frame: 16,
            render_mode: RenderMode::Textured,
            document: None,
        }
    }
}

impl EditorConfig {
    /// Loads the file named by `MAPFORGE_CONFIG`, or `mapforge.json`. A
    /// missing file gives the defaults.
    pub fn load() -> Result<EditorConfig, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        EditorConfig::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<EditorConfig, ConfigError> {
        match fs::read_to_string(path) {
            Ok(source) => {
                info!("Loading config from {}", path.display());
                EditorConfig::from_json(&source)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(EditorConfig::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parses a config from JSON. Missing keys keep their defaults and
    /// unknown keys are ignored.
    pub fn from_json(source: &str) -> Result<EditorConfig, ConfigError> {
        let root: JsonValue = source
            .parse()
            .map_err(|err: tinyjson::JsonParseError| ConfigError::Parse(err.to_string()))?;
        let root: &HashMap<String, JsonValue> = root
            .get()
            .ok_or_else(|| ConfigError::Parse("expected an object".to_string()))?;

        let mut config = EditorConfig::default();
        let fields = Fields(root);
        if let Some(width) = fields.count("window_width", 1)? {
            config.window_width = width as u32;
        }
        if let Some(height) = fields.count("window_height", 1)? {
            config.window_height = height as u32;
        }
        config.game_dir = fields.string("game_dir")?.map(PathBuf::from).or(config.game_dir);
        if let Some(sensitivity) = fields.number("camera_sensitivity")? {
            config.camera_sensitivity = sensitivity;
        }
        if let Some(speed) = fields.number("camera_move_speed")? {
            config.camera_move_speed = speed;
        }
        if let Some(fov) = fields.number("field_of_view")? {
            config.field_of_view = fov;
        }
        if let Some(workers) = fields.count("preload_workers", 1)? {
            config.preload_workers = workers;
        }
        if let Some(capacity) = fields.count("preload_channel_capacity", 1)? {
            config.preload_channel_capacity = capacity;
        }
        if let Some(drain) = fields.count("preload_drain_per_frame", 1)? {
            config.preload_drain_per_frame = drain;
        }
        if let Some(uploads) = fields.count("texture_uploads_per_frame", 1)? {
            config.texture_uploads_per_frame = uploads;
        }
        if let Some(mode) = fields.string("render_mode")? {
            config.render_mode = mode.parse().map_err(|_| ConfigError::InvalidField {
                field: "render_mode",
                expected: "\"Wireframe\", \"Flat\" or \"Textured\"",
            })?;
        }
        config.document = fields.string("document")?.map(PathBuf::from).or(config.document);
        Ok(config)
    }
}

struct Fields<'a>(&'a HashMap<String, JsonValue>);

impl Fields<'_> {
    fn number(&self, field: &'static str) -> Result<Option<f32>, ConfigError> {
        match self.0.get(field) {
            None => Ok(None),
            Some(value) => value
                .get::<f64>()
                .map(|n| Some(*n as f32))
                .ok_or(ConfigError::InvalidField {
                    field,
                    expected: "a number",
                }),
        }
    }

    fn count(&self, field: &'static str, min: usize) -> Result<Option<usize>, ConfigError> {
        let invalid = ConfigError::InvalidField {
            field,
            expected: "a positive integer",
        };
        match self.0.get(field) {
            None => Ok(None),
            Some(value) => match value.get::<f64>() {
                Some(n) if n.fract() == 0.0 && *n >= min as f64 => Ok(Some(*n as usize)),
                _ => Err(invalid),
            },
        }
    }

    fn string(&self, field: &'static str) -> Result<Option<&str>, ConfigError> {
        match self.0.get(field) {
            None => Ok(None),
            Some(value) => value
                .get::<String>()
                .map(|s| Some(s.as_str()))
                .ok_or(ConfigError::InvalidField {
                    field,
                    expected: "a string",
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(EditorConfig::from_json("{}").unwrap(), EditorConfig::default());
    }

    #[test]
    fn reads_every_field() {
        let config = EditorConfig::from_json(
            r#"{
                "window_width": 1280,
                "window_height": 720,
                "game_dir": "/games/hl2",
                "camera_sensitivity": 2.5,
                "camera_move_speed": 8,
                "field_of_view": 90,
                "preload_workers": 2,
                "preload_channel_capacity": 16,
                "preload_drain_per_frame": 4,
                "texture_uploads_per_frame": 1,
                "render_mode": "wireframe",
                "document": "maps/room.json",
                "unknown": [1, 2, 3]
            }"#,
        )
        .unwrap();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert_eq!(config.game_dir, Some(PathBuf::from("/games/hl2")));
        assert_eq!(config.camera_sensitivity, 2.5);
        assert_eq!(config.camera_move_speed, 8.0);
        assert_eq!(config.field_of_view, 90.0);
        assert_eq!(config.preload_workers, 2);
        assert_eq!(config.preload_channel_capacity, 16);
        assert_eq!(config.preload_drain_per_frame, 4);
        assert_eq!(config.texture_uploads_per_frame, 1);
        assert_eq!(config.render_mode, RenderMode::Wireframe);
        assert_eq!(config.document, Some(PathBuf::from("maps/room.json")));
    }

    #[test]
    fn rejects_wrong_types() {
        let err = EditorConfig::from_json(r#"{ "preload_workers": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "preload_workers",
                ..
            }
        ));
        let err = EditorConfig::from_json(r#"{ "field_of_view": "wide" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "field_of_view", .. }));
        let err = EditorConfig::from_json(r#"{ "render_mode": "shaded" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "render_mode", .. }));
        assert!(matches!(
            EditorConfig::from_json("[1]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("mapforge-no-such-config.json");
        assert_eq!(EditorConfig::load_from(&path).unwrap(), EditorConfig::default());
    }
}
