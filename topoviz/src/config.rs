use serde::{Deserialize, Serialize};

use crate::{colormap::Colormap, errors::Result};

/// Dimension roles of a dataset view.
///
/// `x_dim` and `y_dim` name the spatial coordinates, `elevation_var` the surface height variable
/// and `time_dim`, if any, the coordinate stepped through by the time cursor. Every other
/// dimension of the elevation variable is an extra dimension.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub x_dim: String,
    pub y_dim: String,
    pub elevation_var: String,
    pub time_dim: Option<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            x_dim: "x".to_string(),
            y_dim: "y".to_string(),
            elevation_var: "topography__elevation".to_string(),
            time_dim: None,
        }
    }
}

impl ViewConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_x_dim<S: Into<String>>(mut self, x_dim: S) -> Self {
        self.x_dim = x_dim.into();
        self
    }

    pub fn with_y_dim<S: Into<String>>(mut self, y_dim: S) -> Self {
        self.y_dim = y_dim.into();
        self
    }

    pub fn with_elevation_var<S: Into<String>>(mut self, elevation_var: S) -> Self {
        self.elevation_var = elevation_var.into();
        self
    }

    pub fn with_time_dim<S: Into<String>>(mut self, time_dim: S) -> Self {
        self.time_dim = Some(time_dim.into());
        self
    }
}

/// Everything needed to set up a viewer: dimension roles plus initial display properties.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    #[serde(flatten)]
    pub view: ViewConfig,

    /// Colormaps offered to the user
    pub colormaps: Vec<Colormap>,

    pub default_colormap: Colormap,

    /// Any CSS color
    pub background_color: String,

    pub vertical_exaggeration: f64,

    /// Initial play speed, see `helpers::play_interval`
    pub play_speed: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            colormaps: Colormap::ALL.to_vec(),
            default_colormap: Colormap::default(),
            background_color: "white".to_string(),
            vertical_exaggeration: 1.0,
            play_speed: 30,
        }
    }
}

impl ViewerConfig {
    pub fn new(view: ViewConfig) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    /// Read a configuration from JSON. Missing fields take their default value.
    ///
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::errors::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = ViewConfig::new();
        assert_eq!(config.x_dim, "x");
        assert_eq!(config.y_dim, "y");
        assert_eq!(config.elevation_var, "topography__elevation");
        assert_eq!(config.time_dim, None);

        let config = ViewConfig::new()
            .with_x_dim("lon")
            .with_y_dim("lat")
            .with_elevation_var("h")
            .with_time_dim("t");
        assert_eq!(config.x_dim, "lon");
        assert_eq!(config.y_dim, "lat");
        assert_eq!(config.elevation_var, "h");
        assert_eq!(config.time_dim.as_deref(), Some("t"));
    }

    #[test]
    fn test_from_json() {
        let config = ViewerConfig::from_json(
            r#"{
                "time_dim": "time",
                "colormaps": ["Viridis", "Cividis"],
                "default_colormap": "Cividis",
                "vertical_exaggeration": 2.5
            }"#,
        )
        .unwrap();

        assert_eq!(config.view.time_dim.as_deref(), Some("time"));
        assert_eq!(config.view.x_dim, "x");
        assert_eq!(config.colormaps, vec![Colormap::Viridis, Colormap::Cividis]);
        assert_eq!(config.default_colormap, Colormap::Cividis);
        assert_eq!(config.vertical_exaggeration, 2.5);
        assert_eq!(config.background_color, "white");
        assert_eq!(config.play_speed, 30);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ViewerConfig::new(ViewConfig::new().with_time_dim("time"));
        let json = config.to_json().unwrap();
        assert_eq!(ViewerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_from_json_error() {
        let err = ViewerConfig::from_json(r#"{"default_colormap": "Nope"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
