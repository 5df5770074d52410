use std::collections::BTreeMap;

use paste::paste;
use serde::{Deserialize, Serialize};

use crate::{
    colormap::{ColorScale, Colormap},
    errors::{Error, Result},
    helpers::{play_interval, rearrange},
    mesh::Mesh,
};

pub const MAX_PLAY_SPEED: u32 = 50;
pub const MAX_VERTICAL_EXAGGERATION: f64 = 20.0;

/// Identifies a component within a viewer.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    TimeStepper,
    Dimensions,
    Coloring,
    VerticalExaggeration,
    BackgroundColor,
    Canvas,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 6] = [
        Self::TimeStepper,
        Self::Dimensions,
        Self::Coloring,
        Self::VerticalExaggeration,
        Self::BackgroundColor,
        Self::Canvas,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TimeStepper => "timestepper",
            Self::Dimensions => "dimensions",
            Self::Coloring => "coloring",
            Self::VerticalExaggeration => "vertical_exaggeration",
            Self::BackgroundColor => "background_color",
            Self::Canvas => "canvas",
        }
    }
}

/// A piece of viewer state that can be mirrored across linked viewers.
///
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Control {
    Timestep,
    PlaySpeed,
    ExtraDim(String),
    VerticalExaggeration,
    Camera,
}

impl Control {
    /// The component exposing this control.
    ///
    pub fn component(&self) -> ComponentKind {
        match self {
            Self::Timestep | Self::PlaySpeed => ComponentKind::TimeStepper,
            Self::ExtraDim(_) => ComponentKind::Dimensions,
            Self::VerticalExaggeration => ComponentKind::VerticalExaggeration,
            Self::Camera => ComponentKind::Canvas,
        }
    }
}

/// The value of a [`Control`].
///
#[derive(Clone, Debug, PartialEq)]
pub enum ControlValue {
    /// Timestep or extra dimension position
    Index(usize),
    Speed(u32),
    Factor(f64),
    Camera(Camera),
}

/// Camera state of a 3D canvas.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: [f64; 3],
    pub target: [f64; 3],
    pub up: [f64; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: [1.0, 1.0, 1.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 0.0, 1.0],
        }
    }
}

/// Play controls for the time dimension.
///
/// The current step itself lives in the dataset view; this only holds what the view doesn't know
/// about.
///
#[derive(Clone, Debug, PartialEq)]
pub struct TimeStepper {
    nsteps: usize,
    play_speed: u32,
}

impl TimeStepper {
    pub fn new(nsteps: usize, play_speed: u32) -> Result<Self> {
        let mut stepper = Self {
            nsteps,
            play_speed: 0,
        };
        stepper.set_play_speed(play_speed)?;

        Ok(stepper)
    }

    pub fn nsteps(&self) -> usize {
        self.nsteps
    }

    /// Largest step the slider can reach.
    ///
    pub fn max_step(&self) -> usize {
        self.nsteps.saturating_sub(1)
    }

    pub fn play_speed(&self) -> u32 {
        self.play_speed
    }

    pub fn set_play_speed(&mut self, speed: u32) -> Result<()> {
        if speed > MAX_PLAY_SPEED {
            return Err(Error::ValueOutOfRange {
                name: "play speed",
                value: speed.into(),
                min: 0.0,
                max: MAX_PLAY_SPEED.into(),
            });
        }
        self.play_speed = speed;

        Ok(())
    }

    /// Delay between two frames when playing, in milliseconds.
    ///
    pub fn interval(&self) -> u32 {
        play_interval(self.play_speed, MAX_PLAY_SPEED)
    }

    fn linkable_controls(&self) -> Vec<Control> {
        vec![Control::Timestep, Control::PlaySpeed]
    }
}

/// One slider per extra dimension.
///
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionExplorer {
    sizes: BTreeMap<String, usize>,
    names: BTreeMap<String, Vec<String>>,
}

impl DimensionExplorer {
    pub fn new(sizes: BTreeMap<String, usize>, names: BTreeMap<String, Vec<String>>) -> Self {
        Self { sizes, names }
    }

    pub fn dims(&self) -> impl Iterator<Item = &String> {
        self.sizes.keys()
    }

    /// Largest position the slider of `dim` can reach.
    ///
    pub fn max_position(&self, dim: &str) -> Option<usize> {
        self.sizes.get(dim).map(|size| size.saturating_sub(1))
    }

    /// Index level names shown beside the slider of `dim`.
    ///
    pub fn level_names(&self, dim: &str) -> Option<&[String]> {
        self.names.get(dim).map(Vec::as_slice)
    }

    fn linkable_controls(&self) -> Vec<Control> {
        self.sizes.keys().cloned().map(Control::ExtraDim).collect()
    }
}

/// Color mapping of the 3D canvas.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Coloring {
    color_vars: Vec<String>,
    colormaps: Vec<Colormap>,
    colormap: Colormap,
    min: f64,
    max: f64,
    scale: ColorScale,
}

impl Coloring {
    /// `colormap` must be one of `colormaps`.
    ///
    pub fn new(
        color_vars: Vec<String>,
        colormaps: Vec<Colormap>,
        colormap: Colormap,
        (min, max): (f64, f64),
    ) -> Result<Self> {
        let mut coloring = Self {
            color_vars,
            colormaps,
            colormap,
            min: 0.0,
            max: 0.0,
            scale: ColorScale::Linear,
        };
        coloring.set_colormap(colormap)?;
        coloring.set_limits(min, max)?;

        Ok(coloring)
    }

    pub fn color_vars(&self) -> &[String] {
        &self.color_vars
    }

    pub fn colormaps(&self) -> &[Colormap] {
        &self.colormaps
    }

    pub fn colormap(&self) -> Colormap {
        self.colormap
    }

    pub fn set_colormap(&mut self, colormap: Colormap) -> Result<()> {
        if !self.colormaps.contains(&colormap) {
            return Err(Error::InvalidColormap(colormap.to_string()));
        }
        self.colormap = colormap;

        Ok(())
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Limits are reordered if given upside down. Both must be finite.
    ///
    pub fn set_limits(&mut self, min: f64, max: f64) -> Result<()> {
        for value in [min, max] {
            if !value.is_finite() {
                return Err(Error::ValueOutOfRange {
                    name: "color limit",
                    value,
                    min: f64::MIN,
                    max: f64::MAX,
                });
            }
        }
        (self.min, self.max) = rearrange(min, max);

        Ok(())
    }

    pub fn scale(&self) -> ColorScale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: ColorScale) {
        self.scale = scale;
    }
}

/// Warp factor applied to the elevation.
///
#[derive(Clone, Debug, PartialEq)]
pub struct VerticalExaggeration {
    factor: f64,
}

impl VerticalExaggeration {
    pub fn new(factor: f64) -> Result<Self> {
        let mut exaggeration = Self { factor: 1.0 };
        exaggeration.set_factor(factor)?;

        Ok(exaggeration)
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f64) -> Result<()> {
        if !(0.0..=MAX_VERTICAL_EXAGGERATION).contains(&factor) {
            return Err(Error::ValueOutOfRange {
                name: "vertical exaggeration",
                value: factor,
                min: 0.0,
                max: MAX_VERTICAL_EXAGGERATION,
            });
        }
        self.factor = factor;

        Ok(())
    }

    fn linkable_controls(&self) -> Vec<Control> {
        vec![Control::VerticalExaggeration]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundColor {
    color: String,
}

impl BackgroundColor {
    pub fn new(color: &str) -> Result<Self> {
        let mut background = Self {
            color: String::new(),
        };
        background.set_color(color)?;

        Ok(background)
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    /// Any CSS color: a name, a hex code, `rgb(..)`, `hsl(..)`...
    ///
    pub fn set_color(&mut self, color: &str) -> Result<()> {
        color
            .parse::<css_color_parser::Color>()
            .map_err(|_| Error::InvalidColor(color.to_string()))?;
        self.color = color.to_string();

        Ok(())
    }
}

/// The 3D scene: mesh and camera.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    mesh: Mesh,
    camera: Camera,
}

impl Canvas {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            camera: Camera::default(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    fn linkable_controls(&self) -> Vec<Control> {
        vec![Control::Camera]
    }
}

/// A viewer component.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Component {
    TimeStepper(TimeStepper),
    Dimensions(DimensionExplorer),
    Coloring(Coloring),
    VerticalExaggeration(VerticalExaggeration),
    BackgroundColor(BackgroundColor),
    Canvas(Canvas),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::TimeStepper(_) => ComponentKind::TimeStepper,
            Self::Dimensions(_) => ComponentKind::Dimensions,
            Self::Coloring(_) => ComponentKind::Coloring,
            Self::VerticalExaggeration(_) => ComponentKind::VerticalExaggeration,
            Self::BackgroundColor(_) => ComponentKind::BackgroundColor,
            Self::Canvas(_) => ComponentKind::Canvas,
        }
    }

    /// Controls that can be linked to the same controls of another viewer, in a fixed order.
    ///
    pub fn linkable_controls(&self) -> Vec<Control> {
        match self {
            Self::TimeStepper(stepper) => stepper.linkable_controls(),
            Self::Dimensions(explorer) => explorer.linkable_controls(),
            Self::VerticalExaggeration(exaggeration) => exaggeration.linkable_controls(),
            Self::Canvas(canvas) => canvas.linkable_controls(),
            Self::Coloring(_) | Self::BackgroundColor(_) => vec![],
        }
    }
}

/// The components of a viewer, in display order.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Components(Vec<Component>);

macro_rules! Accessors {
    ($($name:ident: $variant:ident($type:ident)),* $(,)?) => {
        impl Components {
            $(
                pub fn $name(&self) -> Option<&$type> {
                    self.0.iter().find_map(|component| match component {
                        Component::$variant(inner) => Some(inner),
                        _ => None,
                    })
                }
            )*
        }
    };
}

// Dimension positions are stored in the dataset view, not in the explorer
macro_rules! MutAccessors {
    ($($name:ident: $variant:ident($type:ident)),* $(,)?) => {
        paste! {
            impl Components {
                $(
                    pub(crate) fn [<$name _mut>](&mut self) -> Option<&mut $type> {
                        self.0.iter_mut().find_map(|component| match component {
                            Component::$variant(inner) => Some(inner),
                            _ => None,
                        })
                    }
                )*
            }
        }
    };
}

Accessors! {
    time_stepper: TimeStepper(TimeStepper),
    dimensions: Dimensions(DimensionExplorer),
    coloring: Coloring(Coloring),
    vertical_exaggeration: VerticalExaggeration(VerticalExaggeration),
    background_color: BackgroundColor(BackgroundColor),
    canvas: Canvas(Canvas),
}

MutAccessors! {
    time_stepper: TimeStepper(TimeStepper),
    coloring: Coloring(Coloring),
    vertical_exaggeration: VerticalExaggeration(VerticalExaggeration),
    background_color: BackgroundColor(BackgroundColor),
    canvas: Canvas(Canvas),
}

impl Components {
    pub(crate) fn new(components: Vec<Component>) -> Self {
        Self(components)
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&Component> {
        self.0.iter().find(|component| component.kind() == kind)
    }

    pub fn contains(&self, kind: ComponentKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn kinds(&self) -> Vec<ComponentKind> {
        self.0.iter().map(Component::kind).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Linkable controls of the component of the given kind, empty if there is no such component.
    ///
    pub fn linkable_controls(&self, kind: ComponentKind) -> Vec<Control> {
        self.get(kind)
            .map(Component::linkable_controls)
            .unwrap_or_default()
    }
}
