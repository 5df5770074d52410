use std::{collections::BTreeMap, fmt, sync::Arc};

use log::{debug, trace};
use ndarray::Array1;
use num_traits::ToPrimitive;
use paste::paste;

use crate::{
    colormap::{ColorScale, Colormap},
    components::{
        BackgroundColor, Camera, Canvas, Coloring, Component, ComponentKind, Components, Control,
        ControlValue, DimensionExplorer, TimeStepper, VerticalExaggeration,
    },
    config::{ViewConfig, ViewerConfig},
    dataset::{Dataset, Variable},
    errors::{Error, Result},
    surface::RenderSurface,
    view::DatasetView,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerKind {
    /// Time and dimension navigation only, nothing is rendered
    Explorer,

    /// Navigation plus a 3D render surface and its display properties
    TopoViz3d,
}

/// Which range `rescale_color_range` uses.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rescale {
    /// Range of the whole color variable
    Full,

    /// Range of the color variable at the current extra dimension positions and timestep
    CurrentStep,
}

/// Render callbacks owed to the surface at the end of the current batch.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Pending {
    geometry: bool,
    slice: bool,
    color_range: bool,
    color_var: bool,
    colormap: bool,
    color_scale: bool,
    warp_factor: bool,
    background_color: bool,
    camera: bool,
}

impl Pending {
    fn all() -> Self {
        Self {
            geometry: true,
            slice: true,
            color_range: true,
            color_var: true,
            colormap: true,
            color_scale: true,
            warp_factor: true,
            background_color: true,
            camera: true,
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Drives a dataset view from UI events and pushes the result to a render surface.
///
/// Every mutator validates its input through the dataset view or a component, so a rejected value
/// leaves the viewer unchanged. Mutations are grouped in batches: render callbacks are only issued
/// when the outermost batch ends, at most once each, and reflect the final state. A mutator called
/// outside of any batch is a batch of its own.
///
pub struct Viewer {
    kind: ViewerKind,
    config: ViewerConfig,
    view: Option<DatasetView>,
    components: Components,
    surface: Option<Box<dyn RenderSurface>>,
    batch_depth: usize,
    pending: Pending,
}

impl fmt::Debug for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("kind", &self.kind)
            .field("loaded", &self.is_loaded())
            .field("components", &self.components.kinds())
            .finish()
    }
}

macro_rules! RequireComponents {
    ($($name:ident: $kind:ident($type:ident)),* $(,)?) => {
        paste! {
            impl Viewer {
                $(
                    fn [<require_ $name>](&self) -> Result<&$type> {
                        self.view()?;
                        self.components
                            .$name()
                            .ok_or(Error::MissingComponent(ComponentKind::$kind.name()))
                    }

                    fn [<require_ $name _mut>](&mut self) -> Result<&mut $type> {
                        self.view()?;
                        self.components
                            .[<$name _mut>]()
                            .ok_or(Error::MissingComponent(ComponentKind::$kind.name()))
                    }
                )*
            }
        }
    };
}

RequireComponents! {
    time_stepper: TimeStepper(TimeStepper),
    coloring: Coloring(Coloring),
    vertical_exaggeration: VerticalExaggeration(VerticalExaggeration),
    background_color: BackgroundColor(BackgroundColor),
    canvas: Canvas(Canvas),
}

impl Viewer {
    /// A viewer with time and dimension navigation only.
    ///
    pub fn explorer(config: ViewerConfig) -> Self {
        Self::new(ViewerKind::Explorer, config, None)
    }

    /// A 3D viewer pushing to `surface`.
    ///
    pub fn topoviz3d<S>(config: ViewerConfig, surface: S) -> Self
    where
        S: RenderSurface + 'static,
    {
        Self::new(ViewerKind::TopoViz3d, config, Some(Box::new(surface)))
    }

    fn new(
        kind: ViewerKind,
        config: ViewerConfig,
        surface: Option<Box<dyn RenderSurface>>,
    ) -> Self {
        Self {
            kind,
            config,
            view: None,
            components: Components::default(),
            surface,
            batch_depth: 0,
            pending: Pending::default(),
        }
    }

    pub fn kind(&self) -> ViewerKind {
        self.kind
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.view.is_some()
    }

    /// Load a dataset with the dimension roles of the viewer configuration.
    ///
    /// The dataset is shared, not copied: cursors live in the viewer, so several viewers can load
    /// the same dataset and navigate it independently.
    ///
    /// View and components are built before anything is replaced. On error the viewer keeps its
    /// previous dataset and state.
    ///
    pub fn load_dataset(&mut self, dataset: Arc<Dataset>) -> Result<()> {
        let roles = self.config.view.clone();
        self.load_dataset_with(dataset, roles)
    }

    /// Load a dataset with other dimension roles. The roles are kept for later loads if loading
    /// succeeds.
    ///
    pub fn load_dataset_with(&mut self, dataset: Arc<Dataset>, roles: ViewConfig) -> Result<()> {
        let view = DatasetView::with_config(dataset, roles.clone())?;
        let components = self.build_components(&view)?;

        debug!(
            "{:?} viewer loaded '{}', components {:?}",
            self.kind,
            roles.elevation_var,
            components.kinds()
        );
        self.config.view = roles;
        self.view = Some(view);
        self.components = components;

        self.batch(|viewer| {
            viewer.pending = Pending::all();
            Ok(())
        })
    }

    fn build_components(&self, view: &DatasetView) -> Result<Components> {
        let mut components = vec![];

        let nsteps = view.nsteps()?;
        if nsteps > 0 {
            components.push(Component::TimeStepper(TimeStepper::new(
                nsteps,
                self.config.play_speed,
            )?));
        }
        components.push(Component::Dimensions(DimensionExplorer::new(
            view.extra_dims()?,
            view.extra_dims_names()?,
        )));

        if self.kind == ViewerKind::TopoViz3d {
            components.push(Component::Coloring(Coloring::new(
                view.data_vars()?.to_vec(),
                self.config.colormaps.clone(),
                self.config.default_colormap,
                value_range(view.elevation()?),
            )?));
            components.push(Component::VerticalExaggeration(VerticalExaggeration::new(
                self.config.vertical_exaggeration,
            )?));
            components.push(Component::BackgroundColor(BackgroundColor::new(
                &self.config.background_color,
            )?));
            components.push(Component::Canvas(Canvas::new(view.to_unstructured_mesh()?)));
        }

        Ok(Components::new(components))
    }

    /// The dataset view, once a dataset is loaded.
    ///
    pub fn view(&self) -> Result<&DatasetView> {
        self.view.as_ref().ok_or(Error::NotInitialized)
    }

    fn view_mut(&mut self) -> Result<&mut DatasetView> {
        self.view.as_mut().ok_or(Error::NotInitialized)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.view.as_ref().map(DatasetView::dataset)
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Linkable controls of all components, in component order.
    ///
    pub fn linkable_controls(&self) -> Vec<Control> {
        self.components
            .iter()
            .flat_map(Component::linkable_controls)
            .collect()
    }

    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close a batch. Closing the outermost batch issues the pending render callbacks.
    ///
    pub fn end_batch(&mut self) -> Result<()> {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.flush()?;
        }

        Ok(())
    }

    /// Run `f` inside a batch.
    ///
    /// The batch is closed even if `f` fails, so that changes made before the failure are
    /// rendered.
    ///
    pub fn batch<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin_batch();
        let result = f(self);
        self.end_batch()?;

        result
    }

    fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let Some(view) = self.view.as_mut() else {
            return Ok(());
        };
        view.refresh()?;

        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        if pending.is_empty() {
            return Ok(());
        }
        trace!("render push {pending:?}");

        let components = &self.components;
        if pending.geometry {
            if let Some(canvas) = components.canvas() {
                let mesh = canvas.mesh();
                surface.on_geometry_ready(mesh.vertices.view(), mesh.triangles.view());
            }
        }
        if pending.slice {
            let (elevation, color) = slice_values(view)?;
            surface.on_slice_changed(elevation.view(), color.view());
        }
        if let Some(coloring) = components.coloring() {
            if pending.color_range {
                let (min, max) = coloring.limits();
                surface.on_color_range(min, max);
            }
            if pending.color_var {
                surface.on_color_var_changed(view.color_var()?);
            }
            if pending.colormap {
                surface.on_colormap(coloring.colormap());
            }
            if pending.color_scale {
                surface.on_color_scale(coloring.scale());
            }
        }
        if pending.warp_factor {
            if let Some(exaggeration) = components.vertical_exaggeration() {
                surface.on_warp_factor(exaggeration.factor());
            }
        }
        if pending.background_color {
            if let Some(background) = components.background_color() {
                surface.on_background_color(background.color());
            }
        }
        if pending.camera {
            if let Some(canvas) = components.canvas() {
                surface.on_camera(canvas.camera());
            }
        }

        Ok(())
    }

    pub fn timestep(&self) -> Result<usize> {
        self.view()?.timestep()
    }

    /// Current step and time, eg `"1 / 100"`.
    ///
    pub fn time_label(&self) -> Result<String> {
        self.view()?.current_time_label()
    }

    pub fn go_to_step(&mut self, step: usize) -> Result<()> {
        self.batch(|viewer| {
            viewer.view_mut()?.set_timestep(step)?;
            viewer.pending.slice = true;

            Ok(())
        })
    }

    /// Go to the step closest to `time`.
    ///
    pub fn go_to_time<T: ToPrimitive>(&mut self, time: T) -> Result<()> {
        let step = self.view()?.time_to_step(time)?;
        self.go_to_step(step)
    }

    pub fn set_play_speed(&mut self, speed: u32) -> Result<()> {
        self.require_time_stepper_mut()?.set_play_speed(speed)
    }

    /// Delay between two frames when playing, in milliseconds.
    ///
    pub fn play_interval(&self) -> Result<u32> {
        Ok(self.require_time_stepper()?.interval())
    }

    pub fn extra_dims_positions(&self) -> Result<&BTreeMap<String, usize>> {
        self.view()?.extra_dims_positions()
    }

    /// Labels shown beside each dimension slider.
    ///
    pub fn extra_dims_labels(&self) -> Result<BTreeMap<String, Vec<String>>> {
        self.view()?.extra_dims_labels()
    }

    pub fn set_extra_dim_positions<I, S>(&mut self, positions: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        self.batch(|viewer| {
            viewer.view_mut()?.set_extra_dim_positions(positions)?;
            viewer.pending.slice = true;

            Ok(())
        })
    }

    pub fn color_var(&self) -> Result<&str> {
        self.view()?.color_var()
    }

    /// Color by another variable.
    ///
    /// With a coloring component, the color scale is reset to linear and the color limits to the
    /// full range of the new variable. All of it is rendered in one push.
    ///
    pub fn set_color_var(&mut self, name: &str) -> Result<()> {
        self.batch(|viewer| {
            let view = viewer.view_mut()?;
            view.set_color_var(name)?;
            let (min, max) = value_range(view.color()?);

            viewer.pending.slice = true;
            viewer.pending.color_var = true;
            if let Some(coloring) = viewer.components.coloring_mut() {
                coloring.set_scale(ColorScale::Linear);
                coloring.set_limits(min, max)?;
                viewer.pending.color_scale = true;
                viewer.pending.color_range = true;
            }

            Ok(())
        })
    }

    pub fn color_limits(&self) -> Result<(f64, f64)> {
        Ok(self.require_coloring()?.limits())
    }

    pub fn set_color_limits(&mut self, min: f64, max: f64) -> Result<()> {
        self.batch(|viewer| {
            viewer.require_coloring_mut()?.set_limits(min, max)?;
            viewer.pending.color_range = true;

            Ok(())
        })
    }

    /// Reset color limits to the range of the color variable.
    ///
    pub fn rescale_color_range(&mut self, rescale: Rescale) -> Result<()> {
        self.batch(|viewer| {
            viewer.require_coloring()?;
            let view = viewer.view_mut()?;
            let (min, max) = match rescale {
                Rescale::Full => value_range(view.color()?),
                Rescale::CurrentStep => value_range(view.current_color()?),
            };
            debug!("rescale color range ({rescale:?}) to [{min}, {max}]");

            viewer.require_coloring_mut()?.set_limits(min, max)?;
            viewer.pending.color_range = true;

            Ok(())
        })
    }

    pub fn colormap(&self) -> Result<Colormap> {
        Ok(self.require_coloring()?.colormap())
    }

    pub fn set_colormap(&mut self, colormap: Colormap) -> Result<()> {
        self.batch(|viewer| {
            viewer.require_coloring_mut()?.set_colormap(colormap)?;
            viewer.pending.colormap = true;

            Ok(())
        })
    }

    pub fn color_scale(&self) -> Result<ColorScale> {
        Ok(self.require_coloring()?.scale())
    }

    pub fn set_color_scale(&mut self, scale: ColorScale) -> Result<()> {
        self.batch(|viewer| {
            viewer.require_coloring_mut()?.set_scale(scale);
            viewer.pending.color_scale = true;

            Ok(())
        })
    }

    pub fn vertical_exaggeration(&self) -> Result<f64> {
        Ok(self.require_vertical_exaggeration()?.factor())
    }

    pub fn set_vertical_exaggeration(&mut self, factor: f64) -> Result<()> {
        self.batch(|viewer| {
            viewer.require_vertical_exaggeration_mut()?.set_factor(factor)?;
            viewer.pending.warp_factor = true;

            Ok(())
        })
    }

    pub fn background_color(&self) -> Result<&str> {
        Ok(self.require_background_color()?.color())
    }

    pub fn set_background_color(&mut self, color: &str) -> Result<()> {
        self.batch(|viewer| {
            viewer.require_background_color_mut()?.set_color(color)?;
            viewer.pending.background_color = true;

            Ok(())
        })
    }

    pub fn set_camera(&mut self, camera: Camera) -> Result<()> {
        self.batch(|viewer| {
            viewer.require_canvas_mut()?.set_camera(camera);
            viewer.pending.camera = true;

            Ok(())
        })
    }

    /// Current value of a linkable control.
    ///
    pub fn control_value(&self, control: &Control) -> Result<ControlValue> {
        let view = self.view()?;
        match control {
            Control::Timestep => {
                self.require_time_stepper()?;
                Ok(ControlValue::Index(view.timestep()?))
            }
            Control::PlaySpeed => Ok(ControlValue::Speed(
                self.require_time_stepper()?.play_speed(),
            )),
            Control::ExtraDim(dim) => view
                .extra_dims_positions()?
                .get(dim)
                .map(|&position| ControlValue::Index(position))
                .ok_or_else(|| Error::InvalidDimension(vec![dim.clone()])),
            Control::VerticalExaggeration => Ok(ControlValue::Factor(
                self.require_vertical_exaggeration()?.factor(),
            )),
            Control::Camera => Ok(ControlValue::Camera(
                self.require_canvas()?.camera().clone(),
            )),
        }
    }

    /// Set a linkable control, going through the same validation as the dedicated mutators.
    ///
    pub fn set_control(&mut self, control: &Control, value: ControlValue) -> Result<()> {
        match (control, value) {
            (Control::Timestep, ControlValue::Index(step)) => self.go_to_step(step),
            (Control::PlaySpeed, ControlValue::Speed(speed)) => self.set_play_speed(speed),
            (Control::ExtraDim(dim), ControlValue::Index(position)) => {
                self.set_extra_dim_positions([(dim.clone(), position)])
            }
            (Control::VerticalExaggeration, ControlValue::Factor(factor)) => {
                self.set_vertical_exaggeration(factor)
            }
            (Control::Camera, ControlValue::Camera(camera)) => self.set_camera(camera),
            (control, value) => Err(Error::invalid_control(control, value)),
        }
    }
}

/// Range of the finite values of a variable, for color mapping. A variable with no finite value
/// maps to `(0, 0)`.
///
fn value_range(var: &Variable) -> (f64, f64) {
    var.data()
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(None, |range, value| match range {
            Some((min, max)) => Some((f64::min(min, value), f64::max(max, value))),
            None => Some((value, value)),
        })
        .unwrap_or((0.0, 0.0))
}

/// Elevation and color of the current slice, one value per mesh vertex.
///
fn slice_values(view: &mut DatasetView) -> Result<(Array1<f64>, Array1<f64>)> {
    let config = view.config()?;
    let (y_dim, x_dim) = (config.y_dim.clone(), config.x_dim.clone());

    let elevation = view.current_elevation()?.to_vertex_values(&y_dim, &x_dim)?;
    let color = view.current_color()?.to_vertex_values(&y_dim, &x_dim)?;

    Ok((elevation, color))
}
