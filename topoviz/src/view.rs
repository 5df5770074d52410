use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use log::{debug, trace};
use num_traits::ToPrimitive;

use crate::{
    cached::Cached,
    config::ViewConfig,
    dataset::{Coordinate, Dataset, Variable},
    errors::{Error, Result},
    mesh::{self, Mesh},
};

/// A cursor based view over a dataset.
///
/// The view owns three cursors: a position along each extra dimension, a timestep along the time
/// dimension, and the variable used for coloring. It derives from them the "current slice" of the
/// dataset, which is cached and only recomputed when read after a cursor has moved.
///
/// The dataset itself is shared and never modified. Several views can wrap the same dataset
/// without sharing any cursor state.
///
/// A new view is uninitialized. Every cursor operation fails with `Error::NotInitialized` until
/// `initialize` has assigned dimension roles.
///
pub struct DatasetView {
    dataset: Arc<Dataset>,
    state: Option<ViewState>,
}

/// Role assignment, cursors and caches of an initialized view.
///
/// Cache invalidation edges, the only place these caches are cleared:
///
/// | cursor write         | `view` | `view_step` |
/// |----------------------|--------|-------------|
/// | `set_timestep`       | kept   | stale       |
/// | `set_extra_dim_positions` | stale | stale  |
/// | `set_color_var`      | kept   | kept        |
/// | `initialize`         | stale  | stale       |
///
/// `current_elevation` and `current_color` are projections of `view_step` and are not cached on
/// their own.
///
struct ViewState {
    config: ViewConfig,

    /// Variables with exactly the same dimensions as the elevation variable
    data_vars: Vec<String>,

    nsteps: usize,

    timestep: usize,

    /// Current position along every extra dimension
    extra_dims: BTreeMap<String, usize>,

    color_var: String,

    /// The dataset at the current extra dimension positions
    view: Cached<Arc<Dataset>>,

    /// `view` at the current timestep
    view_step: Cached<Arc<Dataset>>,
}

impl DatasetView {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            state: None,
        }
    }

    /// Wrap `dataset` and initialize the view in one go.
    ///
    pub fn with_config(dataset: Arc<Dataset>, config: ViewConfig) -> Result<Self> {
        let mut view = Self::new(dataset);
        view.initialize(config)?;

        Ok(view)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Assign dimension roles and reset every cursor.
    ///
    /// Fails if the elevation variable is missing, if a declared coordinate is missing, or if a
    /// declared dimension is not a dimension of the elevation variable. On failure the view is
    /// left exactly as it was, whether or not it had been initialized before.
    ///
    pub fn initialize(&mut self, config: ViewConfig) -> Result<()> {
        let state = ViewState::new(&self.dataset, config)?;
        debug!(
            "initialized view on '{}': extra dims {:?}, {} step(s)",
            state.config.elevation_var,
            state.extra_dims.keys().collect::<Vec<_>>(),
            state.nsteps
        );
        self.state = Some(state);

        Ok(())
    }

    pub fn config(&self) -> Result<&ViewConfig> {
        Ok(&self.state()?.config)
    }

    /// Names of the variables that can be used for coloring.
    ///
    pub fn data_vars(&self) -> Result<&[String]> {
        Ok(&self.state()?.data_vars)
    }

    /// Number of timesteps, 0 if there is no time dimension.
    ///
    pub fn nsteps(&self) -> Result<usize> {
        Ok(self.state()?.nsteps)
    }

    pub fn timestep(&self) -> Result<usize> {
        Ok(self.state()?.timestep)
    }

    /// Move the time cursor. `step` must be in `[0, nsteps)`.
    ///
    pub fn set_timestep(&mut self, step: usize) -> Result<()> {
        let state = self.state_mut()?;
        if step >= state.nsteps {
            return Err(Error::StepOutOfRange {
                step,
                nsteps: state.nsteps,
            });
        }

        debug!("timestep {} -> {step}", state.timestep);
        state.timestep = step;
        state.view_step.invalidate();

        Ok(())
    }

    /// The current timestep and its time coordinate value, eg `"1 / 100"`.
    ///
    pub fn current_time_label(&self) -> Result<String> {
        let state = self.state()?;
        let time_dim = state.config.time_dim.as_ref().ok_or(Error::NoTimeDimension)?;
        let labels = self
            .dataset
            .coord(time_dim)
            .and_then(|coord| coord.label_at(state.timestep))
            .ok_or_else(|| Error::MissingCoordinate(time_dim.clone()))?;
        let value = labels
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("{} / {value}", state.timestep))
    }

    /// Find the step whose time coordinate is closest to `time`.
    ///
    /// On an exact tie between two steps, the lower step wins. Fails with `NoNearestStep` if the
    /// time axis is empty or `time` is NaN.
    ///
    pub fn time_to_step<T: ToPrimitive>(&self, time: T) -> Result<usize> {
        let state = self.state()?;
        let time_dim = state.config.time_dim.as_ref().ok_or(Error::NoTimeDimension)?;
        let labels = self
            .dataset
            .coord(time_dim)
            .and_then(Coordinate::labels)
            .ok_or_else(|| Error::MissingCoordinate(time_dim.clone()))?;

        if !labels.is_numeric() {
            return Err(Error::NonNumericCoordinate(time_dim.clone()));
        }

        labels
            .nearest(time)
            .ok_or_else(|| Error::NoNearestStep(time_dim.clone()))
    }

    /// Size of every extra dimension.
    ///
    pub fn extra_dims(&self) -> Result<BTreeMap<String, usize>> {
        let state = self.state()?;
        let elevation = self.elevation()?;

        Ok(state
            .extra_dims
            .keys()
            .filter_map(|dim| Some((dim.clone(), elevation.size_of(dim)?)))
            .collect())
    }

    /// Current position along every extra dimension.
    ///
    pub fn extra_dims_positions(&self) -> Result<&BTreeMap<String, usize>> {
        Ok(&self.state()?.extra_dims)
    }

    /// Move the cursors of some extra dimensions. Dimensions not given keep their position.
    ///
    /// All or nothing: if any dimension is unknown or any position is out of range, no cursor
    /// moves.
    ///
    pub fn set_extra_dim_positions<I, S>(&mut self, positions: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let positions: BTreeMap<String, usize> = positions
            .into_iter()
            .map(|(dim, position)| (dim.into(), position))
            .collect();
        let sizes = self.extra_dims()?;

        let invalid: Vec<String> = positions
            .keys()
            .filter(|dim| !sizes.contains_key(*dim))
            .cloned()
            .collect();
        if !invalid.is_empty() {
            return Err(Error::InvalidDimension(invalid));
        }
        for (dim, &position) in &positions {
            let size = sizes[dim];
            if position >= size {
                return Err(Error::PositionOutOfRange {
                    dim: dim.clone(),
                    position,
                    size,
                });
            }
        }

        let state = self.state_mut()?;
        debug!("extra dims {:?} -> {positions:?}", state.extra_dims);
        state.extra_dims.extend(positions);
        state.view.invalidate();
        state.view_step.invalidate();

        Ok(())
    }

    /// Names of the index levels of every extra dimension.
    ///
    /// A dimension with a composite index has one name per level. Any other dimension is named
    /// after itself.
    ///
    pub fn extra_dims_names(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let state = self.state()?;

        Ok(state
            .extra_dims
            .keys()
            .map(|dim| {
                let names = match self.dataset.coord(dim) {
                    Some(coord) if coord.is_multi_index() => coord.level_names(),
                    _ => vec![dim.clone()],
                };
                (dim.clone(), names)
            })
            .collect())
    }

    /// Human readable labels at the current position of every extra dimension.
    ///
    /// One label per index level. A dimension without a coordinate gets a single empty label.
    ///
    pub fn extra_dims_labels(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let state = self.state()?;

        Ok(state
            .extra_dims
            .iter()
            .map(|(dim, &position)| {
                let labels = self
                    .dataset
                    .coord(dim)
                    .and_then(|coord| coord.label_at(position))
                    .map(|labels| labels.iter().map(ToString::to_string).collect())
                    .unwrap_or_else(|| vec![String::new()]);
                (dim.clone(), labels)
            })
            .collect())
    }

    pub fn color_var(&self) -> Result<&str> {
        Ok(&self.state()?.color_var)
    }

    /// Select the variable used for coloring. Must be one of `data_vars`.
    ///
    pub fn set_color_var(&mut self, name: &str) -> Result<()> {
        let state = self.state_mut()?;
        if !state.data_vars.iter().any(|var| var == name) {
            return Err(Error::InvalidVariable {
                name: name.to_string(),
                allowed: state.data_vars.clone(),
            });
        }

        debug!("color var '{}' -> '{name}'", state.color_var);
        state.color_var = name.to_string();

        Ok(())
    }

    /// The dataset at the current extra dimension positions.
    ///
    /// Without extra dimensions this is the dataset itself.
    ///
    pub fn view(&mut self) -> Result<&Dataset> {
        let dataset = &self.dataset;
        let state = self.state.as_mut().ok_or(Error::NotInitialized)?;

        Ok(state.view(dataset)?.as_ref())
    }

    /// The dataset at the current extra dimension positions and timestep.
    ///
    /// Without a time dimension this is the same as `view`.
    ///
    pub fn view_step(&mut self) -> Result<&Dataset> {
        let dataset = &self.dataset;
        let state = self.state.as_mut().ok_or(Error::NotInitialized)?;

        Ok(state.view_step(dataset)?.as_ref())
    }

    /// The whole elevation variable, not sliced.
    ///
    pub fn elevation(&self) -> Result<&Variable> {
        let name = &self.state()?.config.elevation_var;
        self.dataset
            .var(name)
            .ok_or_else(|| Error::MissingVariable(name.clone()))
    }

    /// The whole color variable, not sliced.
    ///
    pub fn color(&self) -> Result<&Variable> {
        let name = &self.state()?.color_var;
        self.dataset
            .var(name)
            .ok_or_else(|| Error::MissingVariable(name.clone()))
    }

    pub fn current_elevation(&mut self) -> Result<&Variable> {
        let name = self.state()?.config.elevation_var.clone();
        let step = self.view_step()?;

        step.var(&name).ok_or(Error::MissingVariable(name))
    }

    pub fn current_color(&mut self) -> Result<&Variable> {
        let name = self.state()?.color_var.clone();
        let step = self.view_step()?;

        step.var(&name).ok_or(Error::MissingVariable(name))
    }

    /// Recompute whatever is stale, so that reads of the current slice are up to date.
    ///
    pub fn refresh(&mut self) -> Result<()> {
        self.view_step()?;

        Ok(())
    }

    /// Triangle mesh of the x/y grid. Does not depend on any cursor.
    ///
    pub fn to_unstructured_mesh(&self) -> Result<Mesh> {
        let config = &self.state()?.config;
        let x = numeric_coord(&self.dataset, &config.x_dim)?;
        let y = numeric_coord(&self.dataset, &config.y_dim)?;

        mesh::to_unstructured_mesh(x.view(), y.view())
    }

    fn state(&self) -> Result<&ViewState> {
        self.state.as_ref().ok_or(Error::NotInitialized)
    }

    fn state_mut(&mut self) -> Result<&mut ViewState> {
        self.state.as_mut().ok_or(Error::NotInitialized)
    }
}

impl ViewState {
    /// Validate `config` against `dataset` and build a fresh state with every cursor at 0.
    ///
    fn new(dataset: &Dataset, config: ViewConfig) -> Result<Self> {
        let elevation = dataset
            .var(&config.elevation_var)
            .ok_or_else(|| Error::MissingVariable(config.elevation_var.clone()))?;
        let missing_dim = |dim: &String| Error::MissingDimension {
            variable: config.elevation_var.clone(),
            dim: dim.clone(),
        };

        let nsteps = match &config.time_dim {
            Some(time_dim) => {
                if dataset.coord(time_dim).is_none() {
                    return Err(Error::MissingCoordinate(time_dim.clone()));
                }
                elevation
                    .size_of(time_dim)
                    .ok_or_else(|| missing_dim(time_dim))?
            }
            None => 0,
        };

        for dim in [&config.x_dim, &config.y_dim] {
            if dataset.coord(dim).is_none() {
                return Err(Error::MissingCoordinate(dim.clone()));
            }
        }
        for dim in [&config.x_dim, &config.y_dim] {
            if !elevation.has_dim(dim) {
                return Err(missing_dim(dim));
            }
        }
        for dim in [&config.x_dim, &config.y_dim] {
            numeric_coord(dataset, dim)?;
        }

        if config.x_dim == config.y_dim {
            return Err(Error::DuplicateRole(config.x_dim.clone()));
        }
        if let Some(time_dim) = &config.time_dim {
            if *time_dim == config.x_dim || *time_dim == config.y_dim {
                return Err(Error::DuplicateRole(time_dim.clone()));
            }
        }

        let dims: BTreeSet<&String> = elevation.dims().iter().collect();
        let data_vars = dataset
            .data_vars()
            .filter(|(_, var)| var.dims().iter().collect::<BTreeSet<_>>() == dims)
            .map(|(name, _)| name.clone())
            .collect();

        let extra_dims = elevation
            .dims()
            .iter()
            .filter(|dim| {
                **dim != config.x_dim
                    && **dim != config.y_dim
                    && Some(*dim) != config.time_dim.as_ref()
            })
            .map(|dim| (dim.clone(), 0))
            .collect();

        Ok(Self {
            color_var: config.elevation_var.clone(),
            config,
            data_vars,
            nsteps,
            timestep: 0,
            extra_dims,
            view: Cached::Stale,
            view_step: Cached::Stale,
        })
    }

    fn view(&mut self, dataset: &Arc<Dataset>) -> Result<&Arc<Dataset>> {
        let Self {
            view, extra_dims, ..
        } = self;

        view.get_or_try_insert_with(|| select_extra_dims(dataset, extra_dims))
    }

    fn view_step(&mut self, dataset: &Arc<Dataset>) -> Result<&Arc<Dataset>> {
        let Self {
            view,
            view_step,
            extra_dims,
            config,
            timestep,
            ..
        } = self;

        view_step.get_or_try_insert_with(|| {
            let view = view.get_or_try_insert_with(|| select_extra_dims(dataset, extra_dims))?;
            match &config.time_dim {
                Some(time_dim) => {
                    trace!("selecting step {timestep} along '{time_dim}'");
                    let positions = BTreeMap::from([(time_dim.clone(), *timestep)]);
                    Ok(Arc::new(view.isel(&positions)?))
                }
                None => Ok(Arc::clone(view)),
            }
        })
    }
}

fn select_extra_dims(
    dataset: &Arc<Dataset>,
    positions: &BTreeMap<String, usize>,
) -> Result<Arc<Dataset>> {
    if positions.is_empty() {
        Ok(Arc::clone(dataset))
    } else {
        trace!("selecting extra dims {positions:?}");
        Ok(Arc::new(dataset.isel(positions)?))
    }
}

fn numeric_coord(dataset: &Dataset, name: &str) -> Result<ndarray::Array1<f64>> {
    dataset
        .coord(name)
        .ok_or_else(|| Error::MissingCoordinate(name.to_string()))?
        .labels()
        .and_then(|labels| labels.to_f64())
        .ok_or_else(|| Error::NonNumericCoordinate(name.to_string()))
}
