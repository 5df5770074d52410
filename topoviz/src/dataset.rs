use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, Array2, ArrayD, Axis, Ix2, IxDyn};

use crate::{
    errors::{Error, Result},
    labels::{Label, Labels},
};

/// An in-memory collection of labeled, N-dimensional arrays.
///
/// A dataset is made of coordinates, which label the positions along a dimension, and data
/// variables, which are arrays of `f64` whose axes are named after dimensions. Every dimension
/// has a single size, shared by all coordinates and variables that use it.
///
/// Datasets are never mutated once built. Slicing with `isel` produces a new dataset.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    coords: BTreeMap<String, Coordinate>,
    data_vars: BTreeMap<String, Variable>,
}

/// A coordinate of a dataset.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Coordinate {
    /// Index along the dimension with the same name as the coordinate. More than one level makes
    /// a composite (multi-level) index.
    Index(Vec<Level>),

    /// What is left of an index once its dimension has been selected away by `isel`.
    Scalar(Vec<(String, Label)>),
}

/// One level of an index coordinate.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    pub name: String,
    pub labels: Labels,
}

/// A data variable: an array along named dimensions.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    dims: Vec<String>,
    data: ArrayD<f64>,
}

impl Coordinate {
    /// A simple index whose only level is named after the dimension.
    ///
    pub fn index<S, L>(dim: S, labels: L) -> Self
    where
        S: Into<String>,
        L: Into<Labels>,
    {
        Self::Index(vec![Level {
            name: dim.into(),
            labels: labels.into(),
        }])
    }

    /// A composite index. All levels must have the same length.
    ///
    pub fn multi_index<S, L>(levels: Vec<(S, L)>) -> Result<Self>
    where
        S: Into<String>,
        L: Into<Labels>,
    {
        let levels: Vec<Level> = levels
            .into_iter()
            .map(|(name, labels)| Level {
                name: name.into(),
                labels: labels.into(),
            })
            .collect();

        match levels.first() {
            None => Err(Error::Shape("composite index needs at least one level".to_string())),
            Some(first) => {
                let len = first.labels.len();
                if let Some(level) = levels.iter().find(|level| level.labels.len() != len) {
                    Err(Error::Shape(format!(
                        "index level '{}' has length {}, expected {len}",
                        level.name,
                        level.labels.len()
                    )))
                } else {
                    Ok(Self::Index(levels))
                }
            }
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn is_multi_index(&self) -> bool {
        match self {
            Self::Index(levels) => levels.len() > 1,
            Self::Scalar(levels) => levels.len() > 1,
        }
    }

    /// Number of positions along the indexed dimension. Scalar coordinates have no dimension.
    ///
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Index(levels) => Some(levels.first().map_or(0, |level| level.labels.len())),
            Self::Scalar(_) => None,
        }
    }

    pub fn level_names(&self) -> Vec<String> {
        match self {
            Self::Index(levels) => levels.iter().map(|level| level.name.clone()).collect(),
            Self::Scalar(levels) => levels.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    /// Labels of the first level. This is the whole index for a simple index.
    ///
    pub fn labels(&self) -> Option<&Labels> {
        match self {
            Self::Index(levels) => levels.first().map(|level| &level.labels),
            Self::Scalar(_) => None,
        }
    }

    /// One label per level at `position`.
    ///
    pub fn label_at(&self, position: usize) -> Option<Vec<Label>> {
        match self {
            Self::Index(levels) => levels
                .iter()
                .map(|level| level.labels.get(position))
                .collect(),
            Self::Scalar(levels) => Some(levels.iter().map(|(_, label)| label.clone()).collect()),
        }
    }

    fn isel(&self, position: usize) -> Option<Self> {
        match self {
            Self::Index(levels) => {
                let selected = levels
                    .iter()
                    .map(|level| Some((level.name.clone(), level.labels.get(position)?)))
                    .collect::<Option<Vec<_>>>()?;

                Some(Self::Scalar(selected))
            }
            Self::Scalar(_) => None,
        }
    }
}

impl Variable {
    pub fn new<S: Into<String>>(dims: Vec<S>, data: ArrayD<f64>) -> Result<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(Error::Shape(format!(
                "{} dimension name(s) given for an array with {} axes",
                dims.len(),
                data.ndim()
            )));
        }

        let unique: BTreeSet<&String> = dims.iter().collect();
        if unique.len() != dims.len() {
            return Err(Error::Shape(format!("repeated dimension name in {dims:?}")));
        }

        Ok(Self { dims, data })
    }

    /// Build a variable from a flat, row-major buffer.
    ///
    pub fn from_shape_vec<S: Into<String>>(
        dims: Vec<S>,
        shape: &[usize],
        values: Vec<f64>,
    ) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|err| Error::Shape(err.to_string()))?;

        Self::new(dims, data)
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis(dim).is_some()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn sizes(&self) -> BTreeMap<String, usize> {
        self.dims
            .iter()
            .cloned()
            .zip(self.data.shape().iter().copied())
            .collect()
    }

    pub fn size_of(&self, dim: &str) -> Option<usize> {
        self.axis(dim).map(|axis| self.data.len_of(axis))
    }

    /// Smallest value, ignoring NaN. `None` if there are no values.
    ///
    pub fn min(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|value| !value.is_nan())
            .fold(None, |min, value| match min {
                Some(min) if min <= value => Some(min),
                _ => Some(value),
            })
    }

    /// Largest value, ignoring NaN. `None` if there are no values.
    ///
    pub fn max(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|value| !value.is_nan())
            .fold(None, |max, value| match max {
                Some(max) if max >= value => Some(max),
                _ => Some(value),
            })
    }

    /// Select a single position along `dim`, dropping the dimension.
    ///
    pub fn isel(&self, dim: &str, position: usize) -> Result<Self> {
        let axis = self
            .axis(dim)
            .ok_or_else(|| Error::InvalidDimension(vec![dim.to_string()]))?;
        let size = self.data.len_of(axis);
        if position >= size {
            return Err(Error::PositionOutOfRange {
                dim: dim.to_string(),
                position,
                size,
            });
        }

        let mut dims = self.dims.clone();
        dims.remove(axis.index());

        Ok(Self {
            dims,
            data: self.data.index_axis(axis, position).to_owned(),
        })
    }

    /// View a two dimensional variable as a `(y, x)` grid, whatever the order of its axes.
    ///
    pub fn to_grid(&self, y_dim: &str, x_dim: &str) -> Result<Array2<f64>> {
        let missing = |dim: &str| Error::MissingDimension {
            variable: format!("{:?}", self.dims),
            dim: dim.to_string(),
        };
        if self.dims.len() != 2 {
            return Err(Error::Shape(format!(
                "expected a two dimensional ('{y_dim}', '{x_dim}') slice, got {:?}",
                self.dims
            )));
        }
        let y_axis = self.axis(y_dim).ok_or_else(|| missing(y_dim))?;
        let x_axis = self.axis(x_dim).ok_or_else(|| missing(x_dim))?;

        self.data
            .view()
            .permuted_axes(vec![y_axis.index(), x_axis.index()])
            .into_dimensionality::<Ix2>()
            .map(|grid| grid.to_owned())
            .map_err(|err| Error::Shape(err.to_string()))
    }

    /// Flatten a `(y, x)` slice row-major, y outer, so that value `k` belongs to mesh vertex `k`.
    ///
    pub fn to_vertex_values(&self, y_dim: &str, x_dim: &str) -> Result<Array1<f64>> {
        let grid = self.to_grid(y_dim, x_dim)?;

        Ok(grid.iter().copied().collect())
    }

    fn axis(&self, dim: &str) -> Option<Axis> {
        self.dims.iter().position(|name| name == dim).map(Axis)
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a coordinate, checking its size against dimensions already in use.
    ///
    pub fn with_coord<S: Into<String>>(mut self, name: S, coord: Coordinate) -> Result<Self> {
        self.add_coord(name, coord)?;

        Ok(self)
    }

    /// Add a data variable, checking its shape against dimensions already in use.
    ///
    pub fn with_var<S: Into<String>>(mut self, name: S, var: Variable) -> Result<Self> {
        self.add_var(name, var)?;

        Ok(self)
    }

    pub fn add_coord<S: Into<String>>(&mut self, name: S, coord: Coordinate) -> Result<()> {
        let name = name.into();
        let sizes = self.sizes_without(Some(&name), None);
        match coord.len() {
            Some(len) => check_size(&sizes, &name, len)?,
            None => {
                if sizes.contains_key(&name) {
                    return Err(Error::Shape(format!(
                        "scalar coordinate '{name}' would shadow a dimension"
                    )));
                }
            }
        }
        self.coords.insert(name, coord);

        Ok(())
    }

    pub fn add_var<S: Into<String>>(&mut self, name: S, var: Variable) -> Result<()> {
        let name = name.into();
        let sizes = self.sizes_without(None, Some(&name));
        for (dim, size) in var.sizes() {
            check_size(&sizes, &dim, size)?;
            if matches!(self.coords.get(&dim), Some(Coordinate::Scalar(_))) {
                return Err(Error::Shape(format!(
                    "dimension '{dim}' is already used as a scalar coordinate"
                )));
            }
        }
        self.data_vars.insert(name, var);

        Ok(())
    }

    /// True if `name` is a coordinate or a data variable.
    ///
    pub fn contains(&self, name: &str) -> bool {
        self.coords.contains_key(name) || self.data_vars.contains_key(name)
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn coords(&self) -> impl Iterator<Item = (&String, &Coordinate)> {
        self.coords.iter()
    }

    pub fn var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name)
    }

    pub fn data_vars(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.data_vars.iter()
    }

    /// Size of every dimension in use.
    ///
    pub fn sizes(&self) -> BTreeMap<String, usize> {
        self.sizes_without(None, None)
    }

    /// Copy of this dataset without the named coordinates and variables.
    ///
    pub fn drop_vars(&self, names: &[&str]) -> Self {
        let mut dataset = self.clone();
        for name in names {
            dataset.coords.remove(*name);
            dataset.data_vars.remove(*name);
        }

        dataset
    }

    /// Select one position along each of the given dimensions.
    ///
    /// Selected dimensions are dropped from every variable that has them and their index
    /// coordinates become scalar coordinates. All positions are validated before anything is
    /// sliced.
    ///
    pub fn isel(&self, positions: &BTreeMap<String, usize>) -> Result<Self> {
        let sizes = self.sizes();
        let unknown: Vec<String> = positions
            .keys()
            .filter(|dim| !sizes.contains_key(*dim))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(Error::InvalidDimension(unknown));
        }
        for (dim, &position) in positions {
            let size = sizes[dim];
            if position >= size {
                return Err(Error::PositionOutOfRange {
                    dim: dim.clone(),
                    position,
                    size,
                });
            }
        }

        let mut coords = BTreeMap::new();
        for (name, coord) in &self.coords {
            let coord = match positions.get(name) {
                Some(&position) => coord.isel(position).ok_or_else(|| {
                    Error::Shape(format!("index '{name}' has no position {position}"))
                })?,
                None => coord.clone(),
            };
            coords.insert(name.clone(), coord);
        }

        let mut data_vars = BTreeMap::new();
        for (name, var) in &self.data_vars {
            let mut var = var.clone();
            for (dim, &position) in positions {
                if var.has_dim(dim) {
                    var = var.isel(dim, position)?;
                }
            }
            data_vars.insert(name.clone(), var);
        }

        Ok(Self { coords, data_vars })
    }

    fn sizes_without(
        &self,
        coord: Option<&String>,
        var: Option<&String>,
    ) -> BTreeMap<String, usize> {
        let mut sizes = BTreeMap::new();
        for (name, c) in &self.coords {
            if Some(name) == coord {
                continue;
            }
            if let Some(len) = c.len() {
                sizes.insert(name.clone(), len);
            }
        }
        for (name, v) in &self.data_vars {
            if Some(name) == var {
                continue;
            }
            sizes.extend(v.sizes());
        }

        sizes
    }
}

fn check_size(sizes: &BTreeMap<String, usize>, dim: &str, size: usize) -> Result<()> {
    match sizes.get(dim) {
        Some(&existing) if existing != size => Err(Error::Shape(format!(
            "dimension '{dim}' has size {existing}, got {size}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::testing;

    #[test]
    fn test_sizes() {
        let dataset = testing::dataset();
        let sizes = dataset.sizes();

        assert_eq!(sizes.len(), 4);
        assert_eq!(sizes["batch"], 3);
        assert_eq!(sizes["time"], 3);
        assert_eq!(sizes["y"], 3);
        assert_eq!(sizes["x"], 3);
    }

    #[test]
    fn test_inconsistent_sizes() {
        let dataset = testing::dataset();

        let coord = Coordinate::index("x", vec![0_i64, 1]);
        assert!(matches!(
            dataset.clone().with_coord("x", coord),
            Err(Error::Shape(_))
        ));

        let var = Variable::new(vec!["y", "x"], ArrayD::zeros(IxDyn(&[3, 5]))).unwrap();
        assert!(matches!(
            dataset.clone().with_var("bad", var),
            Err(Error::Shape(_))
        ));

        // Replacing a coordinate with one of another length is fine if nothing else uses it
        let dataset = Dataset::new()
            .with_coord("x", Coordinate::index("x", vec![0_i64, 1]))
            .unwrap()
            .with_coord("x", Coordinate::index("x", vec![0_i64, 1, 2]))
            .unwrap();
        assert_eq!(dataset.sizes()["x"], 3);
    }

    #[test]
    fn test_variable_new_errors() {
        assert!(Variable::new(vec!["x"], ArrayD::zeros(IxDyn(&[2, 2]))).is_err());
        assert!(Variable::new(vec!["x", "x"], ArrayD::zeros(IxDyn(&[2, 2]))).is_err());
        assert!(Variable::from_shape_vec(vec!["x"], &[3], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_multi_index() {
        let coord = Coordinate::multi_index(vec![
            ("batch", Labels::from(vec![1_i64, 2, 3])),
            ("batch_level2", Labels::from(vec!["a", "b", "c"])),
        ])
        .unwrap();

        assert!(coord.is_multi_index());
        assert_eq!(coord.len(), Some(3));
        assert_eq!(coord.level_names(), vec!["batch", "batch_level2"]);
        assert_eq!(
            coord.label_at(1),
            Some(vec![Label::Int(2), Label::from("b")])
        );

        let bad = Coordinate::multi_index(vec![
            ("a", Labels::from(vec![1_i64, 2, 3])),
            ("b", Labels::from(vec!["a"])),
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_min_max() {
        let var = Variable::new(vec!["x"], array![3.0, f64::NAN, -1.0, 2.0].into_dyn()).unwrap();
        assert_eq!(var.min(), Some(-1.0));
        assert_eq!(var.max(), Some(3.0));

        let empty = Variable::new(vec!["x"], ArrayD::zeros(IxDyn(&[0]))).unwrap();
        assert_eq!(empty.min(), None);
        assert_eq!(empty.max(), None);
    }

    #[test]
    fn test_isel() {
        let dataset = testing::dataset();
        let positions = BTreeMap::from([("batch".to_string(), 1), ("time".to_string(), 2)]);
        let sliced = dataset.isel(&positions).unwrap();

        let elevation = sliced.var("topography__elevation").unwrap();
        assert_eq!(elevation.dims(), &["y", "x"]);

        let expected = dataset
            .var("topography__elevation")
            .unwrap()
            .data()
            .index_axis(Axis(0), 1)
            .index_axis(Axis(0), 2)
            .to_owned();
        assert_eq!(elevation.data(), &expected);

        // Variables without the selected dims are untouched
        assert_eq!(sliced.var("xy_var"), dataset.var("xy_var"));

        // Index coordinates become scalar
        assert_eq!(
            sliced.coord("batch"),
            Some(&Coordinate::Scalar(vec![("batch".to_string(), Label::Int(2))]))
        );
        assert!(!sliced.sizes().contains_key("batch"));
        assert_eq!(sliced.coord("x"), dataset.coord("x"));
    }

    #[test]
    fn test_isel_empty_is_identity() {
        let dataset = testing::dataset();
        assert_eq!(dataset.isel(&BTreeMap::new()).unwrap(), dataset);
    }

    #[test]
    fn test_isel_errors() {
        let dataset = testing::dataset();

        let positions = BTreeMap::from([("nope".to_string(), 0)]);
        assert!(matches!(
            dataset.isel(&positions),
            Err(Error::InvalidDimension(dims)) if dims == vec!["nope".to_string()]
        ));

        let positions = BTreeMap::from([("batch".to_string(), 3)]);
        assert!(matches!(
            dataset.isel(&positions),
            Err(Error::PositionOutOfRange { position: 3, size: 3, .. })
        ));
    }

    #[test]
    fn test_scalar_coord_cannot_shadow_dimension() {
        let dataset = testing::dataset();
        let scalar = Coordinate::Scalar(vec![("x".to_string(), Label::Int(0))]);
        assert!(dataset.clone().with_coord("x", scalar).is_err());

        let sliced = dataset
            .isel(&BTreeMap::from([("x".to_string(), 0)]))
            .unwrap();
        let var = Variable::new(vec!["x"], ArrayD::zeros(IxDyn(&[3]))).unwrap();
        assert!(sliced.with_var("back", var).is_err());
    }

    #[test]
    fn test_drop_vars() {
        let dataset = testing::dataset();
        let dropped = dataset.drop_vars(&["x", "other_var"]);

        assert!(!dropped.contains("x"));
        assert!(!dropped.contains("other_var"));
        assert!(dropped.contains("topography__elevation"));
        // dimension is still in use by the variables
        assert_eq!(dropped.sizes()["x"], 3);
    }

    #[test]
    fn test_to_grid() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]].into_dyn();
        let var = Variable::new(vec!["x", "y"], data).unwrap();

        let grid = var.to_grid("y", "x").unwrap();
        assert_eq!(grid, array![[1.0, 3.0, 5.0], [2.0, 4.0, 6.0]]);

        let values = var.to_vertex_values("y", "x").unwrap();
        assert_eq!(values, array![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);

        assert!(var.to_grid("y", "z").is_err());
        let var3 = Variable::new(vec!["a", "y", "x"], ArrayD::zeros(IxDyn(&[1, 2, 2]))).unwrap();
        assert!(var3.to_grid("y", "x").is_err());
    }
}
