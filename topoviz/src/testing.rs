use std::sync::Arc;

use ndarray::{Array2, Array4};

use crate::{
    config::ViewConfig,
    dataset::{Coordinate, Dataset, Variable},
    labels::Labels,
    view::DatasetView,
};

pub(crate) const X: [i64; 3] = [0, 1, 2];
pub(crate) const Y: [i64; 3] = [0, 1, 2];
pub(crate) const TIME: [i64; 3] = [0, 100, 200];
pub(crate) const BATCH: [i64; 3] = [1, 2, 3];

/// The `batch × time × y × x` dataset used throughout the tests.
///
/// `topography__elevation` is `batch * time * y * x`, `other_var` is all ones on the same
/// dimensions and `xy_var` is `x * y` on `(y, x)` only.
///
pub(crate) fn dataset() -> Dataset {
    let elevation = Array4::from_shape_fn((3, 3, 3, 3), |(b, t, y, x)| {
        (BATCH[b] * TIME[t] * Y[y] * X[x]) as f64
    });
    let other_var = Array4::<f64>::ones((3, 3, 3, 3));
    let xy_var = Array2::from_shape_fn((3, 3), |(y, x)| (X[x] * Y[y]) as f64);

    Dataset::new()
        .with_coord("batch", Coordinate::index("batch", BATCH.to_vec()))
        .unwrap()
        .with_coord("time", Coordinate::index("time", TIME.to_vec()))
        .unwrap()
        .with_coord("y", Coordinate::index("y", Y.to_vec()))
        .unwrap()
        .with_coord("x", Coordinate::index("x", X.to_vec()))
        .unwrap()
        .with_var(
            "topography__elevation",
            Variable::new(vec!["batch", "time", "y", "x"], elevation.into_dyn()).unwrap(),
        )
        .unwrap()
        .with_var(
            "other_var",
            Variable::new(vec!["batch", "time", "y", "x"], other_var.into_dyn()).unwrap(),
        )
        .unwrap()
        .with_var(
            "xy_var",
            Variable::new(vec!["y", "x"], xy_var.into_dyn()).unwrap(),
        )
        .unwrap()
}

/// Same data with `batch` turned into a composite index `midx` of levels `batch` and
/// `batch_level2`.
///
pub(crate) fn multi_index_dataset() -> Dataset {
    let base = dataset();
    let midx = Coordinate::multi_index(vec![
        ("batch", Labels::from(BATCH.to_vec())),
        ("batch_level2", Labels::from(vec!["a", "b", "c"])),
    ])
    .unwrap();

    let mut renamed = Dataset::new().with_coord("midx", midx).unwrap();
    for (name, coord) in base.coords().filter(|(name, _)| *name != "batch") {
        renamed.add_coord(name.clone(), coord.clone()).unwrap();
    }
    for (name, var) in base.data_vars() {
        let dims: Vec<&str> = var
            .dims()
            .iter()
            .map(|dim| if dim == "batch" { "midx" } else { dim.as_str() })
            .collect();
        renamed
            .add_var(name.clone(), Variable::new(dims, var.data().clone()).unwrap())
            .unwrap();
    }

    renamed
}

/// A view over the test dataset, initialized with `time` as the time dimension.
///
pub(crate) fn view_init() -> DatasetView {
    DatasetView::with_config(Arc::new(dataset()), ViewConfig::new().with_time_dim("time")).unwrap()
}
