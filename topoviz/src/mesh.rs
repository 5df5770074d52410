use ndarray::{Array2, ArrayView1};

use crate::errors::{Error, Result};

/// An unstructured triangle mesh built from a regular grid.
///
/// `vertices` has shape `(nr * nc, 3)`, `triangles` has shape `(2 * (nr - 1) * (nc - 1), 3)` and
/// holds indices into `vertices`.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub vertices: Array2<f64>,
    pub triangles: Array2<u32>,
}

impl Mesh {
    pub fn n_vertices(&self) -> usize {
        self.vertices.nrows()
    }

    pub fn n_triangles(&self) -> usize {
        self.triangles.nrows()
    }
}

/// Build a triangle mesh from 1D `x` (columns) and `y` (rows) coordinates.
///
/// Vertex `k = j * nc + i` is `(x[i], y[j], 0)`, ie rows of the grid are laid out one after the
/// other. Elevation is not baked in: z is always 0 and it's up to the renderer to warp the mesh.
///
/// Each grid cell is split along the diagonal going from its top right to its bottom left corner:
///
/// ```text
/// TL --- TR
///  |   / |
///  |  /  |
///  | /   |
/// BL --- BR
/// ```
///
/// giving triangles `(TL, TR, BL)` and `(TR, BR, BL)`. A grid with fewer than two rows or columns
/// has no cells and yields no triangles.
///
/// Triangles index vertices with `u32`, so a grid with more than `u32::MAX` vertices is rejected.
///
pub fn to_unstructured_mesh(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<Mesh> {
    let nc = x.len();
    let nr = y.len();
    check_vertex_count(nr, nc)?;

    let mut vertices = Array2::zeros((nr * nc, 3));
    for (k, mut vertex) in vertices.rows_mut().into_iter().enumerate() {
        vertex[0] = x[k % nc];
        vertex[1] = y[k / nc];
    }

    let cells = Cells::new(nr.saturating_sub(1), nc.saturating_sub(1));
    let mut triangles = Array2::zeros((2 * cells.len(), 3));
    for (n, (row, col)) in cells.enumerate() {
        let tl = (row * nc + col) as u32;
        let tr = tl + 1;
        let bl = ((row + 1) * nc + col) as u32;
        let br = bl + 1;

        for (i, triangle) in [[tl, tr, bl], [tr, br, bl]].iter().enumerate() {
            for (j, &index) in triangle.iter().enumerate() {
                triangles[[2 * n + i, j]] = index;
            }
        }
    }

    Ok(Mesh {
        vertices,
        triangles,
    })
}

fn check_vertex_count(nr: usize, nc: usize) -> Result<()> {
    nr.checked_mul(nc)
        .and_then(|count| u32::try_from(count).ok())
        .map(|_| ())
        .ok_or_else(|| {
            Error::Shape(format!(
                "a {nr} x {nc} grid has more vertices than a mesh can index"
            ))
        })
}

/// Iterate over `(row, col)` of the cells of a grid, row by row.
///
struct Cells {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
}

impl Cells {
    fn new(rows: usize, cols: usize) -> Self {
        // A grid with no columns has no cells, whatever the number of rows
        let rows = if cols == 0 { 0 } else { rows };

        Self {
            row: 0,
            col: 0,
            rows,
            cols,
        }
    }

    fn len(&self) -> usize {
        self.rows * self.cols
    }
}

impl Iterator for Cells {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.row < self.rows {
            let cell = (self.row, self.col);
            self.col += 1;
            if self.col == self.cols {
                self.col = 0;
                self.row += 1;
            }

            Some(cell)
        } else {
            None
        }
    }
}
