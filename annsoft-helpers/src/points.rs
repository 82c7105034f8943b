use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::{Float, PointSetError};

/// How points are laid out in a matrix handed to [`PointSet::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// One point per row (`N × D`).
    #[default]
    RowMajor,
    /// One point per column (`D × N`).
    ColumnMajor,
}

/// An immutable set of `N` points in `D` dimensions.
///
/// Whatever the input orientation, points are stored one per row in standard
/// (C) layout, so `point(i)` is always a contiguous view.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct PointSet<F: Float> {
    points: Array2<F>,
}

impl<F: Float> PointSet<F> {
    /// Ingests a matrix, normalising it to one point per row.
    ///
    /// # Arguments
    ///
    /// * `data` - The coordinates.
    /// * `orientation` - Whether `data` holds one point per row or per column.
    ///
    /// # Errors
    ///
    /// Returns `PointSetError::Empty` when there are no points,
    /// `PointSetError::ZeroDimension` when points have no coordinates, and
    /// `PointSetError::NonFinite` on the first NaN or infinite coordinate.
    pub fn new(data: Array2<F>, orientation: Orientation) -> Result<Self, PointSetError> {
        let points = match orientation {
            Orientation::RowMajor => data,
            Orientation::ColumnMajor => data.reversed_axes(),
        };
        let points = if points.is_standard_layout() {
            points
        } else {
            points.as_standard_layout().into_owned()
        };

        if points.nrows() == 0 {
            return Err(PointSetError::Empty);
        }
        if points.ncols() == 0 {
            return Err(PointSetError::ZeroDimension);
        }
        if let Some(((point, dim), _)) = points.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PointSetError::NonFinite { point, dim });
        }
        Ok(Self { points })
    }

    pub fn from_rows(data: Array2<F>) -> Result<Self, PointSetError> {
        Self::new(data, Orientation::RowMajor)
    }

    pub fn from_columns(data: Array2<F>) -> Result<Self, PointSetError> {
        Self::new(data, Orientation::ColumnMajor)
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    /// Dimensionality of every point.
    pub fn dim(&self) -> usize {
        self.points.ncols()
    }

    pub fn point(&self, i: usize) -> ArrayView1<'_, F> {
        self.points.row(i)
    }

    /// All points, one per row.
    pub fn view(&self) -> ArrayView2<'_, F> {
        self.points.view()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = ArrayView1<'_, F>> {
        self.points.axis_iter(Axis(0))
    }

    pub fn into_inner(self) -> Array2<F> {
        self.points
    }
}
