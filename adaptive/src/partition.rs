//! Partition of the input space into the Delaunay simplices of the samples.
use crate::delaunay::{simplex_volume, triangulate};
use crate::errors::{AdaptiveError, Result};
use linfa::ParamGuard;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};

/// Default relative volume under which a simplex is considered flat
pub const DEFAULT_DEGENERACY_EPS: f64 = 1e-12;

/// A simplex of a [Partition]
#[derive(Clone, Debug, PartialEq)]
pub struct Simplex {
    vertices: Vec<usize>,
    centroid: Array1<f64>,
    volume: f64,
}

impl Simplex {
    /// Indices of the vertices in the partition points
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Mean of the vertices coordinates
    pub fn centroid(&self) -> &Array1<f64> {
        &self.centroid
    }

    /// Volume (non negative)
    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// Delaunay triangulation of samples restricted to a bounded input space
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    points: Array2<f64>,
    origin: Vec<Option<usize>>,
    n_samples: usize,
    simplices: Vec<Simplex>,
}

impl Partition {
    /// Triangulated points, one per row
    pub fn points(&self) -> &Array2<f64> {
        &self.points
    }

    /// Index of each triangulated point in the given samples, `None` for added corners
    pub fn origin(&self) -> &[Option<usize>] {
        &self.origin
    }

    /// Number of samples given to the partitioner (before filtering)
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Simplices
    pub fn simplices(&self) -> &[Simplex] {
        &self.simplices
    }

    /// Position in the triangulated points of the `sample`-th given sample, if kept
    pub fn point_of(&self, sample: usize) -> Option<usize> {
        self.origin.iter().position(|o| *o == Some(sample))
    }

    /// Indices of the simplices having the given triangulated point as vertex
    pub fn simplices_with(&self, point: usize) -> Vec<usize> {
        self.simplices
            .iter()
            .enumerate()
            .filter(|(_, s)| s.vertices.contains(&point))
            .map(|(k, _)| k)
            .collect()
    }

    /// Sum of the simplices volumes
    pub fn total_volume(&self) -> f64 {
        self.simplices.iter().map(|s| s.volume).sum()
    }
}

/// The validated set of parameters of the partitioner
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionValidParams {
    include_corners: bool,
    degeneracy_eps: f64,
}

impl Default for PartitionValidParams {
    fn default() -> PartitionValidParams {
        PartitionValidParams {
            include_corners: false,
            degeneracy_eps: DEFAULT_DEGENERACY_EPS,
        }
    }
}

impl PartitionValidParams {
    /// Whether the 2^d corners of the input space are added to the samples
    pub fn include_corners(&self) -> bool {
        self.include_corners
    }

    /// Relative volume under which a simplex is considered flat
    pub fn degeneracy_eps(&self) -> f64 {
        self.degeneracy_eps
    }
}

#[derive(Clone, Debug, Default)]
/// The set of parameters that can be specified for the partitioner
pub struct PartitionParams(PartitionValidParams);

impl PartitionParams {
    /// Default parameters: no corners, degeneracy threshold [DEFAULT_DEGENERACY_EPS]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the input space corners are added to the samples
    pub fn include_corners(mut self, include_corners: bool) -> Self {
        self.0.include_corners = include_corners;
        self
    }

    /// Set the relative volume (fraction of the input space volume) under which
    /// a simplex is considered flat. Should be in [0, 1)
    pub fn degeneracy_eps(mut self, degeneracy_eps: f64) -> Self {
        self.0.degeneracy_eps = degeneracy_eps;
        self
    }
}

impl From<PartitionValidParams> for PartitionParams {
    fn from(valid: PartitionValidParams) -> Self {
        PartitionParams(valid)
    }
}

impl ParamGuard for PartitionParams {
    type Checked = PartitionValidParams;
    type Error = AdaptiveError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let eps = self.0.degeneracy_eps;
        if !(0. ..1.).contains(&eps) {
            return Err(AdaptiveError::InvalidValue(format!(
                "degeneracy_eps should be in [0, 1), got {eps}"
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

impl PartitionValidParams {
    /// Delaunay partition of the (n, d) `points` lying in `xlimits`, a (d, 2) matrix
    /// of [lower, upper] bounds.
    ///
    /// Points outside the bounds are ignored, exact duplicates are dropped (first
    /// occurrence kept).
    ///
    /// # Errors
    ///
    /// * [AdaptiveError::InsufficientPoints]: fewer than `d + 1` points remain,
    /// * [AdaptiveError::DegenerateGeometry]: no simplex can be built or a simplex volume
    ///   is below `degeneracy_eps` times the input space volume.
    pub fn partition(
        &self,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Partition> {
        check_xlimits(xlimits)?;
        let d = xlimits.nrows();
        let n_samples = points.nrows();
        if points.ncols() != d {
            return Err(AdaptiveError::InvalidValue(format!(
                "points should have {d} columns, got {}",
                points.ncols()
            )));
        }

        let mut rows: Vec<Array1<f64>> = Vec::new();
        let mut origin = Vec::new();
        let mut push = |row: Array1<f64>, from: Option<usize>| {
            if rows.iter().any(|r| *r == row) {
                warn!("Duplicate point {row} dropped");
            } else {
                rows.push(row);
                origin.push(from);
            }
        };
        let mut n_outside = 0;
        for (i, row) in points.rows().into_iter().enumerate() {
            let inside = row
                .iter()
                .zip(xlimits.rows())
                .all(|(v, b)| b[0] <= *v && *v <= b[1]);
            if inside {
                push(row.to_owned(), Some(i));
            } else {
                n_outside += 1;
            }
        }
        if n_outside > 0 {
            warn!("{n_outside} points outside of the input space ignored");
        }
        if self.include_corners {
            for c in 0..(1usize << d) {
                let corner = Array1::from_shape_fn(d, |j| xlimits[[j, (c >> j) & 1]]);
                push(corner, None);
            }
        }

        if rows.len() < d + 1 {
            return Err(AdaptiveError::InsufficientPoints(format!(
                "{} points kept, at least {} needed in dimension {d}",
                rows.len(),
                d + 1
            )));
        }
        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
        let points = ndarray::stack(Axis(0), &views)
            .map_err(|e| AdaptiveError::InvalidValue(e.to_string()))?;

        let cells = triangulate(&points)?;
        if cells.is_empty() {
            return Err(AdaptiveError::DegenerateGeometry(
                "points are affinely dependent, no simplex built".to_string(),
            ));
        }
        let box_volume: f64 = xlimits.rows().into_iter().map(|b| b[1] - b[0]).product();
        let threshold = self.degeneracy_eps * box_volume;
        let mut simplices = Vec::with_capacity(cells.len());
        for vertices in cells {
            let volume = simplex_volume(&points, &vertices)?;
            if volume < threshold || volume == 0. {
                return Err(AdaptiveError::DegenerateGeometry(format!(
                    "simplex {vertices:?} is flat (volume {volume})"
                )));
            }
            let centroid = points
                .select(Axis(0), &vertices)
                .mean_axis(Axis(0))
                .ok_or_else(|| AdaptiveError::InvalidValue("empty simplex".to_string()))?;
            simplices.push(Simplex {
                vertices,
                centroid,
                volume,
            });
        }
        debug!(
            "Simplices volumes: {:?}",
            simplices.iter().map(|s| s.volume).collect::<Vec<_>>()
        );
        info!(
            "Partition of {} points in dimension {d}: {} simplices",
            points.nrows(),
            simplices.len()
        );
        Ok(Partition {
            points,
            origin,
            n_samples,
            simplices,
        })
    }
}

/// Delaunay partition of `points` within `xlimits` with default parameters,
/// optionally padded with the input space corners.
///
/// See [PartitionValidParams::partition].
pub fn partition(
    points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    include_corners: bool,
) -> Result<Partition> {
    PartitionParams::new()
        .include_corners(include_corners)
        .check()?
        .partition(points, xlimits)
}

pub(crate) fn check_xlimits(xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<()> {
    if xlimits.ncols() != 2 || xlimits.nrows() == 0 {
        return Err(AdaptiveError::InvalidValue(format!(
            "xlimits should be a (d, 2) matrix, got {:?}",
            xlimits.dim()
        )));
    }
    if xlimits.rows().into_iter().any(|b| !(b[0] <= b[1])) {
        return Err(AdaptiveError::InvalidValue(
            "xlimits lower bounds should not exceed upper bounds".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_xoshiro::Xoshiro256Plus;

    fn init_log() {
        let env = env_logger::Env::new().filter_or("DDOBOX_LOG", "info");
        let mut builder = env_logger::Builder::from_env(env);
        let builder = builder.target(env_logger::Target::Stdout);
        builder.try_init().ok();
    }

    #[test]
    fn test_unit_square() {
        init_log();
        let points = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.], [0.5, 0.5]];
        let xlimits = array![[0., 1.], [0., 1.]];
        let part = partition(&points, &xlimits, false).unwrap();
        assert_eq!(part.simplices().len(), 4);
        assert!(part.simplices().iter().all(|s| s.volume() >= 0.));
        assert_abs_diff_eq!(part.total_volume(), 1., epsilon = 1e-9);
        assert_eq!(part.simplices_with(4).len(), 4);
        for s in part.simplices() {
            let mean = part.points().select(Axis(0), s.vertices()).mean_axis(Axis(0));
            assert_abs_diff_eq!(*s.centroid(), mean.unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_corners_fill_the_box() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let points = Array2::random_using((12, 2), Uniform::new(-2., 3.), &mut rng);
        let xlimits = array![[-2., 3.], [-2., 3.]];
        let part = partition(&points, &xlimits, true).unwrap();
        assert_eq!(part.points().nrows(), 16);
        assert_eq!(part.origin().iter().filter(|o| o.is_none()).count(), 4);
        assert_abs_diff_eq!(part.total_volume(), 25., epsilon = 1e-8);
    }

    #[test]
    fn test_cube_corners_around_single_point() {
        init_log();
        let unit_cube = array![[0., 1.], [0., 1.], [0., 1.]];
        let part = partition(&array![[0.5, 0.5, 0.5]], &unit_cube, true).unwrap();
        assert_eq!(part.points().nrows(), 9);
        assert!(part.simplices().iter().all(|s| s.volume() > 0.));
        assert_abs_diff_eq!(part.total_volume(), 1., epsilon = 1e-9);
        assert!(!part.simplices_with(0).is_empty());
    }

    #[test]
    fn test_random_samples_with_cube_corners() {
        let xlimits = array![[0., 1.], [-1., 1.], [2., 4.]];
        for seed in 0..50 {
            let mut rng = Xoshiro256Plus::seed_from_u64(seed);
            let unit = Array2::random_using((5, 3), Uniform::new(0., 1.), &mut rng);
            let points = Array2::from_shape_fn((5, 3), |(i, j)| {
                xlimits[[j, 0]] + unit[[i, j]] * (xlimits[[j, 1]] - xlimits[[j, 0]])
            });
            let part = partition(&points, &xlimits, true).unwrap();
            assert_abs_diff_eq!(part.total_volume(), 4., epsilon = 1e-9);
            for sample in 0..5 {
                let point = part.point_of(sample).unwrap();
                assert!(!part.simplices_with(point).is_empty());
            }
        }
    }

    #[test]
    fn test_grids() {
        let unit_cube = array![[0., 1.], [0., 1.], [0., 1.]];
        for ticks in [3, 4] {
            let step = 1. / (ticks - 1) as f64;
            let n = ticks * ticks * ticks;
            let grid = Array2::from_shape_fn((n, 3), |(i, j)| {
                ((i / ticks.pow(j as u32)) % ticks) as f64 * step
            });
            for include_corners in [false, true] {
                let part = partition(&grid, &unit_cube, include_corners).unwrap();
                // corners are already grid points
                assert_eq!(part.points().nrows(), n);
                assert_abs_diff_eq!(part.total_volume(), 1., epsilon = 1e-9);
            }
        }

        let grid = Array2::from_shape_fn((25, 2), |(i, j)| ((i / 5usize.pow(j as u32)) % 5) as f64);
        let part = partition(&grid, &array![[0., 4.], [0., 4.]], false).unwrap();
        assert_abs_diff_eq!(part.total_volume(), 16., epsilon = 1e-9);
        assert_eq!(part.simplices().len(), 32);
    }

    #[test]
    fn test_filter_and_duplicates() {
        let points = array![[0., 0.], [5., 5.], [1., 0.], [0., 0.], [0., 1.]];
        let part = partition(&points, &array![[0., 1.], [0., 1.]], false).unwrap();
        assert_eq!(part.origin(), &[Some(0), Some(2), Some(4)]);
        assert_eq!(part.n_samples(), 5);
        assert_eq!(part.point_of(4), Some(2));
        assert_eq!(part.point_of(1), None);
        assert_abs_diff_eq!(part.total_volume(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_insufficient_points() {
        let points = array![[0., 0.], [1., 0.], [2., 2.]];
        assert!(matches!(
            partition(&points, &array![[0., 1.], [0., 1.]], false),
            Err(AdaptiveError::InsufficientPoints(_))
        ));
    }

    #[test]
    fn test_collinear_points() {
        let points = array![[0., 0.], [0.25, 0.25], [0.5, 0.5], [1., 1.]];
        assert!(matches!(
            partition(&points, &array![[0., 1.], [0., 1.]], false),
            Err(AdaptiveError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_params() {
        assert!(PartitionParams::new().degeneracy_eps(1.).check().is_err());
        assert!(PartitionParams::new().degeneracy_eps(-1e-3).check().is_err());
        let params = PartitionParams::new().include_corners(true).check().unwrap();
        assert!(params.include_corners());
        assert_eq!(params.degeneracy_eps(), DEFAULT_DEGENERACY_EPS);
        assert!(params
            .partition(&array![[0.5]], &array![[1., 0.]])
            .is_err());
    }
}
