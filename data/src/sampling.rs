//! Sampling methods generating initial designs within a bounded input space.
use linfa::Float;
use ndarray::{s, Array, Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_rand::{
    rand::seq::SliceRandom, rand::Rng, rand::SeedableRng, rand_distr::Uniform, RandomExt,
};
use ndarray_stats::{DeviationExt, QuantileExt};
use rand_xoshiro::Xoshiro256Plus;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::errors::DataError;

type RngRef<R> = Arc<RwLock<R>>;

/// Sampling method allowing to generate a design within a sample space
/// `[lower_bound_xi, upper_bound_xi]^nx`.
pub trait SamplingMethod<F: Float> {
    /// Returns the (nx, 2) bounds of the sample space
    fn sampling_space(&self) -> &Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to `[0., 1.]^nx`
    fn normalized_sample(&self, ns: usize) -> Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples within the sampling space bounds
    fn sample(&self, ns: usize) -> Array2<F> {
        let xlimits = self.sampling_space();
        let lower = xlimits.column(0);
        let scaler = &xlimits.column(1) - &lower;
        self.normalized_sample(ns) * scaler + lower
    }
}

/// Kinds of sampling available to [`DataHandler::init`](crate::DataHandler::init)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum SamplingKind {
    /// Uniform random draws
    Random,
    /// Maximin Latin hypercube
    #[default]
    Lhs,
    /// Full grid, shuffled and truncated
    Grid,
    /// Scrambled Sobol sequence
    Sobol,
}

impl FromStr for SamplingKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(SamplingKind::Random),
            "lhs" => Ok(SamplingKind::Lhs),
            "grid" => Ok(SamplingKind::Grid),
            "sobol" => Ok(SamplingKind::Sobol),
            _ => Err(DataError::InvalidValue(format!(
                "Unknown sampling method '{s}', expected one of random, lhs, grid, sobol"
            ))),
        }
    }
}

fn check_xlimits<F: Float>(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) {
    if xlimits.ncols() != 2 {
        panic!("xlimits must have 2 columns (lower, upper)");
    }
}

/// Uniform random design
#[derive(Clone, Debug)]
pub struct Random<F: Float, R: Rng> {
    xlimits: Array2<F>,
    rng: RngRef<R>,
}

impl<F: Float> Random<F, Xoshiro256Plus> {
    /// Constructor given a (nx, 2) design space \[\[lower bound, upper bound\], ...\]
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> Random<F, R> {
    /// Constructor with a given random generator for reproducibility
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        check_xlimits(xlimits);
        Random {
            xlimits: xlimits.to_owned(),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Set random generator
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Random<F, R2> {
        Random {
            xlimits: self.xlimits,
            rng: Arc::new(RwLock::new(rng)),
        }
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Random<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let mut rng = self.rng.write().unwrap();
        let nx = self.xlimits.nrows();
        Array::random_using((ns, nx), Uniform::new(0., 1.), &mut *rng).mapv(|v| F::cast(v))
    }
}

/// Latin hypercube design: each dimension is cut in `ns` intervals holding exactly
/// one sample. Among `iterations` random hypercubes the one maximizing the minimal
/// distance between samples is retained.
#[derive(Clone, Debug)]
pub struct Lhs<F: Float, R: Rng> {
    xlimits: Array2<F>,
    iterations: usize,
    rng: RngRef<R>,
}

/// Default number of random hypercubes compared by the maximin criterion
pub const LHS_MAXIMIN_ITERATIONS: usize = 1000;

impl<F: Float> Lhs<F, Xoshiro256Plus> {
    /// Constructor given a (nx, 2) design space \[\[lower bound, upper bound\], ...\]
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> Lhs<F, R> {
    /// Constructor with a given random generator for reproducibility
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        check_xlimits(xlimits);
        Lhs {
            xlimits: xlimits.to_owned(),
            iterations: LHS_MAXIMIN_ITERATIONS,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Number of random hypercubes compared, at least 1
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Set random generator
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Lhs<F, R2> {
        Lhs {
            xlimits: self.xlimits,
            iterations: self.iterations,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    fn classic_lhs(&self, ns: usize, rng: &mut R) -> Array2<f64> {
        let nx = self.xlimits.nrows();
        let cut = Array::linspace(0., 1., ns + 1);
        let lower = cut.slice(s![..ns]).to_owned();
        let width = &cut.slice(s![1..]) - &lower;
        let mut lhs = Array2::zeros((ns, nx));
        for mut col in lhs.columns_mut() {
            let rnd = Array1::random_using(ns, Uniform::new(0., 1.), &mut *rng);
            let mut points = (rnd * &width + &lower).to_vec();
            points.shuffle(&mut *rng);
            col.assign(&Array1::from(points));
        }
        lhs
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Lhs<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let mut rng = self.rng.write().unwrap();
        let mut best = self.classic_lhs(ns, &mut *rng);
        if ns > 1 {
            let mut best_dist = min_pairwise_distance(&best);
            for _ in 1..self.iterations {
                let lhs = self.classic_lhs(ns, &mut *rng);
                let d = min_pairwise_distance(&lhs);
                if d > best_dist {
                    best_dist = d;
                    best = lhs;
                }
            }
        }
        best.mapv(F::cast)
    }
}

/// Smallest euclidean distance between two rows of `x` (at least two rows)
fn min_pairwise_distance(x: &Array2<f64>) -> f64 {
    let n = x.nrows();
    let dists: Array1<f64> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .map(|(i, j)| x.row(i).l2_dist(&x.row(j)).unwrap_or(0.))
        .collect();
    dists.min().copied().unwrap_or(0.)
}

/// Grid design: `ceil(ns^(1/nx))` evenly spaced levels per dimension,
/// the full grid is shuffled then truncated to `ns` samples.
#[derive(Clone, Debug)]
pub struct Grid<F: Float, R: Rng> {
    xlimits: Array2<F>,
    rng: RngRef<R>,
}

impl<F: Float> Grid<F, Xoshiro256Plus> {
    /// Constructor given a (nx, 2) design space \[\[lower bound, upper bound\], ...\]
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> Grid<F, R> {
    /// Constructor with a given random generator used to shuffle the grid
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        check_xlimits(xlimits);
        Grid {
            xlimits: xlimits.to_owned(),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Set random generator
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Grid<F, R2> {
        Grid {
            xlimits: self.xlimits,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Number of levels per dimension needed to hold `ns` samples
    pub fn levels(&self, ns: usize) -> usize {
        let nx = self.xlimits.nrows() as u32;
        if ns == 0 || nx == 0 {
            return 0;
        }
        // float root may land just above an exact integer root
        let mut k = (ns as f64).powf(1. / nx as f64).floor().max(1.) as usize;
        while k.saturating_pow(nx) < ns {
            k += 1;
        }
        k
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Grid<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let k = self.levels(ns);
        if k == 0 {
            return Array2::zeros((0, nx));
        }
        let levels = Array::linspace(0., 1., k);
        let total = k.pow(nx as u32);
        let mut grid = Array2::<f64>::zeros((total, nx));
        for (idx, mut row) in grid.rows_mut().into_iter().enumerate() {
            let mut code = idx;
            for v in row.iter_mut() {
                *v = levels[code % k];
                code /= k;
            }
        }
        let mut order: Vec<usize> = (0..total).collect();
        let mut rng = self.rng.write().unwrap();
        order.shuffle(&mut *rng);
        order.truncate(ns);
        grid.select(Axis(0), &order).mapv(F::cast)
    }
}

/// Maximum number of dimensions of a [Sobol] design
pub const SOBOL_MAX_DIMENSIONS: usize = sobol_burley::NUM_DIMENSIONS as usize;

/// Owen-scrambled Sobol design: the first `ns` points of the sequence, so that a design
/// is the prefix of any larger one with the same seed.
#[derive(Clone, Debug)]
pub struct Sobol<F: Float> {
    xlimits: Array2<F>,
    seed: u32,
}

impl<F: Float> Sobol<F> {
    /// Constructor given a (nx, 2) design space \[\[lower bound, upper bound\], ...\]
    ///
    /// **Panics** if xlimits number of columns is different from 2 or if it has more
    /// than [SOBOL_MAX_DIMENSIONS] rows.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        check_xlimits(xlimits);
        if xlimits.nrows() > SOBOL_MAX_DIMENSIONS {
            panic!("Sobol design is limited to {SOBOL_MAX_DIMENSIONS} dimensions");
        }
        Sobol {
            xlimits: xlimits.to_owned(),
            seed: 0,
        }
    }

    /// Set the scrambling seed
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }
}

impl<F: Float> SamplingMethod<F> for Sobol<F> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let nx = self.xlimits.nrows();
        Array2::from_shape_fn((ns, nx), |(i, j)| {
            F::cast(sobol_burley::sample(i as u32, j as u32, self.seed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_random_within_bounds() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let doe = Random::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(20);
        assert_eq!(doe.dim(), (20, 2));
        assert!(doe.column(0).iter().all(|v| (5. ..=10.).contains(v)));
        assert!(doe.column(1).iter().all(|v| (0. ..=1.).contains(v)));
    }

    #[test]
    fn test_lhs_one_sample_per_interval() {
        let xlimits = arr2(&[[0., 1.], [-5., 5.], [10., 20.]]);
        let ns = 7;
        let doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(0))
            .iterations(20)
            .sample(ns);
        for (j, col) in doe.columns().into_iter().enumerate() {
            let (lo, hi) = (xlimits[[j, 0]], xlimits[[j, 1]]);
            let mut bins: Vec<usize> = col
                .iter()
                .map(|v| (((v - lo) / (hi - lo)) * ns as f64).floor() as usize)
                .collect();
            bins.sort();
            assert_eq!(bins, (0..ns).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_lhs_maximin_improves_spread() {
        let xlimits = arr2(&[[0., 1.], [0., 1.]]);
        let single = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(3))
            .iterations(1)
            .normalized_sample(10);
        let many = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(3))
            .iterations(200)
            .normalized_sample(10);
        // the first candidate of both runs is the same design
        assert!(min_pairwise_distance(&many) >= min_pairwise_distance(&single));
    }

    #[test]
    fn test_grid_levels() {
        let xlimits = arr2(&[[0., 1.], [0., 1.], [0., 1.]]);
        let grid = Grid::new(&xlimits);
        assert_eq!(grid.levels(8), 2);
        assert_eq!(grid.levels(9), 3);
        assert_eq!(grid.levels(27), 3);
        assert_eq!(grid.levels(1), 1);
    }

    #[test]
    fn test_grid_sample() {
        let xlimits: Array2<f64> = arr2(&[[0., 2.], [-1., 1.]]);
        let doe = Grid::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(9);
        assert_eq!(doe.nrows(), 9);
        let mut pts: Vec<(i64, i64)> = doe
            .rows()
            .into_iter()
            .map(|r| ((r[0] * 10.).round() as i64, (r[1] * 10.).round() as i64))
            .collect();
        pts.sort();
        let mut expected = vec![];
        for a in [0, 10, 20] {
            for b in [-10, 0, 10] {
                expected.push((a, b));
            }
        }
        assert_eq!(pts, expected);

        let truncated = Grid::new(&xlimits).normalized_sample(5);
        assert_eq!(truncated.nrows(), 5);
        assert!(truncated.iter().all(|v| (0. ..=1.).contains(v)));
    }

    #[test]
    fn test_sobol_sample() {
        let xlimits: Array2<f64> = arr2(&[[0., 4.], [-1., 1.], [10., 20.]]);
        let doe = Sobol::new(&xlimits).seed(7).sample(8);
        assert_eq!(doe.dim(), (8, 3));
        // one point per eighth of each dimension
        for (j, col) in doe.columns().into_iter().enumerate() {
            let (lo, hi) = (xlimits[[j, 0]], xlimits[[j, 1]]);
            let mut bins: Vec<usize> = col
                .iter()
                .map(|v| (((v - lo) / (hi - lo)) * 8.).floor() as usize)
                .collect();
            bins.sort();
            assert_eq!(bins, (0..8).collect::<Vec<_>>());
        }

        let longer = Sobol::new(&xlimits).seed(7).sample(16);
        assert_eq!(longer.slice(s![..8, ..]), doe);
        let other = Sobol::new(&xlimits).seed(8).sample(8);
        assert_ne!(other, doe);
    }

    #[test]
    fn test_sampling_kind_from_str() {
        assert_eq!("LHS".parse::<SamplingKind>().unwrap(), SamplingKind::Lhs);
        assert_eq!("grid".parse::<SamplingKind>().unwrap(), SamplingKind::Grid);
        assert_eq!("Sobol".parse::<SamplingKind>().unwrap(), SamplingKind::Sobol);
        assert!("halton".parse::<SamplingKind>().is_err());
    }
}
