//! Delaunay triangulation in any dimension (Bowyer-Watson insertion).
//!
//! The triangulation is closed with a vertex at infinity: each facet of the convex hull
//! carries an infinite cell standing for the region beyond it. A new point removes the
//! cells in conflict with it, finite cells whose circumsphere contains it and infinite
//! cells whose hull facet it lies strictly beyond. The cavity is then filled with the
//! cells joining the point to the cavity boundary facets.
//!
//! Co-spherical or coplanar points may leave a cavity which is not star-shaped from the
//! new point. The cavity is grown across every boundary facet the point does not
//! strictly see, so that no flat cell is ever created.
use crate::errors::{AdaptiveError, Result};
use linfa_linalg::qr::*;
use linfa_linalg::triangular::*;
use log::{trace, warn};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use std::collections::{BTreeMap, BTreeSet};

/// Relative tolerance of the in-sphere and orientation predicates
const PREDICATE_TOL: f64 = 1e-10;

struct Cell {
    /// Sorted vertices, the vertex at infinity last for infinite cells
    vertices: Vec<usize>,
    /// Circumsphere center and squared radius, `None` for infinite cells
    sphere: Option<(Array1<f64>, f64)>,
}

struct Triangulation {
    coords: Array2<f64>,
    /// Index of the vertex at infinity, above every point index
    infinity: usize,
    cells: Vec<Option<Cell>>,
    /// Cells sharing each facet
    facets: BTreeMap<Vec<usize>, Vec<usize>>,
}

/// Facets of a cell with their opposite vertex
fn facets_of(vertices: &[usize]) -> impl Iterator<Item = (Vec<usize>, usize)> + '_ {
    (0..vertices.len()).map(move |j| {
        let mut facet = vertices.to_vec();
        let opposite = facet.remove(j);
        (facet, opposite)
    })
}

impl Triangulation {
    fn new(coords: Array2<f64>) -> Self {
        let infinity = coords.nrows();
        Triangulation {
            coords,
            infinity,
            cells: Vec::new(),
            facets: BTreeMap::new(),
        }
    }

    fn vertices(&self, id: usize) -> &[usize] {
        self.cells[id]
            .as_ref()
            .map(|c| c.vertices.as_slice())
            .unwrap_or_default()
    }

    fn is_infinite(&self, vertices: &[usize]) -> bool {
        vertices.last() == Some(&self.infinity)
    }

    fn add_cell(&mut self, mut vertices: Vec<usize>) -> Result<()> {
        vertices.sort_unstable();
        let sphere = if self.is_infinite(&vertices) {
            None
        } else {
            let sphere = circumsphere(&self.coords, &vertices)?.ok_or_else(|| {
                AdaptiveError::DegenerateGeometry(format!("cell {vertices:?} is flat"))
            })?;
            Some(sphere)
        };
        let id = self.cells.len();
        for (facet, _) in facets_of(&vertices) {
            self.facets.entry(facet).or_default().push(id);
        }
        self.cells.push(Some(Cell { vertices, sphere }));
        Ok(())
    }

    fn remove_cell(&mut self, id: usize) {
        if let Some(cell) = self.cells[id].take() {
            for (facet, _) in facets_of(&cell.vertices) {
                if let Some(ids) = self.facets.get_mut(&facet) {
                    ids.retain(|c| *c != id);
                    if ids.is_empty() {
                        self.facets.remove(&facet);
                    }
                }
            }
        }
    }

    /// The other cell sharing `facet` with the cell `id`
    fn neighbor(&self, id: usize, facet: &[usize]) -> Option<usize> {
        self.facets
            .get(facet)
            .and_then(|ids| ids.iter().copied().find(|c| *c != id))
    }

    /// Vertex of the cell `id` which is not in `facet`
    fn opposite(&self, id: usize, facet: &[usize]) -> Option<usize> {
        self.vertices(id).iter().copied().find(|v| !facet.contains(v))
    }

    /// Signed volume (up to `d!`) of the simplex made of the finite `facet` and point `x`
    fn orientation(&self, facet: &[usize], x: usize) -> f64 {
        let d = self.coords.ncols();
        let f0 = self.coords.row(facet[0]);
        let mut m = Array2::<f64>::zeros((d, d));
        for (k, v) in facet[1..].iter().enumerate() {
            m.row_mut(k).assign(&(&self.coords.row(*v) - &f0));
        }
        m.row_mut(d - 1).assign(&(&self.coords.row(x) - &f0));
        determinant(m)
    }

    /// Height of `x` above the hyperplane of `facet` relative to the one of `reference`.
    /// Negative when they lie on opposite sides.
    fn height_ratio(&self, facet: &[usize], x: usize, reference: usize) -> f64 {
        self.orientation(facet, x) / self.orientation(facet, reference)
    }

    /// Volume (up to `(k - 1)!`) of the `k` vertices simplex in its own affine hull
    fn gram_volume(&self, vertices: &[usize]) -> f64 {
        if vertices.len() < 2 {
            return 1.;
        }
        let p0 = self.coords.row(vertices[0]);
        let edges = Array2::from_shape_fn((vertices.len() - 1, self.coords.ncols()), |(k, j)| {
            self.coords[[vertices[k + 1], j]] - p0[j]
        });
        determinant(edges.dot(&edges.t())).max(0.).sqrt()
    }

    fn is_independent(&self, vertices: &[usize]) -> bool {
        let p0 = self.coords.row(vertices[0]);
        let lengths: f64 = vertices[1..]
            .iter()
            .map(|v| {
                let e = &self.coords.row(*v) - &p0;
                e.dot(&e).sqrt()
            })
            .product();
        lengths > 0. && self.gram_volume(vertices) > PREDICATE_TOL * lengths
    }

    /// Vertex of the finite cell lying on the inner side of the hull facet of an infinite cell
    fn inner_vertex(&self, id: usize, hull_facet: &[usize]) -> Option<usize> {
        self.neighbor(id, hull_facet)
            .and_then(|nb| self.opposite(nb, hull_facet))
    }

    fn in_conflict(&self, id: usize, p: usize) -> bool {
        let Some(cell) = self.cells[id].as_ref() else {
            return false;
        };
        match &cell.sphere {
            Some((center, r2)) => {
                let d = &self.coords.row(p) - center;
                d.dot(&d) < r2 * (1. - PREDICATE_TOL)
            }
            None => {
                let hull_facet = &cell.vertices[..cell.vertices.len() - 1];
                self.inner_vertex(id, hull_facet)
                    .map_or(false, |b| self.height_ratio(hull_facet, p, b) < -PREDICATE_TOL)
            }
        }
    }

    /// Whether `p` strictly sees the cavity boundary `facet` (`opposite` being the vertex
    /// of the cavity cell, `outer` the cell across): the cell joining them lies on the
    /// cavity side and is not flat.
    fn is_visible(&self, facet: &[usize], opposite: usize, outer: usize, p: usize) -> bool {
        let Some(outer_vertex) = self.opposite(outer, facet) else {
            return false;
        };
        if self.is_infinite(facet) {
            let ridge = &facet[..facet.len() - 1];
            let with = |v: usize| {
                let mut hull_facet = ridge.to_vec();
                hull_facet.push(v);
                self.gram_volume(&hull_facet)
            };
            with(p) > PREDICATE_TOL * with(outer_vertex)
        } else if opposite == self.infinity {
            self.height_ratio(facet, p, outer_vertex) < -PREDICATE_TOL
        } else {
            self.height_ratio(facet, p, opposite) > PREDICATE_TOL
        }
    }

    /// Cell containing `p`, or an infinite cell whose hull facet `p` is beyond
    fn locate(&self, p: usize) -> Option<usize> {
        let mut inside: Option<(usize, f64)> = None;
        let mut beyond: Option<(usize, f64)> = None;
        for (id, cell) in self.cells.iter().enumerate() {
            let Some(cell) = cell else { continue };
            if cell.sphere.is_some() {
                let lambda = facets_of(&cell.vertices)
                    .map(|(facet, opposite)| self.height_ratio(&facet, p, opposite))
                    .fold(f64::INFINITY, f64::min);
                if inside.map_or(true, |(_, best)| lambda > best) {
                    inside = Some((id, lambda));
                }
            } else {
                let hull_facet = &cell.vertices[..cell.vertices.len() - 1];
                if let Some(b) = self.inner_vertex(id, hull_facet) {
                    let ratio = self.height_ratio(hull_facet, p, b);
                    if beyond.map_or(true, |(_, best)| ratio < best) {
                        beyond = Some((id, ratio));
                    }
                }
            }
        }
        match (inside, beyond) {
            (Some((id, lambda)), _) if lambda >= -PREDICATE_TOL => Some(id),
            (_, Some((id, ratio))) if ratio < -PREDICATE_TOL => Some(id),
            _ => None,
        }
    }

    fn insert(&mut self, p: usize) -> Result<()> {
        let Some(seed) = self.locate(p) else {
            warn!("Point {p} cannot be located, skipped");
            return Ok(());
        };

        let mut cavity = BTreeSet::from([seed]);
        let mut stack = vec![seed];
        while let Some(id) = stack.pop() {
            for (facet, _) in facets_of(self.vertices(id)) {
                if let Some(nb) = self.neighbor(id, &facet) {
                    if !cavity.contains(&nb) && self.in_conflict(nb, p) {
                        cavity.insert(nb);
                        stack.push(nb);
                    }
                }
            }
        }

        loop {
            let mut hidden = BTreeSet::new();
            for &id in cavity.iter() {
                for (facet, opposite) in facets_of(self.vertices(id)) {
                    if let Some(nb) = self.neighbor(id, &facet) {
                        if !cavity.contains(&nb) && !self.is_visible(&facet, opposite, nb, p) {
                            hidden.insert(nb);
                        }
                    }
                }
            }
            if hidden.is_empty() {
                break;
            }
            trace!("Point {p}: cavity grown with {hidden:?}");
            cavity.extend(hidden);
        }
        if cavity.len() == self.cells.iter().flatten().count() {
            return Err(AdaptiveError::DegenerateGeometry(format!(
                "point {p} cannot be inserted"
            )));
        }

        let mut boundary = Vec::new();
        for &id in cavity.iter() {
            for (facet, _) in facets_of(self.vertices(id)) {
                if self
                    .neighbor(id, &facet)
                    .map_or(false, |nb| !cavity.contains(&nb))
                {
                    boundary.push(facet);
                }
            }
        }
        for &id in cavity.iter() {
            self.remove_cell(id);
        }
        for mut vertices in boundary {
            vertices.push(p);
            self.add_cell(vertices)?;
        }
        Ok(())
    }

    /// First `d + 1` affinely independent points in rows order
    fn initial_simplex(&self) -> Option<Vec<usize>> {
        let (n, d) = self.coords.dim();
        let mut simplex = vec![0];
        for i in 1..n {
            if simplex.len() == d + 1 {
                break;
            }
            simplex.push(i);
            if !self.is_independent(&simplex) {
                simplex.pop();
            }
        }
        (simplex.len() == d + 1).then_some(simplex)
    }
}

/// Delaunay simplices of the (n, d) points, given as sorted lists of `d + 1` row indices.
///
/// Points are expected distinct. An affinely dependent point set gives no simplex.
/// The simplices cover the convex hull of the points.
pub(crate) fn triangulate(
    points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Result<Vec<Vec<usize>>> {
    let (n, d) = points.dim();
    if n < d + 1 {
        return Ok(Vec::new());
    }
    let mut tri = Triangulation::new(points.to_owned());
    let Some(simplex) = tri.initial_simplex() else {
        warn!("Points are affinely dependent");
        return Ok(Vec::new());
    };
    for (mut facet, _) in facets_of(&simplex) {
        facet.push(tri.infinity);
        tri.add_cell(facet)?;
    }
    tri.add_cell(simplex.clone())?;

    for i in (0..n).filter(|i| !simplex.contains(i)) {
        tri.insert(i)?;
        trace!("Inserted point {i}: {} cells", tri.cells.iter().flatten().count());
    }

    Ok(tri
        .cells
        .into_iter()
        .flatten()
        .filter(|c| c.sphere.is_some())
        .map(|c| c.vertices)
        .collect())
}

/// Determinant by gaussian elimination with partial pivoting
fn determinant(mut m: Array2<f64>) -> f64 {
    let n = m.nrows();
    let mut det = 1.;
    for k in 0..n {
        let pivot = (k..n)
            .max_by(|&i, &j| m[[i, k]].abs().total_cmp(&m[[j, k]].abs()))
            .unwrap_or(k);
        if m[[pivot, k]] == 0. {
            return 0.;
        }
        if pivot != k {
            for j in 0..n {
                m.swap([k, j], [pivot, j]);
            }
            det = -det;
        }
        let diag = m[[k, k]];
        det *= diag;
        for i in k + 1..n {
            let factor = m[[i, k]] / diag;
            for j in k..n {
                let v = factor * m[[k, j]];
                m[[i, j]] -= v;
            }
        }
    }
    det
}

/// Circumsphere center and squared radius of the simplex, `None` when it is flat.
///
/// The center `p_0 + u` solves `(p_k - p_0) . u = |p_k - p_0|^2 / 2` for `k = 1..=d`.
fn circumsphere(
    coords: &Array2<f64>,
    vertices: &[usize],
) -> Result<Option<(Array1<f64>, f64)>> {
    let d = coords.ncols();
    let p0 = coords.row(vertices[0]);
    let mut a = Array2::<f64>::zeros((d, d));
    let mut b = Array2::<f64>::zeros((d, 1));
    for (k, v) in vertices[1..].iter().enumerate() {
        let e = &coords.row(*v) - &p0;
        b[[k, 0]] = e.dot(&e) / 2.;
        a.row_mut(k).assign(&e);
    }
    let (q, r) = a.qr()?.into_decomp();
    if !is_full_rank(&r) {
        return Ok(None);
    }
    let u = r.solve_triangular(&q.t().dot(&b), UPLO::Upper)?;
    let u = u.column(0);
    Ok(Some((&p0 + &u, u.dot(&u))))
}

fn is_full_rank(r: &Array2<f64>) -> bool {
    let diag = r.diag().mapv(f64::abs);
    let max = diag.fold(0., |m: f64, v| m.max(*v));
    max > 0. && diag.iter().all(|v| *v > 1e-12 * max)
}

/// Volume `|det(V)| / d!` of the simplex, `V` being its edges relative to the last vertex
pub(crate) fn simplex_volume(
    points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    vertices: &[usize],
) -> Result<f64> {
    let d = points.ncols();
    let last = points.row(vertices[d]);
    let mut edges = Array2::<f64>::zeros((d, d));
    for (k, v) in vertices[..d].iter().enumerate() {
        edges.row_mut(k).assign(&(&points.row(*v) - &last));
    }
    let (_, r) = edges.qr()?.into_decomp();
    let det: f64 = r.diag().iter().map(|v| v.abs()).product();
    let factorial: f64 = (1..=d).map(|k| k as f64).product();
    Ok(det / factorial)
}
