//! Raster → vector: trace the set cells of a [`FloodMask`] into polygons.
//!
//! Each 4-connected region of set cells becomes one polygon whose rings follow
//! cell edges exactly (no interpolation, no smoothing), so the polygon area
//! equals the region's cell count × cell area. Enclosed unset cells become
//! holes. Unset regions never produce geometry.
//!
//! Steps:
//! 1. Label 4-connected components of set cells.
//! 2. Emit every cell side that borders a cell outside the component as a
//!    directed edge, walking each cell TL → TR → BR → BL in (col, row) space.
//! 3. Chain edges into closed rings. Where two cells of one component meet
//!    only at a corner (a pinch vertex) the ring keeps hugging the current
//!    cell, so diagonal neighbours are not fused.
//! 4. Drop collinear vertices, classify rings by signed area (positive =
//!    exterior, negative = hole) and map corners through the geotransform.

use std::collections::HashMap;

use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, Polygon};

use crate::mask::FloodMask;
use crate::terrain::GeoTransform;

/// Grid corner `(col, row)`.
type Vertex = (u32, u32);

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn dir(&self) -> (i32, i32) {
        (
            self.to.0 as i32 - self.from.0 as i32,
            self.to.1 as i32 - self.from.1 as i32,
        )
    }
}

/// Trace all set regions of `mask` into world-space polygons.
pub fn polygonize(mask: &FloodMask, transform: &GeoTransform) -> Vec<Polygon<f64>> {
    let (labels, n_components) = label_components(mask);
    if n_components == 0 {
        return Vec::new();
    }
    let edges = boundary_edges(mask, &labels, n_components);

    let mut polygons = Vec::with_capacity(n_components);
    for component_edges in &edges {
        let rings = trace_rings(component_edges);

        let mut exteriors: Vec<(i64, Vec<Vertex>)> = Vec::new();
        let mut holes: Vec<Vec<Vertex>> = Vec::new();
        for ring in rings {
            let area2 = signed_area2(&ring);
            if area2 > 0 {
                exteriors.push((area2, ring));
            } else if area2 < 0 {
                holes.push(ring);
            }
        }
        // A 4-connected region has exactly one outer boundary.
        debug_assert_eq!(exteriors.len(), 1, "component traced to {} exteriors", exteriors.len());
        exteriors.sort_by(|a, b| b.0.cmp(&a.0));

        let mut exteriors = exteriors.into_iter();
        let Some((_, outer)) = exteriors.next() else {
            continue;
        };
        let interiors = holes.iter().map(|h| to_world(h, transform)).collect();
        polygons.push(Polygon::new(to_world(&outer, transform), interiors).orient(Direction::Default));
        for (_, extra) in exteriors {
            polygons.push(Polygon::new(to_world(&extra, transform), Vec::new()).orient(Direction::Default));
        }
    }
    polygons
}

// ── Component labelling ───────────────────────────────────────────────────────

/// 4-connected labels, 0 = unset, components numbered from 1.
fn label_components(mask: &FloodMask) -> (Vec<u32>, usize) {
    let w = mask.width();
    let h = mask.height();
    let mut labels = vec![0u32; w * h];
    let mut next = 0u32;
    let mut stack = Vec::new();

    for start in 0..w * h {
        if !mask.cells()[start] || labels[start] != 0 {
            continue;
        }
        next += 1;
        labels[start] = next;
        stack.push(start);
        while let Some(idx) = stack.pop() {
            let r = idx / w;
            let c = idx % w;
            let mut visit = |n: usize| {
                if mask.cells()[n] && labels[n] == 0 {
                    labels[n] = next;
                    stack.push(n);
                }
            };
            if r > 0 {
                visit(idx - w);
            }
            if r + 1 < h {
                visit(idx + w);
            }
            if c > 0 {
                visit(idx - 1);
            }
            if c + 1 < w {
                visit(idx + 1);
            }
        }
    }
    (labels, next as usize)
}

// ── Boundary edges ────────────────────────────────────────────────────────────

fn boundary_edges(mask: &FloodMask, labels: &[u32], n_components: usize) -> Vec<Vec<Edge>> {
    let w = mask.width();
    let h = mask.height();
    let mut edges = vec![Vec::new(); n_components];
    let label_at = |r: isize, c: isize| -> u32 {
        if r < 0 || c < 0 || r >= h as isize || c >= w as isize {
            0
        } else {
            labels[r as usize * w + c as usize]
        }
    };

    for r in 0..h {
        for c in 0..w {
            let label = labels[r * w + c];
            if label == 0 {
                continue;
            }
            let out = &mut edges[label as usize - 1];
            let (ri, ci) = (r as isize, c as isize);
            let (c0, c1, r0, r1) = (c as u32, c as u32 + 1, r as u32, r as u32 + 1);
            if label_at(ri - 1, ci) != label {
                out.push(Edge { from: (c0, r0), to: (c1, r0) });
            }
            if label_at(ri, ci + 1) != label {
                out.push(Edge { from: (c1, r0), to: (c1, r1) });
            }
            if label_at(ri + 1, ci) != label {
                out.push(Edge { from: (c1, r1), to: (c0, r1) });
            }
            if label_at(ri, ci - 1) != label {
                out.push(Edge { from: (c0, r1), to: (c0, r0) });
            }
        }
    }
    edges
}

// ── Ring tracing ──────────────────────────────────────────────────────────────

/// Chain directed edges into closed, simplified rings. Each returned ring lists
/// its corners once; the closing vertex is implied.
fn trace_rings(edges: &[Edge]) -> Vec<Vec<Vertex>> {
    // At most two boundary edges of one component leave any corner.
    let mut outgoing: HashMap<Vertex, (usize, Option<usize>)> = HashMap::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        outgoing
            .entry(e.from)
            .and_modify(|slot| slot.1 = Some(i))
            .or_insert((i, None));
    }

    let successor = |i: usize| -> usize {
        let e = edges[i];
        let (first, second) = outgoing[&e.to];
        match second {
            None => first,
            Some(second) => {
                // Pinch: take the turn with the same sense as the cell walk.
                let (dx, dy) = e.dir();
                let (ox, oy) = edges[first].dir();
                if dx * oy - dy * ox > 0 {
                    first
                } else {
                    second
                }
            }
        }
    };

    let mut visited = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in 0..edges.len() {
        if visited[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut cur = start;
        loop {
            visited[cur] = true;
            ring.push(edges[cur]);
            cur = successor(cur);
            if cur == start {
                break;
            }
        }
        rings.push(simplify(&ring));
    }
    rings
}

/// Keep only corners where the walking direction changes.
fn simplify(ring: &[Edge]) -> Vec<Vertex> {
    let n = ring.len();
    (0..n)
        .filter(|&i| ring[(i + n - 1) % n].dir() != ring[i].dir())
        .map(|i| ring[i].from)
        .collect()
}

/// Twice the signed shoelace area in (col, row) space.
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = (i64::from(ring[i].0), i64::from(ring[i].1));
            let (x1, y1) = (i64::from(ring[(i + 1) % n].0), i64::from(ring[(i + 1) % n].1));
            x0 * y1 - x1 * y0
        })
        .sum()
}

fn to_world(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|&(c, r)| {
            let (x, y) = transform.apply(f64::from(c), f64::from(r));
            Coord { x, y }
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn mask(rows: &[&str]) -> FloodMask {
        let height = rows.len();
        let width = rows[0].len();
        let cells = rows.iter().flat_map(|r| r.chars().map(|ch| ch == '#')).collect();
        FloodMask::new(cells, width, height).unwrap()
    }

    fn unit(height: usize) -> GeoTransform {
        GeoTransform::north_up(0.0, height as f64, 1.0)
    }

    fn total_area(polys: &[Polygon<f64>]) -> f64 {
        polys.iter().map(|p| p.unsigned_area()).sum()
    }

    #[test]
    fn empty_mask_yields_nothing() {
        assert!(polygonize(&FloodMask::empty(4, 3), &unit(3)).is_empty());
    }

    #[test]
    fn single_cell_is_a_square() {
        let m = mask(&["...", ".#.", "..."]);
        let polys = polygonize(&m, &unit(3));
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].exterior().0.len(), 5, "4 corners + closing point");
        assert!((polys[0].unsigned_area() - 1.0).abs() < 1e-12);
        // Cell (row 1, col 1) of a 3-row north-up grid spans x 1..2, y 1..2.
        let xs: Vec<f64> = polys[0].exterior().coords().map(|c| c.x).collect();
        let ys: Vec<f64> = polys[0].exterior().coords().map(|c| c.y).collect();
        assert!(xs.iter().all(|&x| x == 1.0 || x == 2.0));
        assert!(ys.iter().all(|&y| y == 1.0 || y == 2.0));
    }

    #[test]
    fn collinear_corners_are_merged() {
        let m = mask(&["###", "#..", "#.."]);
        let polys = polygonize(&m, &unit(3));
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].exterior().0.len(), 7, "L-shape has 6 corners");
        assert!((polys[0].unsigned_area() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn enclosed_dry_cell_becomes_hole() {
        let m = mask(&["###", "#.#", "###"]);
        let polys = polygonize(&m, &unit(3));
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].interiors().len(), 1);
        assert!((polys[0].unsigned_area() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn diagonal_neighbours_stay_separate() {
        let m = mask(&["#.", ".#"]);
        let polys = polygonize(&m, &unit(2));
        assert_eq!(polys.len(), 2);
        for p in &polys {
            assert!((p.unsigned_area() - 1.0).abs() < 1e-12);
            assert!(p.interiors().is_empty());
        }
    }

    #[test]
    fn pinch_on_outer_boundary_keeps_one_polygon() {
        // Dry centre cell is open to the outside only through a corner.
        let m = mask(&[".##", "#.#", "###"]);
        let polys = polygonize(&m, &unit(3));
        assert_eq!(polys.len(), 1);
        assert!((total_area(&polys) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn disconnected_regions_each_get_a_polygon() {
        let m = mask(&["##..#", "##..#", ".....", "..###"]);
        let polys = polygonize(&m, &unit(4));
        assert_eq!(polys.len(), 3);
        assert!((total_area(&polys) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn transform_scales_area() {
        let m = mask(&["##", "##"]);
        let t = GeoTransform::north_up(450_000.0, 70_000.0, 2.5);
        let polys = polygonize(&m, &t);
        assert!((total_area(&polys) - 4.0 * 6.25).abs() < 1e-6);
    }

    #[test]
    fn random_masks_preserve_cell_area() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let w = rng.gen_range(1..12);
            let h = rng.gen_range(1..12);
            let cells: Vec<bool> = (0..w * h).map(|_| rng.gen_bool(0.55)).collect();
            let m = FloodMask::new(cells, w, h).unwrap();
            let polys = polygonize(&m, &unit(h));
            assert!(
                (total_area(&polys) - m.count() as f64).abs() < 1e-9,
                "{w}×{h}: area {} vs {} cells",
                total_area(&polys),
                m.count()
            );
        }
    }
}
