//! Edge topology: watertightness checks and hole filling

use super::MeshGeometry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Undirected edge key, smaller index first
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn face_edges([a, b, c]: [u32; 3]) -> [(u32, u32); 3] {
    [(a, b), (b, c), (c, a)]
}

fn edge_usage(faces: &[[u32; 3]]) -> HashMap<(u32, u32), usize> {
    let mut usage = HashMap::with_capacity(faces.len() * 3 / 2);
    for &face in faces {
        for (a, b) in face_edges(face) {
            *usage.entry(edge_key(a, b)).or_insert(0) += 1;
        }
    }
    usage
}

/// Edge statistics of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeReport {
    pub edge_count: usize,
    /// Edges used by exactly one face
    pub boundary_edges: usize,
    /// Edges used by more than two faces
    pub non_manifold_edges: usize,
}

impl EdgeReport {
    #[must_use]
    pub fn analyze(mesh: &MeshGeometry) -> Self {
        let usage = edge_usage(&mesh.faces);
        Self {
            edge_count: usage.len(),
            boundary_edges: usage.values().filter(|&&n| n == 1).count(),
            non_manifold_edges: usage.values().filter(|&&n| n > 2).count(),
        }
    }

    /// Every edge shared by exactly two faces
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_count > 0 && self.boundary_edges == 0 && self.non_manifold_edges == 0
    }
}

#[must_use]
pub fn is_watertight(mesh: &MeshGeometry) -> bool {
    EdgeReport::analyze(mesh).is_watertight()
}

/// Closed chain of boundary vertices, in the direction the adjacent faces
/// traverse their edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Trace the closed boundary loops of a mesh
///
/// Open chains, which only occur around non-manifold vertices, are dropped.
#[must_use]
pub fn detect_holes(mesh: &MeshGeometry) -> Vec<BoundaryLoop> {
    let usage = edge_usage(&mesh.faces);
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut boundary: Vec<(u32, u32)> = Vec::new();
    for &face in &mesh.faces {
        for (a, b) in face_edges(face) {
            if usage.get(&edge_key(a, b)) == Some(&1) {
                outgoing.entry(a).or_default().push(b);
                boundary.push((a, b));
            }
        }
    }

    let mut used: HashSet<(u32, u32)> = HashSet::with_capacity(boundary.len());
    let mut loops = Vec::new();

    for &(start, first) in &boundary {
        if used.contains(&(start, first)) {
            continue;
        }
        used.insert((start, first));
        let mut vertices = vec![start];
        let mut current = first;
        let mut closed = false;

        while vertices.len() <= boundary.len() {
            if current == start {
                closed = true;
                break;
            }
            vertices.push(current);
            let next = outgoing
                .get(&current)
                .and_then(|targets| targets.iter().copied().find(|&t| !used.contains(&(current, t))));
            match next {
                Some(target) => {
                    used.insert((current, target));
                    current = target;
                },
                None => break,
            }
        }

        if closed && vertices.len() >= 3 {
            loops.push(BoundaryLoop { vertices });
        } else {
            trace!(length = vertices.len(), "Dropping open boundary chain");
        }
    }

    loops
}

/// Fill every boundary loop
pub fn fill_holes(mesh: &mut MeshGeometry) -> usize {
    fill_holes_with_max_edges(mesh, None)
}

/// Fan-triangulate boundary loops with at most `max_edges` edges
///
/// New faces wind opposite to the boundary edges so orientation stays
/// consistent. Only appends faces; returns the number of holes filled.
#[allow(clippy::indexing_slicing)] // Safe: windows(2) yields pairs
pub fn fill_holes_with_max_edges(mesh: &mut MeshGeometry, max_edges: Option<usize>) -> usize {
    let holes = detect_holes(mesh);
    let mut filled = 0;

    for hole in &holes {
        if max_edges.is_some_and(|max| hole.edge_count() > max) {
            debug!(edges = hole.edge_count(), "Hole exceeds size limit, leaving open");
            continue;
        }
        let Some((&hub, rest)) = hole.vertices.split_first() else {
            continue;
        };
        mesh.faces
            .extend(rest.windows(2).map(|pair| [hub, pair[1], pair[0]]));
        filled += 1;
    }

    debug!(found = holes.len(), filled, "Hole filling finished");
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    /// Closed tetrahedron with outward-facing, consistently wound faces
    fn tetrahedron() -> MeshGeometry {
        MeshGeometry::new(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        )
    }

    /// Unit cube missing its top two faces
    fn open_box() -> MeshGeometry {
        let vertices = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, 1.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(0.0, 1.0, 1.0),
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        MeshGeometry::new(vertices, faces)
    }

    #[test]
    fn test_tetrahedron_is_watertight() {
        let report = EdgeReport::analyze(&tetrahedron());
        assert_eq!(report.edge_count, 6);
        assert!(report.is_watertight());
        assert!(detect_holes(&tetrahedron()).is_empty());
    }

    #[test]
    fn test_missing_face_leaves_one_hole() {
        let mut mesh = tetrahedron();
        mesh.faces.pop();
        assert!(!is_watertight(&mesh));

        let holes = detect_holes(&mesh);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].edge_count(), 3);
    }

    #[test]
    fn test_fill_restores_watertightness() {
        let mut mesh = tetrahedron();
        let removed = mesh.faces.pop().unwrap();
        assert_eq!(fill_holes(&mut mesh), 1);

        assert!(is_watertight(&mesh));
        assert_eq!(mesh.face_count(), 4);
        // Winding matches the face that was removed, up to rotation
        let added = *mesh.faces.last().unwrap();
        let rotations = [
            removed,
            [removed[1], removed[2], removed[0]],
            [removed[2], removed[0], removed[1]],
        ];
        assert!(rotations.contains(&added));
    }

    #[test]
    fn test_open_box_square_hole() {
        let mut mesh = open_box();
        let before = (mesh.vertex_count(), mesh.face_count());

        let holes = detect_holes(&mesh);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].edge_count(), 4);

        assert_eq!(fill_holes(&mut mesh), 1);
        assert!(is_watertight(&mesh));
        assert_eq!(mesh.vertex_count(), before.0);
        assert_eq!(mesh.face_count(), before.1 + 2);
    }

    #[test]
    fn test_max_edges_leaves_large_holes() {
        let mut mesh = open_box();
        assert_eq!(fill_holes_with_max_edges(&mut mesh, Some(3)), 0);
        assert_eq!(mesh.face_count(), 10);
        assert!(!is_watertight(&mesh));
    }

    #[test]
    fn test_single_triangle_is_not_watertight() {
        let mesh = MeshGeometry::new(
            vec![DVec3::ZERO, DVec3::X, DVec3::Y],
            vec![[0, 1, 2]],
        );
        assert_eq!(EdgeReport::analyze(&mesh).boundary_edges, 3);
        assert!(!is_watertight(&mesh));
        assert!(!is_watertight(&MeshGeometry::default()));
    }
}
