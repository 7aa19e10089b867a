//! Triangle meshes: loading, merging, transforming and exporting
//!
//! A loaded file is either a single geometry or a scene of named geometries
//! ([`LoadedAsset`]). Scenes are merged into one [`MeshGeometry`] before any
//! measurement happens.

pub mod bounds;
pub mod gltf_read;
pub mod stl;
pub mod topology;

pub use bounds::BoundingBox;
pub use topology::{BoundaryLoop, EdgeReport};

use crate::error::{PrepError, Result};
use glam::{DMat4, DVec3};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<[u32; 3]>,
}

/// A geometry with the name of the mesh or node it came from
#[derive(Debug, Clone, PartialEq)]
pub struct NamedGeometry {
    pub name: String,
    pub geometry: MeshGeometry,
}

/// What a mesh file decodes to
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedAsset {
    Single(MeshGeometry),
    Scene(Vec<NamedGeometry>),
}

impl MeshGeometry {
    #[must_use]
    pub fn new(vertices: Vec<DVec3>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.vertices)
    }

    /// Corner positions of one face
    ///
    /// # Panics
    /// Panics if an index is out of range; see [`Self::validate_indices`].
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn triangle(&self, face: [u32; 3]) -> [DVec3; 3] {
        face.map(|i| self.vertices[i as usize])
    }

    /// Area-weighted centroid of the surface
    ///
    /// Falls back to the vertex mean when the surface has no area.
    #[must_use]
    pub fn centroid(&self) -> DVec3 {
        let mut weighted = DVec3::ZERO;
        let mut total_area = 0.0;
        for &face in &self.faces {
            let [a, b, c] = self.triangle(face);
            let area = (b - a).cross(c - a).length() * 0.5;
            weighted += (a + b + c) / 3.0 * area;
            total_area += area;
        }

        if total_area > f64::EPSILON && weighted.is_finite() {
            weighted / total_area
        } else if self.vertices.is_empty() {
            DVec3::ZERO
        } else {
            self.vertices.iter().copied().sum::<DVec3>() / self.vertices.len() as f64
        }
    }

    pub fn translate(&mut self, offset: DVec3) {
        for v in &mut self.vertices {
            *v += offset;
        }
    }

    /// Uniform scale about the origin
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.vertices {
            *v *= factor;
        }
    }

    pub fn transform(&mut self, matrix: &DMat4) {
        for v in &mut self.vertices {
            *v = matrix.transform_point3(*v);
        }
    }

    /// Check that every face index refers to an existing vertex
    pub fn validate_indices(&self) -> Result<()> {
        let count = self.vertices.len();
        if let Some(face) = self
            .faces
            .iter()
            .find(|face| face.iter().any(|&i| i as usize >= count))
        {
            return Err(PrepError::input_load(format!(
                "Face {:?} references a vertex beyond the {} available",
                face, count
            )));
        }
        Ok(())
    }

    /// Merge bit-identical vertices and drop faces that collapse as a result
    ///
    /// Returns the number of vertices removed.
    #[allow(clippy::indexing_slicing)] // Safe: remap holds one entry per vertex
    pub fn weld_vertices(&mut self) -> usize {
        let mut lookup: HashMap<[u64; 3], u32> = HashMap::with_capacity(self.vertices.len());
        let mut remap = Vec::with_capacity(self.vertices.len());
        let mut unique = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            // Normalise -0.0 so it welds with 0.0
            let key = (*v + DVec3::ZERO).to_array().map(f64::to_bits);
            let index = *lookup.entry(key).or_insert_with(|| {
                unique.push(*v);
                (unique.len() - 1) as u32
            });
            remap.push(index);
        }

        let removed = self.vertices.len() - unique.len();
        if removed > 0 {
            self.vertices = unique;
            self.faces = self
                .faces
                .iter()
                .map(|face| face.map(|i| remap[i as usize]))
                .filter(|[a, b, c]| a != b && b != c && a != c)
                .collect();
        }
        removed
    }

    /// Concatenate geometries, offsetting face indices
    ///
    /// Geometries without vertices are skipped.
    ///
    /// # Errors
    /// Returns [`PrepError::InputLoad`] when nothing usable remains.
    pub fn merge<'a, I>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a MeshGeometry>,
    {
        let mut merged = Self::default();
        for part in parts {
            if part.is_empty() {
                continue;
            }
            let offset = merged.vertices.len() as u32;
            merged.vertices.extend_from_slice(&part.vertices);
            merged
                .faces
                .extend(part.faces.iter().map(|face| face.map(|i| i + offset)));
        }

        if merged.is_empty() {
            return Err(PrepError::input_load("Mesh contains no usable geometry"));
        }
        Ok(merged)
    }
}

impl LoadedAsset {
    /// Collapse into a single geometry
    pub fn into_geometry(self) -> Result<MeshGeometry> {
        match self {
            Self::Single(geometry) if geometry.is_empty() => {
                Err(PrepError::input_load("Mesh contains no vertices"))
            },
            Self::Single(geometry) => Ok(geometry),
            Self::Scene(parts) => {
                for part in &parts {
                    debug!(
                        name = %part.name,
                        vertices = part.geometry.vertex_count(),
                        faces = part.geometry.face_count(),
                        "Scene geometry"
                    );
                }
                MeshGeometry::merge(parts.iter().map(|part| &part.geometry))
            },
        }
    }

    /// Number of geometries in the asset
    #[must_use]
    pub fn geometry_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Scene(parts) => parts.len(),
        }
    }
}

/// Load a mesh file, choosing the decoder from the extension
pub fn load_asset<P: AsRef<Path>>(path: P, weld: bool) -> Result<LoadedAsset> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "glb" | "gltf" => gltf_read::load(path, weld),
        "stl" => {
            let mut geometry = stl::read_stl(path)?;
            if weld {
                geometry.weld_vertices();
            }
            Ok(LoadedAsset::Single(geometry))
        },
        other => Err(PrepError::unsupported_format(format!(
            "Unsupported mesh format '{}' for {}",
            other,
            path.display()
        ))),
    }
}
