//! glTF 2.0 reading (`.glb` and `.gltf` with embedded or external buffers)

use super::{LoadedAsset, MeshGeometry, NamedGeometry};
use crate::error::{PrepError, Result};
use glam::{DMat4, DVec3, Mat4};
use gltf::mesh::Mode;
use std::path::Path;
use tracing::{debug, warn};

/// Load every triangle primitive reachable from the default scene
///
/// Node transforms are applied, so the result is in scene space. When the
/// document has no scene, every mesh is loaded untransformed.
pub fn load(path: &Path, weld: bool) -> Result<LoadedAsset> {
    let bytes = std::fs::read(path).map_err(|e| PrepError::input_load_error("mesh", path, &e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    load_from_slice(&bytes, Some(base), weld)
        .map_err(|e| match e {
            PrepError::InputLoad(msg) => PrepError::input_load_error("mesh", path, &msg),
            other => other,
        })
}

/// Load from an in-memory document; `base` resolves external buffer URIs
pub fn load_from_slice(bytes: &[u8], base: Option<&Path>, weld: bool) -> Result<LoadedAsset> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(bytes).map_err(|e| PrepError::input_load(e.to_string()))?;
    let buffers = gltf::import_buffers(&document, base, blob)
        .map_err(|e| PrepError::input_load(format!("buffer import failed: {}", e)))?;

    let mut collector = Collector {
        buffers: &buffers,
        weld,
        geometries: Vec::new(),
    };

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            debug!(scene = scene.index(), name = scene.name().unwrap_or(""), "Reading scene");
            for node in scene.nodes() {
                collector.visit(&node, DMat4::IDENTITY)?;
            }
        },
        None => {
            for mesh in document.meshes() {
                collector.add_mesh(&mesh, None, &DMat4::IDENTITY)?;
            }
        },
    }

    Ok(LoadedAsset::Scene(collector.geometries))
}

struct Collector<'a> {
    buffers: &'a [gltf::buffer::Data],
    weld: bool,
    geometries: Vec<NamedGeometry>,
}

impl Collector<'_> {
    fn visit(&mut self, node: &gltf::Node<'_>, parent: DMat4) -> Result<()> {
        let local = Mat4::from_cols_array_2d(&node.transform().matrix()).as_dmat4();
        let world = parent * local;

        if let Some(mesh) = node.mesh() {
            self.add_mesh(&mesh, node.name(), &world)?;
        }
        for child in node.children() {
            self.visit(&child, world)?;
        }
        Ok(())
    }

    fn add_mesh(
        &mut self,
        mesh: &gltf::Mesh<'_>,
        node_name: Option<&str>,
        world: &DMat4,
    ) -> Result<()> {
        let base_name = mesh
            .name()
            .or(node_name)
            .map_or_else(|| format!("mesh_{}", mesh.index()), str::to_string);
        let primitive_count = mesh.primitives().len();
        let buffers = self.buffers;

        for primitive in mesh.primitives() {
            let name = if primitive_count > 1 {
                format!("{}_{}", base_name, primitive.index())
            } else {
                base_name.clone()
            };

            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                warn!(name = %name, "Primitive has no positions, skipping");
                continue;
            };
            let vertices: Vec<DVec3> = positions
                .map(|[x, y, z]| DVec3::new(f64::from(x), f64::from(y), f64::from(z)))
                .collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };

            let Some(faces) = triangulate(primitive.mode(), &indices) else {
                debug!(name = %name, mode = ?primitive.mode(), "Skipping non-triangle primitive");
                continue;
            };

            let mut geometry = MeshGeometry::new(vertices, faces);
            geometry.validate_indices()?;
            geometry.transform(world);
            if self.weld {
                geometry.weld_vertices();
            }
            self.geometries.push(NamedGeometry { name, geometry });
        }
        Ok(())
    }
}

/// Expand an index list into triangles; `None` for point and line modes
#[allow(clippy::indexing_slicing)] // Safe: chunks_exact and windows fix the slice lengths
fn triangulate(mode: Mode, indices: &[u32]) -> Option<Vec<[u32; 3]>> {
    let faces = match mode {
        Mode::Triangles => indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    [w[0], w[1], w[2]]
                } else {
                    [w[0], w[2], w[1]]
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&hub, rest)) => rest.windows(2).map(|w| [w[0], w[1], hub]).collect(),
            None => Vec::new(),
        },
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => return None,
    };
    Some(faces)
}
