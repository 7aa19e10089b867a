//! Shared fixtures for integration tests: synthetic photos and GLB files

#![allow(dead_code, unreachable_pub)]

use image::{Rgb, RgbImage};
use serde_json::json;

/// Uniform light background with a saturated rectangle in the middle
///
/// The subject covers the central half of each dimension.
pub fn studio_photo(width: u32, height: u32) -> RgbImage {
    let (x0, x1) = (width / 4, width * 3 / 4);
    let (y0, y1) = (height / 4, height * 3 / 4);
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            Rgb([180, 60, 40])
        } else {
            Rgb([240, 240, 242])
        }
    })
}

/// Triangle mesh data for one glTF mesh
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub translation: Option<[f32; 3]>,
}

impl MeshData {
    /// Flat `nx` by `ny` vertex grid spanning `width` by `height` in the XY plane
    pub fn grid(name: &str, nx: u32, ny: u32, width: f32, height: f32) -> Self {
        let mut positions = Vec::with_capacity((nx * ny) as usize);
        for j in 0..ny {
            for i in 0..nx {
                positions.push([
                    i as f32 * width / (nx - 1) as f32,
                    j as f32 * height / (ny - 1) as f32,
                    0.0,
                ]);
            }
        }

        let mut indices = Vec::new();
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                let a = j * nx + i;
                let b = a + 1;
                let c = a + nx;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, d, a, d, c]);
            }
        }

        Self {
            name: name.to_string(),
            positions,
            indices,
            translation: None,
        }
    }

    /// Closed axis-aligned box with outward winding
    pub fn cuboid(name: &str, size: [f32; 3]) -> Self {
        let [sx, sy, sz] = size;
        let positions = (0..8)
            .map(|i| {
                [
                    if i & 1 == 0 { 0.0 } else { sx },
                    if i & 2 == 0 { 0.0 } else { sy },
                    if i & 4 == 0 { 0.0 } else { sz },
                ]
            })
            .collect();
        let indices = vec![
            0, 2, 3, 0, 3, 1, // bottom
            4, 5, 7, 4, 7, 6, // top
            0, 1, 5, 0, 5, 4, // front
            2, 6, 7, 2, 7, 3, // back
            0, 4, 6, 0, 6, 2, // left
            1, 3, 7, 1, 7, 5, // right
        ];
        Self {
            name: name.to_string(),
            positions,
            indices,
            translation: None,
        }
    }

    /// Every vertex at the same point
    pub fn collapsed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            positions: vec![[3.0, 3.0, 3.0]; 6],
            indices: vec![0, 1, 2, 3, 4, 5],
            translation: None,
        }
    }

    pub fn translated(mut self, offset: [f32; 3]) -> Self {
        self.translation = Some(offset);
        self
    }

    /// Drop the last `count` triangles
    pub fn without_last_faces(mut self, count: usize) -> Self {
        let keep = self.indices.len() - count * 3;
        self.indices.truncate(keep);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Assemble a binary glTF with one node per mesh in the default scene
pub fn build_glb(meshes: &[MeshData]) -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    let mut buffer_views = Vec::new();
    let mut accessors = Vec::new();
    let mut gltf_meshes = Vec::new();
    let mut nodes = Vec::new();

    for (index, mesh) in meshes.iter().enumerate() {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let position_offset = bin.len();
        for p in &mesh.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
                bin.extend_from_slice(&p[axis].to_le_bytes());
            }
        }
        let position_len = bin.len() - position_offset;

        let index_offset = bin.len();
        for i in &mesh.indices {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let index_len = bin.len() - index_offset;

        let view = buffer_views.len();
        buffer_views.push(json!({
            "buffer": 0, "byteOffset": position_offset, "byteLength": position_len, "target": 34962
        }));
        buffer_views.push(json!({
            "buffer": 0, "byteOffset": index_offset, "byteLength": index_len, "target": 34963
        }));

        let accessor = accessors.len();
        accessors.push(json!({
            "bufferView": view,
            "componentType": 5126,
            "count": mesh.positions.len(),
            "type": "VEC3",
            "min": min,
            "max": max
        }));
        accessors.push(json!({
            "bufferView": view + 1,
            "componentType": 5125,
            "count": mesh.indices.len(),
            "type": "SCALAR"
        }));

        gltf_meshes.push(json!({
            "name": mesh.name,
            "primitives": [{
                "attributes": { "POSITION": accessor },
                "indices": accessor + 1,
                "mode": 4
            }]
        }));

        let mut node = json!({ "mesh": index, "name": format!("{}_node", mesh.name) });
        if let Some(t) = mesh.translation {
            node["translation"] = json!(t);
        }
        nodes.push(node);
    }

    let document = json!({
        "asset": { "version": "2.0", "generator": "asset-prep tests" },
        "scene": 0,
        "scenes": [{ "nodes": (0..meshes.len()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": gltf_meshes,
        "accessors": accessors,
        "bufferViews": buffer_views,
        "buffers": [{ "byteLength": bin.len() }]
    });

    let mut json_chunk = serde_json::to_vec(&document).unwrap();
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json_chunk);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}
