//! STL reading and writing
//!
//! Export writes one facet per face with a normal computed from the triangle,
//! no colour or material attributes. Both binary (default) and ASCII are
//! supported in either direction.

use super::MeshGeometry;
use crate::{
    config::StlFormat,
    error::{PrepError, Result},
    services::io::write_atomic,
};
use glam::DVec3;
use std::io::Write;
use std::path::Path;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;
const SOLID_NAME: &str = "asset_prep";

/// Unit normal of a triangle; zero for degenerate triangles
#[must_use]
pub fn face_normal([a, b, c]: [DVec3; 3]) -> DVec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

/// Encode a mesh as binary STL
#[allow(clippy::indexing_slicing)] // Safe: offsets stay within the fixed-size header and record
pub fn write_binary<W: Write>(mesh: &MeshGeometry, writer: &mut W) -> Result<()> {
    let mut header = [0u8; HEADER_LEN];
    let label = b"binary STL written by asset-prep";
    header[..label.len()].copy_from_slice(label);
    writer.write_all(&header)?;

    let count = u32::try_from(mesh.faces.len()).map_err(|_| {
        PrepError::export(format!("{} faces exceed the STL facet limit", mesh.faces.len()))
    })?;
    writer.write_all(&count.to_le_bytes())?;

    let mut record = [0u8; FACET_LEN];
    for &face in &mesh.faces {
        let corners = mesh.triangle(face);
        let vectors = [face_normal(corners), corners[0], corners[1], corners[2]];
        for (i, v) in vectors.iter().enumerate() {
            for (j, component) in v.as_vec3().to_array().iter().enumerate() {
                let offset = i * 12 + j * 4;
                record[offset..offset + 4].copy_from_slice(&component.to_le_bytes());
            }
        }
        // Attribute byte count stays zero
        writer.write_all(&record)?;
    }
    Ok(())
}

/// Encode a mesh as ASCII STL
pub fn write_ascii<W: Write>(mesh: &MeshGeometry, writer: &mut W) -> Result<()> {
    writeln!(writer, "solid {}", SOLID_NAME)?;
    for &face in &mesh.faces {
        let corners = mesh.triangle(face);
        let n = face_normal(corners).as_vec3();
        writeln!(writer, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for corner in corners {
            let v = corner.as_vec3();
            writeln!(writer, "      vertex {:e} {:e} {:e}", v.x, v.y, v.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid {}", SOLID_NAME)?;
    Ok(())
}

/// Export a mesh to `path` atomically, returning the file size
pub fn write_stl<P: AsRef<Path>>(mesh: &MeshGeometry, path: P, format: StlFormat) -> Result<u64> {
    write_atomic(path, |writer| match format {
        StlFormat::Binary => write_binary(mesh, writer),
        StlFormat::Ascii => write_ascii(mesh, writer),
    })
}

/// Decode STL bytes, detecting binary or ASCII
///
/// Vertices are not shared between facets; weld afterwards if needed.
pub fn parse_stl(bytes: &[u8]) -> Result<MeshGeometry> {
    if is_binary(bytes) {
        parse_binary(bytes)
    } else {
        parse_ascii(bytes)
    }
}

/// Read an STL file
pub fn read_stl<P: AsRef<Path>>(path: P) -> Result<MeshGeometry> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| PrepError::input_load_error("mesh", path, &e))?;
    parse_stl(&bytes).map_err(|e| PrepError::input_load_error("mesh", path, &e))
}

#[allow(clippy::indexing_slicing)] // Safe: length checked against the header size first
fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let expected = count.checked_mul(FACET_LEN).and_then(|n| n.checked_add(HEADER_LEN + 4));
    expected == Some(bytes.len()) || !bytes.starts_with(b"solid")
}

#[allow(clippy::indexing_slicing)] // Safe: only called after is_binary; records come from chunks_exact
fn parse_binary(bytes: &[u8]) -> Result<MeshGeometry> {
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let body = &bytes[HEADER_LEN + 4..];
    if body.len() < count.saturating_mul(FACET_LEN) {
        return Err(PrepError::input_load(format!(
            "binary STL declares {} facets but holds {} bytes of facet data",
            count,
            body.len()
        )));
    }

    let read_vec = |chunk: &[u8]| {
        let f = |i: usize| {
            f64::from(f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]]))
        };
        DVec3::new(f(0), f(4), f(8))
    };

    let mut mesh = MeshGeometry::default();
    for record in body.chunks_exact(FACET_LEN).take(count) {
        let base = mesh.vertices.len() as u32;
        // Skip the stored normal
        for corner in 0..3 {
            let start = 12 + corner * 12;
            mesh.vertices.push(read_vec(&record[start..start + 12]));
        }
        mesh.faces.push([base, base + 1, base + 2]);
    }
    Ok(mesh)
}

fn parse_ascii(bytes: &[u8]) -> Result<MeshGeometry> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PrepError::input_load(format!("ASCII STL is not valid UTF-8: {}", e)))?;
    if !text.trim_start().starts_with("solid") {
        return Err(PrepError::input_load("not an STL file"));
    }

    let mut mesh = MeshGeometry::default();
    let mut pending = Vec::with_capacity(3);
    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let coords: Vec<f64> = tokens
                    .map(str::parse::<f64>)
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| {
                        PrepError::input_load(format!("line {}: bad vertex: {}", line_no + 1, e))
                    })?;
                let [x, y, z] = coords[..] else {
                    return Err(PrepError::input_load(format!(
                        "line {}: vertex needs three coordinates",
                        line_no + 1
                    )));
                };
                pending.push(DVec3::new(x, y, z));
            },
            Some("endloop") => {
                if pending.len() != 3 {
                    return Err(PrepError::input_load(format!(
                        "line {}: facet has {} vertices",
                        line_no + 1,
                        pending.len()
                    )));
                }
                let base = mesh.vertices.len() as u32;
                mesh.vertices.append(&mut pending);
                mesh.faces.push([base, base + 1, base + 2]);
            },
            _ => {},
        }
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn triangle() -> MeshGeometry {
        MeshGeometry::new(
            vec![DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), DVec3::new(0.0, 2.0, 0.0)],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_face_normal() {
        let n = face_normal([DVec3::ZERO, DVec3::X, DVec3::Y]);
        assert_relative_eq!(n.z, 1.0);
        assert_eq!(face_normal([DVec3::ZERO, DVec3::X, DVec3::X]), DVec3::ZERO);
    }

    #[test]
    fn test_binary_layout() {
        let mut bytes = Vec::new();
        write_binary(&triangle(), &mut bytes).unwrap();
        assert_eq!(bytes.len(), 84 + 50);
        assert_eq!(u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]), 1);
        // Normal z component
        assert_relative_eq!(f32::from_le_bytes([bytes[92], bytes[93], bytes[94], bytes[95]]), 1.0);
        assert!(is_binary(&bytes));
    }

    #[test]
    fn test_ascii_output_parses_back() {
        let mut bytes = Vec::new();
        write_ascii(&triangle(), &mut bytes).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("solid asset_prep"));
        assert_eq!(text.matches("facet normal").count(), 1);

        let mesh = parse_stl(&bytes).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_relative_eq!(mesh.vertices[1].x, 2.0);
    }

    #[test]
    fn test_write_stl_reports_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/model.stl");
        let size = write_stl(&triangle(), &path, StlFormat::Binary).unwrap();
        assert_eq!(size, 134);

        let mesh = read_stl(&path).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_truncated_binary_is_rejected() {
        let mut bytes = vec![0u8; 84];
        bytes[80] = 5;
        assert!(matches!(parse_stl(&bytes), Err(PrepError::InputLoad(_))));
    }
}
