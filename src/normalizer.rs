//! Mesh normalization for printing
//!
//! Merges a scene into one mesh, centres it on the origin, scales it so the
//! largest bounding-box extent matches the target size in millimetres, fills
//! holes when possible and exports STL.

use crate::{
    config::NormalizationConfig,
    error::{PrepError, Result},
    mesh::{self, stl, topology, LoadedAsset, MeshGeometry},
    services::{ProcessingStage, ProgressTracker},
    tracing_config::{events, spans},
    types::{NormalizationReport, NormalizationResult},
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Geometry after centring and scaling, before repair and export
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledMesh {
    pub mesh: MeshGeometry,
    pub original_extents: [f64; 3],
    pub new_extents: [f64; 3],
    pub scale_factor: f64,
}

/// Centre `mesh` on its centroid and scale its largest extent to `target_size`
///
/// # Errors
/// [`PrepError::DegenerateGeometry`] when the mesh has no vertices, a zero or
/// non-finite largest extent, or the scale factor is not finite.
pub fn center_and_scale(mut mesh: MeshGeometry, target_size: f64) -> Result<ScaledMesh> {
    let bounds = mesh
        .bounds()
        .ok_or_else(|| PrepError::degenerate_geometry("mesh has no vertices"))?;
    let original = bounds.extents();
    let max_extent = bounds.max_extent();

    if !max_extent.is_finite() || max_extent <= 0.0 {
        return Err(PrepError::degenerate_geometry(format!(
            "largest extent is {} (extents {:?})",
            max_extent,
            original.to_array()
        )));
    }
    let scale_factor = target_size / max_extent;
    if !scale_factor.is_finite() {
        return Err(PrepError::degenerate_geometry(format!(
            "scale factor {} / {} is not finite",
            target_size, max_extent
        )));
    }
    debug!(max_extent, scale_factor, "Scaling mesh");

    let centroid = mesh.centroid();
    mesh.translate(-centroid);
    mesh.scale(scale_factor);

    let new_extents = mesh
        .bounds()
        .map_or([0.0; 3], |b| b.extents().to_array());

    Ok(ScaledMesh {
        mesh,
        original_extents: original.to_array(),
        new_extents,
        scale_factor,
    })
}

/// Check watertightness and fill holes if allowed; returns the final state
///
/// Never fails: an unrepaired mesh is reported as not watertight.
pub fn ensure_watertight(mesh: &mut MeshGeometry, repair: bool, max_hole_edges: Option<usize>) -> bool {
    if topology::is_watertight(mesh) {
        debug!("Mesh is already watertight");
        return true;
    }
    if !repair {
        events::warning_with_recommendation(
            "Mesh is not watertight and repair is disabled",
            "enable repair to fill boundary holes",
        );
        return false;
    }

    let filled = topology::fill_holes_with_max_edges(mesh, max_hole_edges);
    let watertight = topology::is_watertight(mesh);
    if watertight {
        info!(holes_filled = filled, "Mesh made watertight");
    } else {
        let report = topology::EdgeReport::analyze(mesh);
        warn!(
            holes_filled = filled,
            boundary_edges = report.boundary_edges,
            non_manifold_edges = report.non_manifold_edges,
            "Could not make mesh watertight"
        );
    }
    watertight
}

/// Normalizes meshes to a target print size and exports STL
#[derive(Debug)]
pub struct MeshNormalizer {
    config: NormalizationConfig,
    progress_tracker: Option<ProgressTracker>,
}

impl MeshNormalizer {
    /// # Errors
    /// Returns [`PrepError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: NormalizationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress_tracker: None,
        })
    }

    pub fn set_progress_tracker(&mut self, tracker: ProgressTracker) {
        self.progress_tracker = Some(tracker);
    }

    #[must_use]
    pub fn config(&self) -> &NormalizationConfig {
        &self.config
    }

    fn report_stage(&mut self, stage: ProcessingStage, description: Option<String>) {
        if let Some(ref mut tracker) = self.progress_tracker {
            match description {
                Some(text) => tracker.report_stage_with_description(stage, text),
                None => tracker.report_stage(stage),
            }
        }
    }

    fn finish(&mut self, result: NormalizationResult) -> NormalizationResult {
        if let Some(ref mut tracker) = self.progress_tracker {
            match &result {
                Ok(_) => tracker.report_completion(),
                Err(e) => tracker.report_error(&e.to_string()),
            }
        }
        result
    }

    /// Load `input`, normalize it and write STL to `output`
    ///
    /// No output file exists after a failure.
    pub fn normalize<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        output: Q,
    ) -> NormalizationResult {
        let input = input.as_ref();
        let _span = spans::mesh_normalization(input, self.config.target_size_mm).entered();

        self.report_stage(ProcessingStage::MeshLoading, None);
        let asset = match mesh::load_asset(input, self.config.weld_vertices) {
            Ok(asset) => asset,
            Err(e) => return self.finish(Err(e)),
        };
        let result = self.process(asset, output.as_ref());
        self.finish(result)
    }

    /// Normalize an already loaded asset and write STL to `output`
    pub fn normalize_asset<Q: AsRef<Path>>(&mut self, asset: LoadedAsset, output: Q) -> NormalizationResult {
        let result = self.process(asset, output.as_ref());
        self.finish(result)
    }

    fn process(&mut self, asset: LoadedAsset, output: &Path) -> NormalizationResult {
        let geometry_count = asset.geometry_count();
        self.report_stage(
            ProcessingStage::GeometryMerge,
            Some(format!("Merging {} geometries", geometry_count)),
        );
        let merged = asset.into_geometry()?;
        info!(
            geometries = geometry_count,
            vertices = merged.vertex_count(),
            faces = merged.face_count(),
            "Mesh loaded"
        );

        self.report_stage(ProcessingStage::Normalization, None);
        let ScaledMesh {
            mut mesh,
            original_extents,
            new_extents,
            scale_factor,
        } = center_and_scale(merged, self.config.target_size_mm)?;

        self.report_stage(ProcessingStage::TopologyRepair, None);
        let is_watertight =
            ensure_watertight(&mut mesh, self.config.repair, self.config.max_hole_edges);

        self.report_stage(ProcessingStage::StlExport, None);
        let stl_file_size = stl::write_stl(&mesh, output, self.config.stl_format)?;
        info!(
            output = %output.display(),
            bytes = stl_file_size,
            scale_factor,
            "Normalized STL exported"
        );

        Ok(NormalizationReport {
            original_extents,
            new_extents,
            scale_factor,
            target_size_mm: self.config.target_size_mm,
            new_max_extent_mm: new_extents.iter().copied().fold(0.0, f64::max),
            vertex_count: mesh.vertex_count(),
            face_count: mesh.face_count(),
            is_watertight,
            stl_file_size,
        })
    }
}
