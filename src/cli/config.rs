//! Configuration assembly for CLI arguments
//!
//! A `--config` JSON file provides the base; explicit flags override it.

use super::main_impl::{CliPolicy, NormalizeMeshArgs, RemoveBgArgs};
use crate::config::{NormalizationConfig, SegmentationConfig, SegmentationPolicy, StlFormat};
use anyhow::{Context, Result};

impl From<CliPolicy> for SegmentationPolicy {
    fn from(policy: CliPolicy) -> Self {
        match policy {
            CliPolicy::Cascade => SegmentationPolicy::Cascade,
            CliPolicy::Composite => SegmentationPolicy::Composite,
        }
    }
}

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the segmentation configuration for `remove-bg`
    pub(crate) fn segmentation(args: &RemoveBgArgs) -> Result<SegmentationConfig> {
        let mut config = match &args.config {
            Some(path) => SegmentationConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => SegmentationConfig::default(),
        };

        if let Some(policy) = args.policy {
            config.policy = policy.into();
        }
        if let Some(margin) = args.margin {
            config.rect_margin = margin;
        }

        config.validate().context("Invalid CLI arguments")?;
        Ok(config)
    }

    /// Build the normalization configuration for `normalize-mesh`
    pub(crate) fn normalization(args: &NormalizeMeshArgs) -> Result<NormalizationConfig> {
        let mut config = match &args.config {
            Some(path) => NormalizationConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => NormalizationConfig::default(),
        };

        if let Some(target) = args.target_size_mm {
            config.target_size_mm = target;
        }
        if args.ascii {
            config.stl_format = StlFormat::Ascii;
        }
        if args.no_repair {
            config.repair = false;
        }
        if let Some(max_edges) = args.max_hole_edges {
            config.max_hole_edges = Some(max_edges);
        }
        if args.no_weld {
            config.weld_vertices = false;
        }

        config.validate().context("Invalid CLI arguments")?;
        Ok(config)
    }
}
