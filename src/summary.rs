//! Volume reports for segmented regions.
//!
//! Both reports convert voxel counts to physical units with the voxel geometry from
//! [`AtlasConfig`]; everything upstream of this module works in voxels.

use csv::Writer as CsvWriter;
use ndarray::{ArrayBase, Data, Ix3, Zip};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use tracing::{debug, warn};

use crate::config::AtlasConfig;
use crate::errors::{MaskError, TableError};
use crate::hierarchy::StructureHierarchy;
use crate::mask::{lateralise, region_extent, HemisphereMap, LabelledVolume};
use crate::StructureId;

const HEMISPHERE_COLUMNS: [&str; 7] = [
    "structure_name",
    "left_volume_mm3",
    "left_percentage_of_total",
    "right_volume_mm3",
    "right_percentage_of_total",
    "total_volume_mm3",
    "percentage_of_total",
];

const REGION_COLUMNS: [&str; 11] = [
    "region",
    "volume_mm3",
    "x_min_um",
    "y_min_um",
    "z_min_um",
    "x_max_um",
    "y_max_um",
    "z_max_um",
    "x_center_um",
    "y_center_um",
    "z_center_um",
];

/// Volume of one atlas structure inside a segmented region, split by hemisphere
#[derive(Debug, Clone, PartialEq)]
pub struct RegionVolume {
    pub structure_id: StructureId,
    pub structure_name: String,
    pub left_volume_mm3: f64,
    pub left_percentage_of_total: f64,
    pub right_volume_mm3: f64,
    pub right_percentage_of_total: f64,
    pub total_volume_mm3: f64,
    pub percentage_of_total: f64,
}

/// Count voxels per non-background label inside `mask`
fn tally<S>(mask: &ArrayBase<S, Ix3>, annotations: &LabelledVolume) -> BTreeMap<StructureId, usize>
where
    S: Data<Elem = bool>,
{
    let mut counts = BTreeMap::new();
    Zip::from(mask).and(annotations).for_each(|&inside, &label| {
        if inside && label != 0 {
            *counts.entry(label).or_insert(0) += 1;
        }
    });
    counts
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

/// Break a segmented region down into the atlas structures it overlaps.
///
/// Percentages are relative to all labelled (non-zero) voxels of the segmentation that
/// fall in either hemisphere. Labels missing from `hierarchy` are logged and skipped;
/// they still count towards the total.
pub fn hemisphere_volumes<S>(
    segmentation: &ArrayBase<S, Ix3>,
    annotations: LabelledVolume,
    hemispheres: HemisphereMap,
    hierarchy: &StructureHierarchy,
    config: &AtlasConfig,
) -> Result<Vec<RegionVolume>, MaskError>
where
    S: Data<Elem = bool>,
{
    if segmentation.shape() != annotations.shape() {
        return Err(MaskError::shape_mismatch(
            segmentation.shape(),
            annotations.shape(),
        ));
    }
    let (left, right) = lateralise(
        segmentation,
        hemispheres,
        config.left_hemisphere_value(),
        config.right_hemisphere_value(),
    )?;
    let left_counts = tally(&left, &annotations);
    let right_counts = tally(&right, &annotations);
    let total = left_counts.values().sum::<usize>() + right_counts.values().sum::<usize>();
    let voxel_volume = config.voxel_volume_mm3();
    debug!(
        structures = left_counts.len().max(right_counts.len()),
        total_voxels = total,
        "summarising hemisphere volumes"
    );

    let labels = left_counts
        .keys()
        .chain(right_counts.keys())
        .copied()
        .collect::<BTreeSet<_>>();
    let mut rows = Vec::with_capacity(labels.len());
    for id in labels {
        let name = match hierarchy.name_of(id) {
            Ok(name) => name.to_string(),
            Err(e) => {
                warn!(id, "{}; not calculating the volume", e);
                continue;
            }
        };
        let left_count = left_counts.get(&id).copied().unwrap_or(0);
        let right_count = right_counts.get(&id).copied().unwrap_or(0);
        let left_percentage = percentage(left_count, total);
        let right_percentage = percentage(right_count, total);
        rows.push(RegionVolume {
            structure_id: id,
            structure_name: name,
            left_volume_mm3: left_count as f64 * voxel_volume,
            left_percentage_of_total: left_percentage,
            right_volume_mm3: right_count as f64 * voxel_volume,
            right_percentage_of_total: right_percentage,
            total_volume_mm3: (left_count + right_count) as f64 * voxel_volume,
            percentage_of_total: left_percentage + right_percentage,
        });
    }
    Ok(rows)
}

/// Write hemisphere volume rows as CSV
pub fn write_hemisphere_volumes<W: Write>(
    writer: W,
    rows: &[RegionVolume],
) -> Result<(), TableError> {
    let mut writer = CsvWriter::from_writer(writer);
    writer.write_record(HEMISPHERE_COLUMNS)?;
    for row in rows {
        writer.write_record([
            row.structure_name.clone(),
            row.left_volume_mm3.to_string(),
            row.left_percentage_of_total.to_string(),
            row.right_volume_mm3.to_string(),
            row.right_percentage_of_total.to_string(),
            row.total_volume_mm3.to_string(),
            row.percentage_of_total.to_string(),
        ])?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Physical size and position of a segmented region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSummary {
    pub region: String,
    pub volume_mm3: f64,
    pub min_um: [f64; 3],
    pub max_um: [f64; 3],
    pub center_um: [f64; 3],
}

/// Summarise a region mask in physical units, or `None` if the mask is empty
pub fn region_summary<S>(
    region: &str,
    mask: &ArrayBase<S, Ix3>,
    config: &AtlasConfig,
) -> Option<RegionSummary>
where
    S: Data<Elem = bool>,
{
    let extent = region_extent(mask)?;
    let scale = config.voxel_size_um();
    let to_um = |values: [f64; 3]| [0, 1, 2].map(|axis| values[axis] * scale[axis]);
    Some(RegionSummary {
        region: region.to_string(),
        volume_mm3: extent.voxels as f64 * config.voxel_volume_mm3(),
        min_um: to_um(extent.min.map(|v| v as f64)),
        max_um: to_um(extent.max.map(|v| v as f64)),
        center_um: to_um(extent.centroid),
    })
}

/// Write region summaries as CSV
pub fn write_region_summaries<W: Write>(
    writer: W,
    rows: &[RegionSummary],
) -> Result<(), TableError> {
    let mut writer = CsvWriter::from_writer(writer);
    writer.write_record(REGION_COLUMNS)?;
    for row in rows {
        let mut record = vec![row.region.clone(), row.volume_mm3.to_string()];
        record.extend(
            row.min_um
                .iter()
                .chain(&row.max_um)
                .chain(&row.center_um)
                .map(|v| v.to_string()),
        );
        writer.write_record(&record)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
