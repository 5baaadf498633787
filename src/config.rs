use crate::StructureId;

/// Structure id of the Allen CCF "root" structure
pub const DEFAULT_ROOT_ID: StructureId = 997;

/// Hemisphere map value marking the left hemisphere in the Allen CCF hemisphere volume
pub const DEFAULT_LEFT_HEMISPHERE_VALUE: u32 = 2;

/// Hemisphere map value marking the right hemisphere in the Allen CCF hemisphere volume
pub const DEFAULT_RIGHT_HEMISPHERE_VALUE: u32 = 1;

/// Isotropic voxel edge length of the default 10um atlas
pub const DEFAULT_VOXEL_SIZE_UM: f64 = 10.0;

const UM3_PER_MM3: f64 = 1000.0 * 1000.0 * 1000.0;

/// Parse `"x,y,z"` voxel sizes, or a single value for isotropic voxels
pub fn parse_voxel_size(s: &str) -> Result<[f64; 3], String> {
    let parts = s
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| format!("{part}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let size = match parts.as_slice() {
        [v] => [*v; 3],
        [x, y, z] => [*x, *y, *z],
        _ => return Err("Voxel size must be a single value or x,y,z".to_string()),
    };
    if size.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err("Voxel sizes must be positive".to_string());
    }
    Ok(size)
}

/// Atlas options shared by the command line tools
#[derive(Debug, Clone, clap::Args)]
pub struct AtlasArgs {
    #[arg(
        help = "Structure id at the root of the hierarchy",
        long = "root-id",
        default_value_t = DEFAULT_ROOT_ID
    )]
    pub root_id: StructureId,

    #[arg(
        help = "Hemisphere map value of the left hemisphere",
        long = "left-value",
        default_value_t = DEFAULT_LEFT_HEMISPHERE_VALUE
    )]
    pub left_hemisphere_value: u32,

    #[arg(
        help = "Hemisphere map value of the right hemisphere",
        long = "right-value",
        default_value_t = DEFAULT_RIGHT_HEMISPHERE_VALUE
    )]
    pub right_hemisphere_value: u32,

    #[arg(
        help = "Voxel size in micrometres, either x,y,z or a single isotropic value",
        long = "voxel-size",
        value_parser = parse_voxel_size,
        default_value = "10"
    )]
    pub voxel_size_um: [f64; 3],
}

impl From<&AtlasArgs> for AtlasConfig {
    fn from(args: &AtlasArgs) -> Self {
        AtlasConfig::new(
            args.root_id,
            args.left_hemisphere_value,
            args.right_hemisphere_value,
            args.voxel_size_um,
        )
    }
}

/// Fixed description of an atlas: which id is the root of its structure tree,
/// how its hemisphere volume encodes left and right, and the physical voxel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasConfig {
    root_id: StructureId,
    left_hemisphere_value: u32,
    right_hemisphere_value: u32,
    voxel_size_um: [f64; 3],
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            root_id: DEFAULT_ROOT_ID,
            left_hemisphere_value: DEFAULT_LEFT_HEMISPHERE_VALUE,
            right_hemisphere_value: DEFAULT_RIGHT_HEMISPHERE_VALUE,
            voxel_size_um: [DEFAULT_VOXEL_SIZE_UM; 3],
        }
    }
}

impl AtlasConfig {
    pub fn new(
        root_id: StructureId,
        left_hemisphere_value: u32,
        right_hemisphere_value: u32,
        voxel_size_um: [f64; 3],
    ) -> Self {
        Self {
            root_id,
            left_hemisphere_value,
            right_hemisphere_value,
            voxel_size_um,
        }
    }

    pub fn with_root_id(mut self, root_id: StructureId) -> Self {
        self.root_id = root_id;
        self
    }

    pub fn with_hemisphere_values(mut self, left: u32, right: u32) -> Self {
        self.left_hemisphere_value = left;
        self.right_hemisphere_value = right;
        self
    }

    pub fn with_voxel_size_um(mut self, voxel_size_um: [f64; 3]) -> Self {
        self.voxel_size_um = voxel_size_um;
        self
    }

    pub fn root_id(&self) -> StructureId {
        self.root_id
    }

    pub fn left_hemisphere_value(&self) -> u32 {
        self.left_hemisphere_value
    }

    pub fn right_hemisphere_value(&self) -> u32 {
        self.right_hemisphere_value
    }

    /// Voxel edge lengths in micrometres along axes 0, 1 and 2 (x, y, z)
    pub fn voxel_size_um(&self) -> [f64; 3] {
        self.voxel_size_um
    }

    /// Volume of a single voxel in cubic millimetres
    pub fn voxel_volume_mm3(&self) -> f64 {
        self.voxel_size_um.iter().product::<f64>() / UM3_PER_MM3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_matches_allen_ccf() {
        let config = AtlasConfig::default();
        assert_eq!(config.root_id(), 997);
        assert_eq!(config.left_hemisphere_value(), 2);
        assert_eq!(config.right_hemisphere_value(), 1);
    }

    #[rstest]
    #[case([10.0, 10.0, 10.0], 1e-6)]
    #[case([25.0, 25.0, 25.0], 1.5625e-5)]
    #[case([100.0, 50.0, 20.0], 1e-4)]
    fn test_voxel_volume_mm3(#[case] voxel_size_um: [f64; 3], #[case] expected: f64) {
        let config = AtlasConfig::default().with_voxel_size_um(voxel_size_um);
        assert!((config.voxel_volume_mm3() - expected).abs() < 1e-15);
    }

    #[rstest]
    #[case("10", [10.0, 10.0, 10.0])]
    #[case("25,25,50", [25.0, 25.0, 50.0])]
    #[case(" 1.5 , 2 , 3 ", [1.5, 2.0, 3.0])]
    fn test_parse_voxel_size(#[case] input: &str, #[case] expected: [f64; 3]) {
        assert_eq!(parse_voxel_size(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("10,10")]
    #[case("a,b,c")]
    #[case("10,0,10")]
    #[case("-5")]
    fn test_parse_voxel_size_invalid(#[case] input: &str) {
        assert!(parse_voxel_size(input).is_err());
    }

    #[test]
    fn test_builders() {
        let config = AtlasConfig::default()
            .with_root_id(1)
            .with_hemisphere_values(5, 6);
        assert_eq!(config, AtlasConfig::new(1, 5, 6, [10.0; 3]));
    }
}
