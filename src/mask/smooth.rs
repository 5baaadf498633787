//! Slice-wise Gaussian smoothing of binary masks.
//!
//! Each coronal slice (a 2-D plane taken along axis 1) is blurred independently with an
//! isotropic Gaussian and re-binarized against a threshold. Neighbouring slices never
//! exchange intensity, so smoothing rounds off region outlines within the coronal plane
//! only.
//!
//! The kernel follows the usual image-processing convention: weights
//! `exp(-x² / 2σ²)` normalized to unit sum, truncated at `floor(4σ + 0.5)` voxels, with
//! edges extended by repeating the nearest voxel.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, Axis, Zip};

use crate::errors::MaskError;
use crate::mask::RegionMask;
use crate::traits::Transform;

/// Axis whose index selects a coronal slice
pub const SLICE_AXIS: Axis = Axis(1);

pub const DEFAULT_SIGMA: f64 = 10.0;
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Kernel radius in units of sigma
const TRUNCATE: f64 = 4.0;

/// Largest accepted kernel radius in voxels, about `sigma = 16384`. Far wider than any
/// atlas slice; offsets beyond a slice edge all land on the edge voxel anyway.
pub const MAX_KERNEL_RADIUS: usize = 1 << 16;

fn kernel_radius(sigma: f64) -> usize {
    (TRUNCATE * sigma + 0.5) as usize
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    sigma: f64,
    threshold: f64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_SIGMA,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Smoothing {
    /// Create smoothing parameters
    ///
    /// # Arguments
    ///
    /// * `sigma` - Standard deviation of the in-slice Gaussian, in voxels. Zero disables
    ///   the blur. Values whose kernel radius exceeds [`MAX_KERNEL_RADIUS`] are rejected.
    /// * `threshold` - Blurred intensities strictly above this value become `true`. Must
    ///   lie in `[0, 1]`.
    pub fn new(sigma: f64, threshold: f64) -> Result<Self, MaskError> {
        let valid_sigma =
            sigma.is_finite() && sigma >= 0.0 && kernel_radius(sigma) <= MAX_KERNEL_RADIUS;
        let valid_threshold = threshold.is_finite() && (0.0..=1.0).contains(&threshold);
        if !valid_sigma || !valid_threshold {
            return Err(MaskError::InvalidSmoothing { sigma, threshold });
        }
        Ok(Self { sigma, threshold })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Smooth `mask` slice by slice, overwriting it in place.
    pub fn smooth(&self, mut mask: RegionMask) -> RegionMask {
        let kernel = gaussian_kernel(self.sigma);
        let threshold = self.threshold;
        mask.axis_iter_mut(SLICE_AXIS)
            .into_par_iter()
            .for_each(|mut slice| {
                // An empty slice blurs to zero everywhere and stays empty
                if !slice.iter().any(|&v| v) {
                    return;
                }
                let intensities = slice.mapv(|v| if v { 1.0 } else { 0.0 });
                let blurred = blur(intensities.view(), &kernel);
                Zip::from(&mut slice)
                    .and(&blurred)
                    .for_each(|voxel, &value| *voxel = value > threshold);
            });
        mask
    }
}

impl Transform<RegionMask> for Smoothing {
    fn apply(&self, target: RegionMask) -> RegionMask {
        self.smooth(target)
    }
}

/// Smooth a mask with the given parameters. See [`Smoothing::new`] for their ranges.
pub fn smooth(mask: RegionMask, sigma: f64, threshold: f64) -> Result<RegionMask, MaskError> {
    Ok(Smoothing::new(sigma, threshold)?.smooth(mask))
}

/// Normalized 1-D Gaussian weights, centre at index `len / 2`
pub(crate) fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma == 0.0 {
        return vec![1.0];
    }
    let radius = kernel_radius(sigma) as isize;
    let weights = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect::<Vec<_>>();
    let total = weights.iter().sum::<f64>();
    weights.into_iter().map(|w| w / total).collect()
}

/// Separable 2-D blur: both slice axes in turn
fn blur(image: ArrayView2<f64>, kernel: &[f64]) -> Array2<f64> {
    let rows = convolve_axis(image, kernel, Axis(0));
    convolve_axis(rows.view(), kernel, Axis(1))
}

/// Fold weights whose offset reaches past `last` into the outermost taps. With edges
/// replicated, every such offset reads the edge voxel, so the result is unchanged.
fn fold_kernel(kernel: &[f64], last: usize) -> Vec<f64> {
    let radius = kernel.len() / 2;
    if radius <= last {
        return kernel.to_vec();
    }
    let outer = radius - last;
    let mut folded = kernel[outer..kernel.len() - outer].to_vec();
    let end = folded.len() - 1;
    folded[0] += kernel[..outer].iter().sum::<f64>();
    folded[end] += kernel[kernel.len() - outer..].iter().sum::<f64>();
    folded
}

fn convolve_axis(image: ArrayView2<f64>, kernel: &[f64], axis: Axis) -> Array2<f64> {
    let mut output = Array2::zeros(image.raw_dim());
    let len = image.len_of(axis);
    if len == 0 {
        return output;
    }
    let kernel = fold_kernel(kernel, len - 1);
    let radius = kernel.len() / 2;
    for (lane, mut out) in image.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        let last = lane.len() - 1;
        for (i, value) in out.iter_mut().enumerate() {
            *value = kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| w * lane[(i + k).saturating_sub(radius).min(last)])
                .sum();
        }
    }
    output
}
