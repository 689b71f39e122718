//! Color representation and color space metadata.
//!
//! This module owns the descriptors the pipeline threads through every
//! stage (§3 "color representation", "color space") plus the small amount
//! of matrix math `read_image`/`output_target` need to decode and encode
//! between a plane's native encoding and working RGB. The heavier color
//! science (tone mapping curves, 3D-LUT sampling, cone-response tables) is
//! deliberately thin here — per §1 those are external collaborators,
//! consumed by interface only.

/// How a plane's components relate to color: an RGB-like triple, a
/// luma/chroma matrix encoding, or device-independent XYZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSystem {
    Unknown,
    Rgb,
    Xyz,
    Bt601,
    Bt709,
    Bt2020Ncl,
    Bt2020Cl,
    Bt2100Pq,
    Bt2100Hlg,
}

impl ColorSystem {
    pub fn is_ycbcr_like(self) -> bool {
        !matches!(self, ColorSystem::Rgb | ColorSystem::Xyz | ColorSystem::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorLevels {
    #[default]
    Unknown,
    /// "TV range": luma in [16, 235], chroma in [16, 240] for 8-bit.
    Limited,
    /// "PC range": full [0, 255] for 8-bit.
    Full,
}

/// Bit-depth bookkeeping for a plane's stored samples (§4.8 `fix_color_space`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitEncoding {
    /// Number of bits the texture's component format actually stores.
    pub sample_depth: u8,
    /// Number of bits carrying meaningful color data (`<= sample_depth`).
    pub color_depth: u8,
    /// Right-shift applied before those bits land at the LSB.
    pub bit_shift: u8,
}

impl BitEncoding {
    /// Reconciles `color_depth` and `bit_shift` so that `color_depth <=
    /// sample_depth` and any residual shift accumulates into `bit_shift`,
    /// per §4.8.
    pub fn reconcile(&mut self) {
        if self.color_depth == 0 {
            self.color_depth = self.sample_depth;
        }
        if self.color_depth > self.sample_depth {
            let residual = self.color_depth - self.sample_depth;
            self.color_depth = self.sample_depth;
            self.bit_shift += residual;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorRepr {
    pub system: ColorSystem,
    pub levels: ColorLevels,
    pub bits: BitEncoding,
}

impl Default for ColorSystem {
    fn default() -> Self {
        ColorSystem::Unknown
    }
}

/// The `pl_color_repr_normalize`-equivalent scale: the per-channel
/// multiplier that maps a plane's stored integer range into its legal
/// [0, 1]-relative float range, accounting for sub-full-scale color depth
/// and any residual bit shift.
pub fn repr_normalize_scale(repr: &ColorRepr) -> f32 {
    let depth = repr.bits.sample_depth.max(1) as f64;
    let color_depth = repr.bits.color_depth.max(1) as f64;
    let full_scale = (2f64.powi(depth as i32) - 1.0).max(1.0);
    let color_scale = (2f64.powi(color_depth as i32) - 1.0).max(1.0);
    // Stored value v occupies bits [shift, shift+color_depth); normalizing
    // by the full sample range and re-scaling by (full/color) recovers the
    // intended [0, 1] legal-range value.
    (full_scale / color_scale) as f32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorPrimaries {
    #[default]
    Unknown,
    Bt601_525,
    Bt601_625,
    Bt709,
    Bt2020,
    DciP3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferFunction {
    #[default]
    Unknown,
    /// BT.1886 (SDR gamma ~2.4 with black-level lift).
    Bt1886,
    Srgb,
    /// SMPTE ST 2084 (perceptual quantizer), the common HDR10 transfer.
    Pq,
    /// Hybrid log-gamma.
    Hlg,
    /// Already in linear light.
    Linear,
}

impl TransferFunction {
    /// HDR transfer functions carry peak luminance far above SDR reference
    /// white and must not be sigmoidized (§4.5).
    pub fn is_hdr(self) -> bool {
        matches!(self, TransferFunction::Pq | TransferFunction::Hlg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorLight {
    #[default]
    Unknown,
    Display,
    Scene,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSpace {
    pub primaries: ColorPrimaries,
    pub transfer: TransferFunction,
    pub light: ColorLight,
    /// Nominal peak luminance in cd/m^2 (0 = use transfer function default).
    pub hdr_peak: f32,
    /// Reference white scale factor (0 = use transfer function default).
    pub hdr_scale: f32,
}

impl Default for ColorSpace {
    fn default() -> Self {
        Self {
            primaries: ColorPrimaries::Unknown,
            transfer: TransferFunction::Unknown,
            light: ColorLight::Unknown,
            hdr_peak: 0.0,
            hdr_scale: 0.0,
        }
    }
}

impl ColorSpace {
    pub fn is_hdr(&self) -> bool {
        self.transfer.is_hdr()
    }

    /// §4.8 `fix_color_space`: guesses primaries from plane resolution when
    /// unset, matching the conventional SD/HD/UHD broadcast mapping.
    pub fn guess_primaries_from_resolution(w: u32, h: u32) -> ColorPrimaries {
        let pixels = w.max(h);
        if pixels >= 3000 {
            ColorPrimaries::Bt2020
        } else if pixels >= 1280 {
            ColorPrimaries::Bt709
        } else if h == 576 {
            ColorPrimaries::Bt601_625
        } else {
            ColorPrimaries::Bt601_525
        }
    }

    /// Fills in unset primaries/transfer/peak defaults in place, mirroring
    /// §4.8's "fill in transfer/peak defaults".
    pub fn fixup(&mut self, ref_w: u32, ref_h: u32) {
        if self.primaries == ColorPrimaries::Unknown {
            self.primaries = Self::guess_primaries_from_resolution(ref_w, ref_h);
        }
        if self.transfer == TransferFunction::Unknown {
            self.transfer = TransferFunction::Bt1886;
        }
        if self.light == ColorLight::Unknown {
            self.light = ColorLight::Display;
        }
        if self.hdr_peak == 0.0 {
            self.hdr_peak = if self.transfer.is_hdr() { 10_000.0 } else { 203.0 };
        }
        if self.hdr_scale == 0.0 {
            self.hdr_scale = 1.0;
        }
    }
}

/// The 3x3 YCbCr -> RGB conversion matrix (plus chroma offsets baked into
/// the caller via levels) for a given `ColorSystem`. Row-major, multiplies
/// a column vector `[y, cb, cr]` already range-shifted to be centered on
/// zero for the chroma channels.
pub fn ycbcr_to_rgb_matrix(system: ColorSystem) -> [[f32; 3]; 3] {
    match system {
        ColorSystem::Bt709 | ColorSystem::Bt2100Hlg => [
            [1.0, 0.0, 1.5748],
            [1.0, -0.1873, -0.4681],
            [1.0, 1.8556, 0.0],
        ],
        ColorSystem::Bt2020Ncl | ColorSystem::Bt2100Pq => [
            [1.0, 0.0, 1.4746],
            [1.0, -0.1646, -0.5714],
            [1.0, 1.8814, 0.0],
        ],
        // BT.601 and anything else YCbCr-like falls back to the BT.601
        // coefficients, matching the conventional default for SD content.
        _ => [
            [1.0, 0.0, 1.4020],
            [1.0, -0.3441, -0.7141],
            [1.0, 1.7720, 0.0],
        ],
    }
}

/// Inverts a 3x3 matrix. Used to build the RGB -> YCbCr encode matrix from
/// the decode matrix, and by `Frame::clear` (§6) to push an RGB clear color
/// back through a frame's color representation.
pub fn invert3x3(m: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    let inv_det = if det.abs() > 1e-12 { 1.0 / det } else { 0.0 };
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}

pub fn mat3_mul_vec3(m: [[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Cone-response distortion matrices approximating dichromatic color
/// blindness simulation (§4.6 "optional cone-response distortion"), in
/// the LMS-adjacent approximation commonly used for real-time previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConeModel {
    Protanopia,
    Deuteranopia,
    Tritanopia,
}

pub fn cone_distortion_matrix(model: ConeModel) -> [[f32; 3]; 3] {
    match model {
        ConeModel::Protanopia => [
            [0.152286, 1.052583, -0.204868],
            [0.114503, 0.786281, 0.099216],
            [-0.003882, -0.048116, 1.051998],
        ],
        ConeModel::Deuteranopia => [
            [0.367322, 0.860646, -0.227968],
            [0.280085, 0.672501, 0.047413],
            [-0.011820, 0.042940, 0.968881],
        ],
        ConeModel::Tritanopia => [
            [1.255528, -0.076749, -0.178779],
            [-0.078411, 0.930809, 0.147602],
            [0.004733, 0.691367, 0.303900],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_normalize_scale_is_identity_for_full_depth() {
        let repr = ColorRepr {
            system: ColorSystem::Rgb,
            levels: ColorLevels::Full,
            bits: BitEncoding {
                sample_depth: 8,
                color_depth: 8,
                bit_shift: 0,
            },
        };
        assert!((repr_normalize_scale(&repr) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn repr_normalize_scale_scales_up_low_color_depth() {
        let repr = ColorRepr {
            system: ColorSystem::Rgb,
            levels: ColorLevels::Full,
            bits: BitEncoding {
                sample_depth: 16,
                color_depth: 10,
                bit_shift: 6,
            },
        };
        // 16-bit samples carrying only 10 meaningful bits need scaling up
        // by roughly (2^16-1)/(2^10-1).
        let scale = repr_normalize_scale(&repr);
        assert!(scale > 60.0 && scale < 65.0);
    }

    #[test]
    fn bit_encoding_reconciles_overflowing_color_depth() {
        let mut bits = BitEncoding {
            sample_depth: 8,
            color_depth: 10,
            bit_shift: 0,
        };
        bits.reconcile();
        assert_eq!(bits.color_depth, 8);
        assert_eq!(bits.bit_shift, 2);
    }

    #[test]
    fn guess_primaries_matches_broadcast_conventions() {
        assert_eq!(
            ColorSpace::guess_primaries_from_resolution(1920, 1080),
            ColorPrimaries::Bt709
        );
        assert_eq!(
            ColorSpace::guess_primaries_from_resolution(3840, 2160),
            ColorPrimaries::Bt2020
        );
        assert_eq!(
            ColorSpace::guess_primaries_from_resolution(720, 576),
            ColorPrimaries::Bt601_625
        );
    }

    #[test]
    fn invert_then_reapply_is_identity() {
        let m = ycbcr_to_rgb_matrix(ColorSystem::Bt709);
        let inv = invert3x3(m);
        let roundtrip = mat3_mul_vec3(inv, mat3_mul_vec3(m, [0.3, -0.2, 0.1]));
        assert!((roundtrip[0] - 0.3).abs() < 1e-4);
        assert!((roundtrip[1] + 0.2).abs() < 1e-4);
        assert!((roundtrip[2] - 0.1).abs() < 1e-4);
    }

    #[test]
    fn hdr_transfer_is_never_sigmoidized_candidate() {
        assert!(TransferFunction::Pq.is_hdr());
        assert!(TransferFunction::Hlg.is_hdr());
        assert!(!TransferFunction::Bt1886.is_hdr());
    }
}
