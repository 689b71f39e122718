//! `RenderParams` and the two built-in presets (§6).

use crate::color::ConeModel;
use crate::hooks::Hook;
use crate::sampler::FilterConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidParams {
    pub center: f32,
    pub slope: f32,
}

impl Default for SigmoidParams {
    fn default() -> Self {
        Self {
            center: 0.75,
            slope: 6.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeakDetectParams {
    pub smoothing_period: f32,
    pub scene_threshold_low: f32,
    pub scene_threshold_high: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorMapParams {
    pub tone_mapping_param: f32,
    pub gamut_mapping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DitherParams {
    pub lut_size: u8,
    pub temporal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DebandParams {
    pub iterations: u8,
    pub threshold: f32,
    pub radius: f32,
    pub grain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeParams {
    pub model: ConeModel,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lut3dParams {
    pub size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendParams {
    pub src_factor: wgpu::BlendFactor,
    pub dst_factor: wgpu::BlendFactor,
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        }
    }
}

/// Deferred to a separate subsystem (§9 open question): the field exists so
/// callers can pass configuration through, but the core pipeline never
/// consumes it beyond carrying it along in `RenderParams`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameMixerParams {
    pub tuning: f32,
}

/// All recognized render options (§6), each independently nullable.
///
/// Not `Clone`: `hooks` carries `FnMut` closures (possibly with their own
/// captured state), which can't be cloned. Build a fresh `RenderParams` (or
/// start from [`default_params`]/[`high_quality_params`] with `..`) per
/// call site instead of cloning one that already has hooks installed.
#[derive(Default)]
pub struct RenderParams {
    pub upscaler: Option<FilterConfig>,
    pub downscaler: Option<FilterConfig>,
    pub frame_mixer: Option<FrameMixerParams>,

    pub sigmoid_params: Option<SigmoidParams>,
    pub peak_detect_params: Option<PeakDetectParams>,
    pub color_map_params: Option<ColorMapParams>,
    pub dither_params: Option<DitherParams>,
    pub deband_params: Option<DebandParams>,
    pub cone_params: Option<ConeParams>,
    pub lut3d_params: Option<Lut3dParams>,
    pub blend_params: Option<BlendParams>,

    pub color_adjustment: Option<[[f32; 3]; 3]>,
    pub lut_entries: u32,
    pub polar_cutoff: f32,
    pub antiringing_strength: f32,

    pub skip_anti_aliasing: bool,

    pub disable_linear_scaling: bool,
    pub disable_builtin_scalers: bool,
    pub disable_fbos: bool,
    pub disable_overlay_sampling: bool,
    pub force_3dlut: bool,
    pub force_dither: bool,
    pub allow_delayed_peak_detect: bool,

    pub hooks: Vec<Hook>,
}

impl std::fmt::Debug for RenderParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderParams")
            .field("upscaler", &self.upscaler)
            .field("downscaler", &self.downscaler)
            .field("sigmoid_params", &self.sigmoid_params)
            .field("peak_detect_params", &self.peak_detect_params)
            .field("color_map_params", &self.color_map_params)
            .field("dither_params", &self.dither_params)
            .field("deband_params", &self.deband_params)
            .field("hooks_len", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

use crate::sampler::FilterKind;

/// Spline36 upscaler / Mitchell downscaler, no debander, sigmoid + peak +
/// color-map + dither — the "default" preset from §6.
pub fn default_params() -> RenderParams {
    RenderParams {
        upscaler: Some(FilterConfig {
            filter: Some(FilterKind::Separable),
            antiringing_strength: 0.8,
        }),
        downscaler: Some(FilterConfig {
            filter: Some(FilterKind::Separable),
            antiringing_strength: 0.8,
        }),
        sigmoid_params: Some(SigmoidParams::default()),
        peak_detect_params: Some(PeakDetectParams {
            smoothing_period: 100.0,
            scene_threshold_low: 1.0,
            scene_threshold_high: 3.0,
        }),
        color_map_params: Some(ColorMapParams {
            tone_mapping_param: 0.0,
            gamut_mapping: true,
        }),
        dither_params: Some(DitherParams {
            lut_size: 6,
            temporal: false,
        }),
        allow_delayed_peak_detect: true,
        antiringing_strength: 0.8,
        ..Default::default()
    }
}

/// EWA-Lanczos upscaler / Mitchell downscaler, plus a debander — the "high
/// quality" preset from §6.
pub fn high_quality_params() -> RenderParams {
    RenderParams {
        upscaler: Some(FilterConfig {
            filter: Some(FilterKind::Polar { cutoff: 0.001 }),
            antiringing_strength: 0.8,
        }),
        deband_params: Some(DebandParams {
            iterations: 4,
            threshold: 4.0,
            radius: 16.0,
            grain: 6.0,
        }),
        ..default_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_enables_the_documented_stages() {
        let params = default_params();
        assert!(params.sigmoid_params.is_some());
        assert!(params.peak_detect_params.is_some());
        assert!(params.color_map_params.is_some());
        assert!(params.dither_params.is_some());
        assert!(params.deband_params.is_none());
    }

    #[test]
    fn high_quality_preset_adds_debanding() {
        let params = high_quality_params();
        assert!(params.deband_params.is_some());
        assert!(matches!(
            params.upscaler.unwrap().filter,
            Some(FilterKind::Polar { .. })
        ));
    }
}
