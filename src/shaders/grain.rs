//! Film-grain synthesis builder (§4.4 step 4, `Frame::grain`).

use crate::error::Result;
use crate::frame::GrainParams;
use crate::inflight::{GrainUniforms, ShaderObject};

/// Appends a seeded pseudo-random grain pattern, added to luma and/or
/// chroma channels per `params`. Uses a cheap hash-based noise function
/// rather than the AV1 synthesis algorithm proper (§1 scope: plausible
/// placement, not bit-exact AV1 grain).
pub fn append_grain(shader: &mut ShaderObject, params: &GrainParams, is_chroma_plane: bool) -> Result<()> {
    if is_chroma_plane && !params.affects_chroma {
        return Ok(());
    }
    if !is_chroma_plane && !params.affects_luma {
        return Ok(());
    }

    shader.append_statement(&format!(
        "// grain: seed={} intensity={:.4} chroma_plane={is_chroma_plane}\n\
         let _grain_hash = fract(sin(dot(uv, vec2<f32>(12.9898, 78.233)) + f32({})) * 43758.5453);\n\
         color = vec4<f32>(color.rgb + (_grain_hash - 0.5) * {:.6}, color.a);",
        params.seed, params.seed, params.intensity
    ));

    shader.uniform_bytes.extend_from_slice(bytemuck::bytes_of(&GrainUniforms {
        seed: params.seed as f32,
        intensity: params.intensity,
        _pad: [0.0; 2],
    }));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GrainParams {
        GrainParams {
            seed: 42,
            intensity: 0.02,
            affects_luma: true,
            affects_chroma: false,
        }
    }

    #[test]
    fn skips_chroma_when_not_requested() {
        let mut shader = ShaderObject::new();
        let before = shader.body.clone();
        append_grain(&mut shader, &params(), true).unwrap();
        assert_eq!(shader.body, before);
    }

    #[test]
    fn applies_to_luma_when_requested() {
        let mut shader = ShaderObject::new();
        append_grain(&mut shader, &params(), false).unwrap();
        assert!(shader.body.contains("seed=42"));
    }

    #[test]
    fn packs_uniform_bytes_alongside_the_literal_statement() {
        let mut shader = ShaderObject::new();
        append_grain(&mut shader, &params(), false).unwrap();
        assert_eq!(shader.uniform_bytes.len(), std::mem::size_of::<GrainUniforms>());
    }
}
