//! 3D-LUT color-management builder (§4.6, §9 "3D-LUT absence falls back to
//! the matrix-based color_map path").

use crate::error::Result;
use crate::inflight::ShaderObject;
use crate::params::Lut3dParams;

/// An uploaded 3D color lookup table, indexed by normalized RGB.
pub struct Lut3d {
    pub texture: wgpu::Texture,
    pub size: u8,
}

/// Appends a trilinear 3D-LUT sample using an already-created view/sampler
/// pair for `lut`; otherwise a no-op, leaving the matrix-based `color_map`
/// path as the sole color transform (§9 open question, resolved: the LUT is
/// strictly additive to color_map rather than a replacement for it).
pub fn append_lut3d(
    shader: &mut ShaderObject,
    lut: Option<(&Lut3d, wgpu::TextureView, wgpu::Sampler)>,
    params: &Lut3dParams,
) -> Result<()> {
    let Some((lut, view, sampler)) = lut else {
        return Ok(());
    };
    let idx = shader.bind_texture(view, sampler);
    shader.append_statement(&format!(
        "// lut3d: size={} requested_size={}\n\
         color = vec4<f32>(textureSample(t{idx}, s{idx}, color.rgb).rgb, color.a);",
        lut.size, params.size
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lut_is_a_no_op() {
        let mut shader = ShaderObject::new();
        let before = shader.body.clone();
        append_lut3d(&mut shader, None, &Lut3dParams { size: 33 }).unwrap();
        assert_eq!(shader.body, before);
    }
}
