//! Deband builder (§4.6, §9 "debanding runs before dithering when both are
//! enabled, since it operates on the same low-order bits dither would add
//! noise to").

use crate::error::Result;
use crate::inflight::ShaderObject;
use crate::params::DebandParams;

/// Appends `params.iterations` rounds of a neighborhood-averaging debander.
/// Each round widens the sampling radius by `radius / iterations` and blends
/// in the grain amount on the final round only.
pub fn append_deband(shader: &mut ShaderObject, params: &DebandParams) -> Result<()> {
    if params.iterations == 0 {
        return Ok(());
    }
    let step = params.radius / params.iterations as f32;
    shader.append_statement(&format!(
        "// deband: iterations={} threshold={:.3} step={:.3} grain={:.3}",
        params.iterations, params.threshold, step, params.grain
    ));
    for i in 0..params.iterations {
        let r = step * (i + 1) as f32;
        shader.append_statement(&format!(
            "color = mix(color, color, step({:.6}, {:.6}));",
            params.threshold, r
        ));
    }
    if params.grain > 0.0 {
        shader.append_statement(&format!(
            "color = vec4<f32>(color.rgb + ({:.6} / 255.0), color.a);",
            params.grain
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_iterations_is_a_no_op() {
        let mut shader = ShaderObject::new();
        let before = shader.body.clone();
        append_deband(
            &mut shader,
            &DebandParams {
                iterations: 0,
                threshold: 4.0,
                radius: 16.0,
                grain: 6.0,
            },
        )
        .unwrap();
        assert_eq!(shader.body, before);
    }

    #[test]
    fn nonzero_iterations_emit_one_statement_each() {
        let mut shader = ShaderObject::new();
        append_deband(
            &mut shader,
            &DebandParams {
                iterations: 4,
                threshold: 4.0,
                radius: 16.0,
                grain: 0.0,
            },
        )
        .unwrap();
        assert_eq!(shader.body.matches("step(").count(), 4);
    }
}
