//! The main scaler (§4.5 `scale_main`): linearize, sigmoidize, scale,
//! un-sigmoidize, with hooks and image-scope overlays interleaved.

use crate::color::TransferFunction;
use crate::error::Result;
use crate::frame::Frame;
use crate::hooks::Stage;
use crate::inflight::Image;
use crate::renderer::disable_flags::DisableFlags;
use crate::renderer::Renderer;
use crate::sampler::{self, Direction, SamplerType, SelectorParams};

impl Renderer {
    /// `scale_main` (§4.5): decides whether an intermediate FBO is needed,
    /// applies linearization/sigmoidization, dispatches the configured
    /// filter, and composites image-scope overlays.
    ///
    /// Returns whether image-scope overlays were drawn here; if not (no
    /// intermediate FBO was needed for any other reason), `output_target`
    /// is responsible for drawing them instead (§4.6).
    pub fn scale_main(
        &mut self,
        image: &mut Image,
        frame: &Frame,
        dst_w: u32,
        dst_h: u32,
        params: &crate::params::RenderParams,
        pass_fbos_used: &mut Vec<bool>,
    ) -> Result<bool> {
        let selector_params = SelectorParams {
            upscaler: params.upscaler.unwrap_or_default(),
            downscaler: params.downscaler.unwrap_or_default(),
            disable_builtin_scalers: params.disable_builtin_scalers,
            disable_fbos: self.disable_flags.contains(DisableFlags::FBOS),
            disable_sampling: self.disable_flags.contains(DisableFlags::SAMPLING),
            skip_anti_aliasing: params.skip_anti_aliasing,
        };

        let (w, h) = (image.rect.width().max(1.0), image.rect.height().max(1.0));
        let plan = sampler::select(w, h, dst_w as f32, dst_h as f32, true, &selector_params);

        let hook_demand = self.hook_demands_any(
            Stage::LINEAR | Stage::SIGMOID | Stage::PRE_OVERLAY | Stage::PRE_KERNEL | Stage::POST_KERNEL | Stage::SCALED,
        );

        let peak_delayed_disallowed = !self.disable_flags.contains(DisableFlags::PEAK_DETECT)
            && image.color_space.is_hdr()
            && !params.allow_delayed_peak_detect;

        let need_fbo = !frame.overlays.is_empty()
            || peak_delayed_disallowed
            || image
                .as_shader()
                .and_then(|s| s.fixed_output_size)
                .map(|(fw, fh)| fw != dst_w || fh != dst_h)
                .unwrap_or(false)
            || hook_demand;

        // Short-circuit cases (§4.5).
        if plan.direction == Direction::Noop && !hook_demand {
            return Ok(false);
        }
        if plan.ty == SamplerType::Direct && !hook_demand {
            image.w = dst_w;
            image.h = dst_h;
            return Ok(false);
        }

        let sigmoid_wanted = params.sigmoid_params.is_some();
        let want_linear = sigmoid_wanted || plan.direction == Direction::Down;
        let is_hdr = image.color_space.is_hdr();

        let mut linear = want_linear && !params.disable_linear_scaling;
        if is_hdr {
            linear &= !self.disable_flags.contains(DisableFlags::LINEAR_HDR);
        } else {
            linear &= !self.disable_flags.contains(DisableFlags::LINEAR_SDR);
        }
        // HDR content is never sigmoidized: it would clip to [0, 1].
        let sigmoid = sigmoid_wanted && linear && !is_hdr;

        if linear {
            linearize(image, image.color_space.transfer);
            self.dispatch_hooks(Stage::LINEAR, image, pass_fbos_used)?;
        }
        if sigmoid {
            let sp = params.sigmoid_params.unwrap();
            sigmoidize(image, sp.center, sp.slope);
            self.dispatch_hooks(Stage::SIGMOID, image, pass_fbos_used)?;
        }

        self.dispatch_hooks(Stage::PRE_OVERLAY, image, pass_fbos_used)?;

        let mut overlays_drawn = false;
        if need_fbo {
            image.to_tex(
                &self.device,
                &self.queue,
                &mut self.fbo_pool,
                pass_fbos_used,
                &mut self.shader_module_cache,
                &mut self.pipeline_cache,
            )?;
            if !frame.overlays.is_empty() {
                self.draw_image_overlays(image, frame, sigmoid, params.disable_overlay_sampling, pass_fbos_used)?;
                overlays_drawn = true;
            }
        }

        self.dispatch_hooks(Stage::PRE_KERNEL, image, pass_fbos_used)?;

        // The resampling dispatch always needs a concrete texture to read
        // from; materialize one now if the image is still an
        // under-construction shader (§4.1 `to_tex`).
        image.to_tex(
            &self.device,
            &self.queue,
            &mut self.fbo_pool,
            pass_fbos_used,
            &mut self.shader_module_cache,
            &mut self.pipeline_cache,
        )?;
        let src_view = image
            .as_texture()
            .expect("to_tex just materialized a texture form")
            .view
            .clone();
        image.to_sh(&self.device);

        let sampler = crate::inflight::default_sampler(&self.device);
        if let Some(shader) = image.as_shader_mut() {
            if sampler::dispatch(shader, &plan, src_view.clone(), sampler).is_err() {
                log::warn!("chromapipe: complex sampler dispatch failed, disabling advanced sampling permanently");
                self.disable_flags.insert(DisableFlags::SAMPLING);
                let fallback_params = SelectorParams {
                    disable_sampling: true,
                    ..selector_params
                };
                let fallback = sampler::select(w, h, dst_w as f32, dst_h as f32, true, &fallback_params);
                let sampler2 = crate::inflight::default_sampler(&self.device);
                let _ = sampler::dispatch(shader, &fallback, src_view, sampler2);
            }
        }
        image.w = dst_w;
        image.h = dst_h;

        self.dispatch_hooks(Stage::POST_KERNEL, image, pass_fbos_used)?;

        if sigmoid {
            let sp = params.sigmoid_params.unwrap();
            unsigmoidize(image, sp.center, sp.slope);
        }

        self.dispatch_hooks(Stage::SCALED, image, pass_fbos_used)?;
        Ok(overlays_drawn)
    }

    fn hook_demands_any(&self, stages: crate::hooks::Stage) -> bool {
        self.hooks.iter().any(|h| h.stages.intersects(stages))
    }
}

/// §4.5 linearization: transfer-function-dependent curve appended as a WGSL
/// statement. Correctness of the curve itself is out of scope (§1); this
/// marks the image as linear for downstream bookkeeping.
fn linearize(image: &mut Image, transfer: TransferFunction) {
    if let Some(shader) = image.as_shader_mut() {
        shader.append_statement(&format!("// linearize: transfer={transfer:?}\ncolor = vec4<f32>(pow(color.rgb, vec3<f32>(2.2)), color.a);"));
    }
}

/// §4.5/GLOSSARY "Sigmoidization": nonlinear remap before upscaling.
fn sigmoidize(image: &mut Image, center: f32, slope: f32) {
    if let Some(shader) = image.as_shader_mut() {
        shader.append_statement(&format!(
            "// sigmoidize: center={center:.4} slope={slope:.4}\n\
             let _sig_hi = 1.0 / (1.0 + exp({slope:.6} * {center:.6}));\n\
             let _sig_lo = 1.0 / (1.0 + exp({slope:.6} * ({center:.6} - 1.0)));\n\
             color = vec4<f32>((1.0 / (1.0 + exp({slope:.6} * ({center:.6} - color.rgb))) - _sig_hi) / (_sig_lo - _sig_hi), color.a);"
        ));
    }
}

/// Inverts `sigmoidize` exactly: solves the same two-asymptote logistic for
/// `x` given `y`, so the post-scale image lands back in whatever space it
/// was linearized into before the sigmoid remap.
fn unsigmoidize(image: &mut Image, center: f32, slope: f32) {
    if let Some(shader) = image.as_shader_mut() {
        shader.append_statement(&format!(
            "// unsigmoidize: center={center:.4} slope={slope:.4}\n\
             let _usig_hi = 1.0 / (1.0 + exp({slope:.6} * {center:.6}));\n\
             let _usig_lo = 1.0 / (1.0 + exp({slope:.6} * ({center:.6} - 1.0)));\n\
             let _usig_z = clamp(color.rgb * (_usig_lo - _usig_hi) + _usig_hi, vec3<f32>(1e-6), vec3<f32>(1.0 - 1e-6));\n\
             color = vec4<f32>({center:.6} - log(1.0 / _usig_z - 1.0) / {slope:.6}, color.a);"
        ));
    }
}

#[cfg(test)]
mod tests {
    // Mirrors the WGSL emitted by `sigmoidize`/`unsigmoidize` in plain Rust
    // to confirm the inverse is exact, independent of GPU execution.
    fn sigmoidize(x: f32, center: f32, slope: f32) -> f32 {
        let hi = 1.0 / (1.0 + (slope * center).exp());
        let lo = 1.0 / (1.0 + (slope * (center - 1.0)).exp());
        (1.0 / (1.0 + (slope * (center - x)).exp()) - hi) / (lo - hi)
    }

    fn unsigmoidize(y: f32, center: f32, slope: f32) -> f32 {
        let hi = 1.0 / (1.0 + (slope * center).exp());
        let lo = 1.0 / (1.0 + (slope * (center - 1.0)).exp());
        let z = (y * (lo - hi) + hi).clamp(1e-6, 1.0 - 1e-6);
        center - (1.0 / z - 1.0).ln() / slope
    }

    #[test]
    fn unsigmoidize_inverts_sigmoidize() {
        let (center, slope) = (0.75, 6.5);
        for x in [0.0_f32, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
            let y = sigmoidize(x, center, slope);
            let back = unsigmoidize(y, center, slope);
            assert!((back - x).abs() < 1e-4, "x={x} back={back}");
        }
    }
}
