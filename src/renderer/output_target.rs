//! The output writer (§4.6 `output_target`): color-maps, encodes, dithers,
//! and fans out the in-flight image onto each target plane.

use crate::color;
use crate::error::Result;
use crate::frame::{Frame, Overlay};
use crate::hooks::Stage;
use crate::inflight::Image;
use crate::plane::Channel;
use crate::renderer::disable_flags::DisableFlags;
use crate::renderer::read_image::plane_ratio_axis;
use crate::renderer::Renderer;

impl Renderer {
    /// `output_target` (§4.6): color-management path, cone-response
    /// distortion, encode, per-plane dispatch with dither, plus image- and
    /// target-scope overlay draws.
    ///
    /// `image_overlays` are the source frame's overlays; they are only
    /// drawn here when `scale_main` couldn't draw them for lack of an
    /// intermediate FBO (`overlays_drawn_in_scale_main == false`).
    /// Target-scope overlays (`target.overlays`) are always drawn here.
    pub fn output_target(
        &mut self,
        image: &mut Image,
        image_overlays: &[Overlay],
        target: &Frame,
        params: &crate::params::RenderParams,
        overlays_drawn_in_scale_main: bool,
        pass_fbos_used: &mut Vec<bool>,
    ) -> Result<()> {
        let lut_engaged = params.lut3d_params.is_some()
            && (params.force_3dlut || image.icc_differs_from(target));
        let lut3d_params = params.lut3d_params.unwrap_or_default();

        if lut_engaged {
            log::info!("chromapipe: 3D-LUT color management requested but no LUT profile is installed; falling back to direct color-map (§9 open question)");
        }

        crate::shaders::color_map::append_color_map(
            image.as_shader_mut().ok_or_else(|| {
                crate::error::Error::Dispatch("output_target expects an under-construction shader")
            })?,
            &image.color_space,
            &target.color_space,
            &params.color_map_params.unwrap_or_default(),
            Some(&self.peak_state),
            false,
        )?;
        let _ = lut3d_params;

        if let Some(cone) = params.cone_params {
            let m = color::cone_distortion_matrix(cone.model);
            if let Some(shader) = image.as_shader_mut() {
                shader.append_statement(&format!(
                    "let _cone_in = color.rgb;\n\
                     color = vec4<f32>(mix(_cone_in, vec3<f32>({:.6} * _cone_in.x + {:.6} * _cone_in.y + {:.6} * _cone_in.z, \
                     {:.6} * _cone_in.x + {:.6} * _cone_in.y + {:.6} * _cone_in.z, \
                     {:.6} * _cone_in.x + {:.6} * _cone_in.y + {:.6} * _cone_in.z), {:.4}), color.a);",
                    m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2], cone.strength
                ));
            }
        }

        encode_color(image, target);
        self.dispatch_hooks(Stage::OUTPUT, image, pass_fbos_used)?;

        let target_scale = color::repr_normalize_scale(&target.color_repr);

        for (plane_idx, plane) in target.planes.iter().enumerate() {
            let ratio = (
                target
                    .reference_plane()
                    .map(|r| plane_ratio_axis(r.width(), plane.width()))
                    .unwrap_or(1.0),
                target
                    .reference_plane()
                    .map(|r| plane_ratio_axis(r.height(), plane.height()))
                    .unwrap_or(1.0),
            );
            let plane_rect = target.crop.map_by_shift_ratio((plane.shift_x, plane.shift_y), ratio).round();
            let (pw, ph) = plane_rect.logical_size();

            let multi_plane = target.planes.len() > 1;
            let needs_materialize = !multi_plane
                && image.is_shader()
                && image.as_shader().map(|s| s.compute).unwrap_or(false)
                && !self.target_plane_storable(plane);

            if multi_plane || needs_materialize {
                image.to_tex(
                    &self.device,
                    &self.queue,
                    &mut self.fbo_pool,
                    pass_fbos_used,
                    &mut self.shader_module_cache,
                    &mut self.pipeline_cache,
                )?;
            }

            let mut plane_shader = if image.is_texture() {
                let tex = image.as_texture().unwrap();
                crate::inflight::ShaderObject::from_texture_sample(
                    tex.view.clone(),
                    crate::inflight::default_sampler(&self.device),
                )
            } else {
                // Single-plane target reusing the in-flight shader directly.
                std::mem::replace(image.as_shader_mut().unwrap(), crate::inflight::ShaderObject::new())
            };

            let has_mapped_channel = plane.component_mapping.iter().any(|c| !matches!(c, Channel::None));
            if has_mapped_channel {
                plane_shader.append_statement("var _out: vec4<f32> = color;");
            }
            for (slot, channel) in plane.component_mapping.iter().enumerate() {
                if matches!(channel, Channel::None) {
                    continue;
                }
                let field = match channel {
                    Channel::Red | Channel::Luma => "r",
                    Channel::Green | Channel::ChromaCb => "g",
                    Channel::Blue | Channel::ChromaCr => "b",
                    Channel::Alpha => "a",
                    Channel::Xyz(0) => "r",
                    Channel::Xyz(1) => "g",
                    Channel::Xyz(_) => "b",
                    Channel::None => continue,
                };
                plane_shader.append_statement(&format!(
                    "_out[{slot}] = color.{field} / {target_scale:.6};"
                ));
            }
            if has_mapped_channel {
                plane_shader.append_statement("color = _out;");
            }

            let force_dither = params.force_dither;
            let should_dither = crate::shaders::dither::should_dither(
                image.color_repr.bits.color_depth.max(1),
                target.color_repr.bits.color_depth.max(1),
                force_dither,
            ) && target.color_repr.bits.sample_depth <= 16;
            if should_dither {
                if let Some(dither_params) = params.dither_params {
                    crate::shaders::dither::append_dither(&mut plane_shader, &dither_params, 0)?;
                }
            }

            self.dispatch_plane_write(&plane_shader, plane, plane_rect, pw, ph)?;

            if !overlays_drawn_in_scale_main {
                self.draw_target_overlays(
                    plane,
                    &target.color_space,
                    image_overlays,
                    ratio.0,
                    ratio.1,
                    params.disable_overlay_sampling,
                )?;
            }
            self.draw_target_overlays(
                plane,
                &target.color_space,
                &target.overlays,
                ratio.0,
                ratio.1,
                params.disable_overlay_sampling,
            )?;
            let _ = plane_idx;
        }

        Ok(())
    }

    fn target_plane_storable(&self, plane: &crate::plane::Plane) -> bool {
        plane
            .texture
            .usage()
            .contains(wgpu::TextureUsages::STORAGE_BINDING)
    }

    /// Dispatches a finished plane shader onto `plane`'s texture, honoring
    /// x/y flips via the uv mirror `finish_shader` supports and restricting
    /// the draw to the plane's own cropped rectangle via a viewport (§4.6).
    fn dispatch_plane_write(
        &mut self,
        shader: &crate::inflight::ShaderObject,
        plane: &crate::plane::Plane,
        rect: crate::rect::Rect,
        w: u32,
        h: u32,
    ) -> Result<()> {
        let view = plane.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (norm, flip_x, flip_y) = rect.normalize();
        crate::inflight::finish_shader(
            &self.device,
            &self.queue,
            shader,
            &view,
            plane.texture.format(),
            wgpu::LoadOp::Load,
            crate::inflight::BlendMode::Replace,
            (flip_x, flip_y),
            Some((norm.x0, norm.y0, w as f32, h as f32)),
            &mut self.shader_module_cache,
            &mut self.pipeline_cache,
            "chromapipe_plane_write",
        )
    }
}

impl Image {
    /// Whether this image's ICC profile differs from the target's (§4.6).
    /// Neither side actually carries ICC bytes through the in-flight image
    /// today (§1, ICC profile handling is an out-of-scope external
    /// collaborator); this always reports "no difference" until that
    /// collaborator is wired in, matching §9's open question on 3D-LUT
    /// absence.
    fn icc_differs_from(&self, _target: &Frame) -> bool {
        false
    }
}

/// Encodes the working-space RGB color into the target's representation
/// (inverse of `read_image`'s decode), appended as a WGSL statement.
fn encode_color(image: &mut Image, target: &Frame) {
    if !target.color_repr.system.is_ycbcr_like() {
        return;
    }
    let decode = color::ycbcr_to_rgb_matrix(target.color_repr.system);
    let encode = color::invert3x3(decode);
    if let Some(shader) = image.as_shader_mut() {
        shader.append_statement(&format!(
            "let _rgb = color.rgb;\n\
             color = vec4<f32>(\n\
                 {:.6} * _rgb.x + {:.6} * _rgb.y + {:.6} * _rgb.z,\n\
                 {:.6} * _rgb.x + {:.6} * _rgb.y + {:.6} * _rgb.z + 0.5,\n\
                 {:.6} * _rgb.x + {:.6} * _rgb.y + {:.6} * _rgb.z + 0.5,\n\
                 color.a);",
            encode[0][0], encode[0][1], encode[0][2],
            encode[1][0], encode[1][1], encode[1][2],
            encode[2][0], encode[2][1], encode[2][2],
        ));
    }
}
