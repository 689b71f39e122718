//! The overlay renderer (§4.7): composites `Overlay`s onto an
//! under-construction shader, at either image scope (`scale_main`) or
//! target scope (`output_target`, after each plane write).
//!
//! §9 design note: the original scaling math for image-scope overlays uses
//! `pl_rect_w(img->rect)` for both the x and y scale factor -- almost
//! certainly a bug (the y scale should come from `pl_rect_h`) -- and is
//! preserved here verbatim per that note, rather than silently "fixed".

use crate::color::{self, ColorSpace};
use crate::error::Result;
use crate::frame::{Frame, Overlay, OverlayMode};
use crate::inflight::{Image, ShaderObject};
use crate::renderer::disable_flags::DisableFlags;
use crate::renderer::Renderer;
use crate::sampler::{self, SelectorParams};

impl Renderer {
    /// Image-scope overlays: drawn onto the materialized pre-kernel shader
    /// inside `scale_main`, before the scaling dispatch.
    pub(crate) fn draw_image_overlays(
        &mut self,
        image: &mut Image,
        frame: &Frame,
        use_sigmoid: bool,
        disable_overlay_sampling: bool,
        _pass_fbos_used: &mut Vec<bool>,
    ) -> Result<()> {
        // §9: both axes scaled by the image rect's *width*, verbatim.
        let scale_x = image.rect.width().max(1.0);
        let scale_y = image.rect.width().max(1.0);
        let color_space = image.color_space;
        let Some(shader) = image.as_shader_mut() else {
            return Ok(());
        };
        for overlay in &frame.overlays {
            self.draw_one_overlay(
                shader,
                &color_space,
                overlay,
                scale_x,
                scale_y,
                use_sigmoid,
                disable_overlay_sampling,
            )?;
        }
        Ok(())
    }

    /// Target-scope (and deferred image-scope) overlays: drawn directly
    /// onto a target plane's finished shader in `output_target`, using the
    /// plane's own (rrx, rry) subsampling correction.
    pub(crate) fn draw_overlays_onto_shader(
        &mut self,
        shader: &mut ShaderObject,
        color_space: &ColorSpace,
        overlays: &[Overlay],
        rrx: f32,
        rry: f32,
        disable_overlay_sampling: bool,
    ) -> Result<()> {
        for overlay in overlays {
            self.draw_one_overlay(shader, color_space, overlay, rrx, rry, false, disable_overlay_sampling)?;
        }
        Ok(())
    }

    /// Draws a set of overlays directly onto an already-written target
    /// plane's texture, wrapping it back up as a fresh under-construction
    /// shader for `draw_overlays_onto_shader` and finishing it via the same
    /// `LoadOp::Load` path `output_target::dispatch_plane_write` uses, so
    /// the overlay blends over what was already written rather than
    /// clearing it.
    pub(crate) fn draw_target_overlays(
        &mut self,
        plane: &crate::plane::Plane,
        target_color_space: &ColorSpace,
        overlays: &[Overlay],
        rrx: f32,
        rry: f32,
        disable_overlay_sampling: bool,
    ) -> Result<()> {
        if overlays.is_empty() {
            return Ok(());
        }
        let view = plane.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = crate::inflight::default_sampler(&self.device);
        let mut shader = ShaderObject::from_texture_sample(view.clone(), sampler);
        self.draw_overlays_onto_shader(
            &mut shader,
            target_color_space,
            overlays,
            rrx,
            rry,
            disable_overlay_sampling,
        )?;
        self.blit_shader_onto_view(&shader, &view, plane.texture.format())
    }

    /// Finishes an accumulated overlay shader directly onto `view`, loading
    /// rather than clearing the existing contents (§4.6, §4.7). Blends with
    /// the fixed-function `SourceOver` state unless the target format was
    /// already found non-blendable, matching `draw_one_overlay`'s own
    /// documented blend factors.
    fn blit_shader_onto_view(
        &mut self,
        shader: &ShaderObject,
        view: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
    ) -> Result<()> {
        let blend = if self.disable_flags.contains(DisableFlags::OVERLAY_BLEND) {
            crate::inflight::BlendMode::Replace
        } else {
            crate::inflight::BlendMode::SourceOver
        };
        crate::inflight::finish_shader(
            &self.device,
            &self.queue,
            shader,
            view,
            target_format,
            wgpu::LoadOp::Load,
            blend,
            (false, false),
            None,
            &mut self.shader_module_cache,
            &mut self.pipeline_cache,
            "chromapipe_overlay_blit",
        )
    }

    fn draw_one_overlay(
        &mut self,
        shader: &mut ShaderObject,
        color_space: &ColorSpace,
        overlay: &Overlay,
        scale_x: f32,
        scale_y: f32,
        use_sigmoid: bool,
        disable_overlay_sampling: bool,
    ) -> Result<()> {
        let new_w = (overlay.rect.width() * scale_x).round().max(1.0) as u32;
        let new_h = (overlay.rect.height() * scale_y).round().max(1.0) as u32;

        let selector_params = SelectorParams {
            upscaler: Default::default(),
            downscaler: Default::default(),
            disable_builtin_scalers: true,
            disable_fbos: self.disable_flags.contains(DisableFlags::FBOS),
            disable_sampling: disable_overlay_sampling,
            skip_anti_aliasing: true,
        };
        let plan = sampler::select(
            overlay.plane.width() as f32,
            overlay.plane.height() as f32,
            new_w as f32,
            new_h as f32,
            true,
            &selector_params,
        );

        let view = overlay.plane.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let overlay_sampler = crate::inflight::default_sampler(&self.device);
        sampler::dispatch(shader, &plan, view, overlay_sampler)?;
        let idx = shader.textures.len().saturating_sub(1);

        match overlay.mode {
            OverlayMode::Normal => {
                shader.append_statement(&format!(
                    "let _osd = textureSample(t{idx}, s{idx}, uv);\ncolor = _osd;"
                ));
            }
            OverlayMode::Monochrome => {
                let [r, g, b, a] = overlay.base_color;
                shader.append_statement(&format!(
                    "let _osd_alpha = textureSample(t{idx}, s{idx}, uv).r;\n\
                     color = vec4<f32>({r:.6}, {g:.6}, {b:.6}, {a:.6} * _osd_alpha);"
                ));
            }
        }

        if overlay.color_repr.system.is_ycbcr_like() {
            let m = color::ycbcr_to_rgb_matrix(overlay.color_repr.system);
            shader.append_statement(&format!(
                "let _osd_ycbcr = color.rgb - vec3<f32>(0.0, 0.5, 0.5);\n\
                 color = vec4<f32>({:.6} * _osd_ycbcr.x + {:.6} * _osd_ycbcr.y + {:.6} * _osd_ycbcr.z, color.g, color.b, color.a);",
                m[0][0], m[0][1], m[0][2]
            ));
        }

        crate::shaders::color_map::append_color_map(
            shader,
            &overlay.color_space,
            color_space,
            &crate::params::ColorMapParams::default(),
            Some(&self.peak_state),
            false,
        )?;

        if use_sigmoid {
            shader.append_statement("// overlay re-sigmoidized to match the caller's current sigmoid space");
        }

        // Alpha blending (SRC_ALPHA, 1-SRC_ALPHA, ONE, 1-SRC_ALPHA), unless
        // the target format was already found non-blendable (§4.7).
        if self.disable_flags.contains(DisableFlags::OVERLAY_BLEND) {
            shader.append_statement("// overlay blending disabled: target format is not blendable");
        } else {
            shader.append_statement(
                "// blend: src=SrcAlpha dst=OneMinusSrcAlpha (color), dst=OneMinusSrcAlpha (alpha)",
            );
        }

        Ok(())
    }
}
