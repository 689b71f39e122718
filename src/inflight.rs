//! The in-flight image: the pipeline's tagged-union intermediate result
//! (§3, §4.1, §9 "Tagged union for the in-flight image").
//!
//! Exactly one of `{shader, texture}` is live at any time. We enforce that
//! with a Rust enum rather than two nullable fields, per §9's design note:
//! the "exactly one" invariant lives in the type itself.

use crate::color::{ColorRepr, ColorSpace};
use crate::error::{Error, Result};
use crate::fbo_pool::FboPool;
use crate::rect::Rect;
use crate::renderer::cache::{PipelineCache, ShaderModuleCache};

/// A texture binding an in-progress shader samples from.
#[derive(Clone, Copy)]
pub struct ShaderBinding {
    pub group: u32,
    pub binding: u32,
}

/// Packed uniform payload a `crate::shaders` builder can append to
/// `ShaderObject::uniform_bytes` instead of (or alongside) baking its
/// parameters as WGSL literals -- laid out `#[repr(C)]` for direct upload to
/// a uniform buffer by whichever builder's pipeline owns one.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GrainUniforms {
    pub seed: f32,
    pub intensity: f32,
    pub _pad: [f32; 2],
}

/// The under-construction form: an accumulating WGSL fragment body plus the
/// texture bindings and uniform bytes it has gathered so far. Individual
/// shader-builder modules (`crate::shaders::*`) append to this; the core
/// pipeline only needs to know how to start one, hand it to a builder, and
/// eventually finalize it onto a render target.
pub struct ShaderObject {
    /// Accumulated WGSL fragment-shader statements, executed in append order
    /// against a running `color: vec4<f32>` local.
    pub body: String,
    /// Bound input textures, each sampled through its own `sampler`.
    pub textures: Vec<(wgpu::TextureView, wgpu::Sampler)>,
    /// Raw uniform bytes for the current stage, if any stage needed one.
    pub uniform_bytes: Vec<u8>,
    /// True once a builder has appended a compute-only operation (e.g. peak
    /// detection); compute shaders cannot be fused with fragment-only
    /// builders (§4.4 step 9's "compute/fragment incompatibility").
    pub compute: bool,
    /// Some((w, h)) if a builder has pinned the output size (e.g. a
    /// fixed-ratio upscale kernel); `scale_main` must honor this.
    pub fixed_output_size: Option<(u32, u32)>,
}

impl ShaderObject {
    pub fn new() -> Self {
        Self {
            body: String::from("var color: vec4<f32> = vec4<f32>(0.0, 0.0, 0.0, 1.0);\n"),
            textures: Vec::new(),
            uniform_bytes: Vec::new(),
            compute: false,
            fixed_output_size: None,
        }
    }

    /// Begins a shader whose first operation is a direct sample from an
    /// existing texture (§4.1 `to_sh`).
    pub fn from_texture_sample(view: wgpu::TextureView, sampler: wgpu::Sampler) -> Self {
        let mut sh = Self::new();
        sh.textures.push((view, sampler));
        let idx = sh.textures.len() - 1;
        sh.body
            .push_str(&format!("color = textureSample(t{idx}, s{idx}, uv);\n"));
        sh
    }

    /// Appends a raw WGSL statement operating on the running `color` local.
    /// Used by `crate::shaders::*` builders to inline their operation
    /// instead of materializing an intermediate texture.
    pub fn append_statement(&mut self, wgsl: &str) {
        self.body.push_str(wgsl);
        self.body.push('\n');
    }

    /// Registers a new texture binding and returns the WGSL identifiers
    /// (`tN`, `sN`) a builder should use to reference it in an appended
    /// statement.
    pub fn bind_texture(&mut self, view: wgpu::TextureView, sampler: wgpu::Sampler) -> usize {
        self.textures.push((view, sampler));
        self.textures.len() - 1
    }

    /// Whether this shader can be fused as a sub-pass of another
    /// under-construction shader (§4.4 step 9: "try to inline ... if that
    /// fails, materialize an intermediate FBO"). Fusion fails once either
    /// side is compute-only, or the combined texture binding count would
    /// exceed the binding budget.
    pub fn can_fuse_into(&self, other: &ShaderObject) -> bool {
        !self.compute && !other.compute && self.textures.len() + other.textures.len() <= 16
    }
}

impl Default for ShaderObject {
    fn default() -> Self {
        Self::new()
    }
}

/// The committed form: a texture that already holds the result.
pub struct TextureImage {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

enum Form {
    Shader(ShaderObject),
    Texture(TextureImage),
}

/// The in-flight image (§3): dimensions, source rectangle, color
/// representation/space, component count, plus exactly one of
/// `{shader, texture}`.
pub struct Image {
    form: Form,
    pub w: u32,
    pub h: u32,
    pub rect: Rect,
    pub color_repr: ColorRepr,
    pub color_space: ColorSpace,
    pub components: u8,
}

impl Image {
    pub fn from_shader(
        shader: ShaderObject,
        w: u32,
        h: u32,
        rect: Rect,
        color_repr: ColorRepr,
        color_space: ColorSpace,
        components: u8,
    ) -> Self {
        Self {
            form: Form::Shader(shader),
            w,
            h,
            rect,
            color_repr,
            color_space,
            components,
        }
    }

    pub fn from_texture(
        texture: TextureImage,
        w: u32,
        h: u32,
        rect: Rect,
        color_repr: ColorRepr,
        color_space: ColorSpace,
        components: u8,
    ) -> Self {
        Self {
            form: Form::Texture(texture),
            w,
            h,
            rect,
            color_repr,
            color_space,
            components,
        }
    }

    pub fn is_texture(&self) -> bool {
        matches!(self.form, Form::Texture(_))
    }

    pub fn is_shader(&self) -> bool {
        matches!(self.form, Form::Shader(_))
    }

    pub fn as_shader(&self) -> Option<&ShaderObject> {
        match &self.form {
            Form::Shader(s) => Some(s),
            Form::Texture(_) => None,
        }
    }

    pub fn as_shader_mut(&mut self) -> Option<&mut ShaderObject> {
        match &mut self.form {
            Form::Shader(s) => Some(s),
            Form::Texture(_) => None,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureImage> {
        match &self.form {
            Form::Texture(t) => Some(t),
            Form::Shader(_) => None,
        }
    }

    /// `to_tex(img)` from §4.1: if already a texture, no-op; otherwise
    /// dispatch-finish the shader onto a pooled FBO of `(w, h)` and replace
    /// the form with that texture.
    ///
    /// On FBO-allocation failure the pool is disabled permanently, the
    /// in-flight shader is abandoned, and `Err` is returned — callers
    /// (ultimately `render`) treat this as a dispatch failure per §7.
    #[allow(clippy::too_many_arguments)]
    pub fn to_tex(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        fbo_pool: &mut FboPool,
        fbos_used: &mut Vec<bool>,
        module_cache: &mut ShaderModuleCache,
        pipeline_cache: &mut PipelineCache,
    ) -> Result<()> {
        if self.is_texture() {
            return Ok(());
        }

        let idx = match fbo_pool.get_fbo(device, fbos_used, self.w, self.h) {
            Ok(Some(idx)) => idx,
            Ok(None) | Err(_) => {
                fbo_pool.disable();
                return Err(crate::fbo_pool::allocation_failed());
            }
        };

        let shader = match &self.form {
            Form::Shader(s) => s,
            Form::Texture(_) => unreachable!(),
        };
        let format = fbo_pool
            .format()
            .expect("fbo format is Some since get_fbo just returned an index");
        dispatch_shader_to_fbo(device, queue, shader, fbo_pool.view(idx), format, module_cache, pipeline_cache)?;

        // The FBO is owned by the pool; the in-flight image just needs a
        // texture handle to read back from going forward, so we re-wrap the
        // pool's own texture/view (the pool keeps the GPU object resident,
        // per §5 "renderer-scoped for residency").
        let texture = fbo_pool.texture(idx).clone();
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.form = Form::Texture(TextureImage { texture, view });
        Ok(())
    }

    /// `to_sh(img)` from §4.1: if already a shader, no-op; otherwise begin a
    /// fresh shader whose first operation is a direct sample from the
    /// texture.
    pub fn to_sh(&mut self, device: &wgpu::Device) {
        if self.is_shader() {
            return;
        }
        let tex = match &self.form {
            Form::Texture(t) => t,
            Form::Shader(_) => unreachable!(),
        };
        let sampler = default_sampler(device);
        let view = tex.texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.form = Form::Shader(ShaderObject::from_texture_sample(view, sampler));
    }
}

pub fn default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Finishes an accumulated shader body onto a pooled FBO, always clearing
/// first and never blending -- the common case for every pipeline stage
/// that materializes an under-construction shader as a fresh texture.
fn dispatch_shader_to_fbo(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    shader: &ShaderObject,
    target: &wgpu::TextureView,
    target_format: wgpu::TextureFormat,
    module_cache: &mut ShaderModuleCache,
    pipeline_cache: &mut PipelineCache,
) -> Result<()> {
    finish_shader(
        device,
        queue,
        shader,
        target,
        target_format,
        wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        BlendMode::Replace,
        (false, false),
        None,
        module_cache,
        pipeline_cache,
        "chromapipe_finish_shader",
    )
}

/// The fixed-function blend state a finished shader draws with, chosen by
/// the caller rather than baked into the WGSL (§4.7's overlay blend is a
/// `ColorTargetState`, not fragment-shader math).
pub(crate) enum BlendMode {
    /// Opaque overwrite: the usual case for materializing a shader as a
    /// fresh texture.
    Replace,
    /// Straight alpha-over, `(SRC_ALPHA, 1-SRC_ALPHA)` color and
    /// `(ONE, 1-SRC_ALPHA)` alpha, matching `overlay::draw_one_overlay`'s
    /// own documented blend factors.
    SourceOver,
}

impl BlendMode {
    fn state(&self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Replace => None,
            BlendMode::SourceOver => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        }
    }
}

/// Compiles (or reuses) the pipeline for an accumulated shader body and
/// draws it over a fullscreen triangle onto `target`, following the
/// teacher's compile pattern (`effect::build_effect_wgsl` +
/// `compile_effect_pipeline` + `passes::apply_effect_passes`'s
/// `set_pipeline`/`set_bind_group`/`draw` sequence), generalized from the
/// teacher's fixed single-texture effect input to however many textures
/// `shader.textures` has accumulated.
///
/// `flip` mirrors the uv's x/y axis before the body runs (§4.6's
/// destination-rect flip handling); `viewport` restricts the draw to a
/// sub-rectangle of `target` (used by `output_target::dispatch_plane_write`
/// to write only the plane's cropped region).
#[allow(clippy::too_many_arguments)]
pub(crate) fn finish_shader(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    shader: &ShaderObject,
    target: &wgpu::TextureView,
    target_format: wgpu::TextureFormat,
    load: wgpu::LoadOp<wgpu::Color>,
    blend: BlendMode,
    flip: (bool, bool),
    viewport: Option<(f32, f32, f32, f32)>,
    module_cache: &mut ShaderModuleCache,
    pipeline_cache: &mut PipelineCache,
    label: &str,
) -> Result<()> {
    if shader.compute {
        // Compute-mode shaders (e.g. a peak-detect pass fused in) dispatch
        // through a compute pipeline instead of a render pass; building one
        // from the accumulated body is the job of the originating
        // `crate::shaders` builder, which attaches its own compute pipeline
        // object rather than relying on this generic fragment finisher.
        return Err(Error::Dispatch(
            "compute-mode shader cannot be finished by the generic fragment dispatcher",
        ));
    }

    let mut flip_stmts = String::new();
    if flip.0 {
        flip_stmts.push_str("    uv.x = 1.0 - uv.x;\n");
    }
    if flip.1 {
        flip_stmts.push_str("    uv.y = 1.0 - uv.y;\n");
    }

    let wgsl = format!(
        "{}\n{}{}{}{}\nreturn color;\n}}",
        FULLSCREEN_TRIANGLE_VS,
        texture_preamble(shader.textures.len()),
        FRAGMENT_ENTRY_HEADER,
        flip_stmts,
        shader.body
    );
    // The accumulated body is frequently identical across frames (same
    // hooks, same filter config), so look the compiled module/pipeline up
    // by source hash rather than recompiling/relinking every dispatch.
    let module = module_cache.get_or_compile(device, &wgsl);
    let (pipeline, layout) = pipeline_cache.get_or_build(
        device,
        module,
        &wgsl,
        shader.textures.len(),
        target_format,
        blend.state(),
    );
    let bind_group = build_texture_bind_group(device, layout, &shader.textures);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        if let Some((x, y, w, h)) = viewport {
            pass.set_viewport(x, y, w.max(1.0), h.max(1.0), 0.0, 1.0);
        }
        pass.draw(0..3, 0..1);
    }
    queue.submit(std::iter::once(encoder.finish()));
    Ok(())
}

/// Module-scope `@group(0)` texture/sampler pairs for every texture
/// `ShaderObject::bind_texture` recorded, at the same `(2i, 2i+1)` bindings
/// `cache::build_texture_bind_group_layout` lays the group out with.
fn texture_preamble(texture_count: usize) -> String {
    let mut out = String::new();
    for i in 0..texture_count {
        out.push_str(&format!(
            "@group(0) @binding({}) var t{i}: texture_2d<f32>;\n@group(0) @binding({}) var s{i}: sampler;\n",
            2 * i,
            2 * i + 1
        ));
    }
    out
}

/// Builds the per-draw bind group for a finished shader's bound textures --
/// not cached, unlike the layout/pipeline it matches, since the actual
/// texture views vary per call even when the WGSL/format/blend are the same.
fn build_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    textures: &[(wgpu::TextureView, wgpu::Sampler)],
) -> wgpu::BindGroup {
    let mut entries = Vec::with_capacity(textures.len() * 2);
    for (i, (view, sampler)) in textures.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (2 * i) as u32,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (2 * i + 1) as u32,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("chromapipe_shader_bind_group"),
        layout,
        entries: &entries,
    })
}

const FULLSCREEN_TRIANGLE_VS: &str = r#"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VsOut {
    let uv = vec2<f32>(f32((vi << 1u) & 2u), f32(vi & 2u));
    var out: VsOut;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}
"#;

const FRAGMENT_ENTRY_HEADER: &str = "@fragment\nfn fs_main(in: VsOut) -> @location(0) vec4<f32> {\n    var uv: vec2<f32> = in.uv;\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_shader_object_starts_with_neutral_black() {
        let sh = ShaderObject::new();
        assert!(sh.body.contains("0.0, 0.0, 0.0, 1.0"));
        assert!(sh.textures.is_empty());
        assert!(!sh.compute);
    }

    #[test]
    fn fusion_rejects_compute_shaders() {
        let mut a = ShaderObject::new();
        let b = ShaderObject::new();
        assert!(a.can_fuse_into(&b));
        a.compute = true;
        assert!(!a.can_fuse_into(&b));
    }
}
