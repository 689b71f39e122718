//! The renderer (§3, §6): owns every renderer-scoped resource across
//! frames -- the FBO pool, the one-way disable-flag latch, the HDR peak
//! state, and the sampler bank -- and drives a single `render` call through
//! `read_image` -> `scale_main` -> `output_target`. The hook list itself is
//! per-call (`RenderParams::hooks`, §6), borrowed onto the renderer only
//! for the duration of that call (see `render`).

use smallvec::SmallVec;

use crate::error::Result;
use crate::fbo_pool::{FboPool, FormatCaps};
use crate::frame::Frame;
use crate::hooks::Hook;
use crate::params::RenderParams;
use crate::renderer::cache::{PipelineCache, ShaderCache, ShaderModuleCache};
use crate::renderer::disable_flags::DisableFlags;
use crate::renderer::peak_detect::PeakState;

pub(crate) mod cache;
mod construction;
mod output_target;
mod overlay;
mod scale_main;

pub(crate) mod disable_flags;
pub(crate) mod peak_detect;
pub(crate) mod read_image;

/// Persistent per-axis filter handles (§4.2 "persistent shader-object
/// handles split by direction"): the vertical and horizontal separable
/// passes keep their own intermediate FBO sized to the last dispatch, so a
/// steady-state render loop doesn't reallocate every frame.
#[derive(Default)]
pub(crate) struct AxisFilterState {
    pub vertical_fbo_size: Option<(u32, u32)>,
    pub horizontal_fbo_size: Option<(u32, u32)>,
}

/// §4.2's persistent filter handles, kept across frames and only
/// invalidated by an explicit resize or `flush_cache` (§6).
#[derive(Default)]
pub(crate) struct PersistentFilterState {
    pub upscale: AxisFilterState,
    pub downscale: AxisFilterState,
}

/// The renderer-scoped sampler objects (§4.2, §4.7): one "main" sampler
/// used for most plane reads, plus small per-direction and per-overlay
/// banks built up lazily as distinct address-mode/filter combinations are
/// requested.
pub(crate) struct SamplerBank {
    pub main: wgpu::Sampler,
    pub sources: SmallVec<[wgpu::Sampler; 4]>,
    pub destinations: SmallVec<[wgpu::Sampler; 4]>,
    pub overlay: Vec<wgpu::Sampler>,
}

/// The renderer (§3): a long-lived object holding everything that must
/// persist across frames. Built once via [`Renderer::create`] and reused
/// for the lifetime of the owning application.
pub struct Renderer {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) fbo_format: Option<FormatCaps>,
    pub(crate) disable_flags: DisableFlags,
    pub(crate) fbo_pool: FboPool,
    pub(crate) peak_state: PeakState,
    pub(crate) persistent_filters: PersistentFilterState,
    pub(crate) shader_cache: ShaderCache,
    /// Compiled-module cache keyed by a hash of the accumulated WGSL body
    /// (§4.1 `dispatch_shader_to_fbo`); distinct from `shader_cache`, which
    /// is the persistent on-disk `wgpu::PipelineCache` blob (§6 AMBIENT 6.1).
    pub(crate) shader_module_cache: ShaderModuleCache,
    /// Compiled-pipeline cache for `crate::inflight::finish_shader`, keyed
    /// beyond `shader_module_cache`'s WGSL-source hash by target format and
    /// blend state, the two additional axes a `wgpu::RenderPipeline` depends
    /// on that the module alone doesn't capture.
    pub(crate) pipeline_cache: PipelineCache,
    pub(crate) sampler_bank: SamplerBank,
    /// The hooks active for the render call currently in flight (§4.3,
    /// §6). Populated from `RenderParams::hooks` at the start of `render`
    /// and drained back into it at the end, since `Hook`'s `FnMut`
    /// callback needs `&mut` access to invoke but `RenderParams` is only
    /// borrowed immutably by the rest of the pipeline.
    pub(crate) hooks: Vec<Hook>,
}

impl Renderer {
    /// `render(renderer, image, target, params) -> ok` (§6): the top-level
    /// entry point. Prepares both frames, reads and merges the source
    /// image, scales and color-manages it, and fans it out onto every
    /// target plane.
    ///
    /// Collapses the internal `Result<(), Error>` into a boolean, per §7:
    /// a failed render leaves the renderer in a documented degraded state
    /// (some `DisableFlags` bit latched) and returns `false` rather than
    /// propagating a typed error to the caller, matching the C-ABI origin
    /// of this entry point in spirit.
    pub fn render(&mut self, image: &mut Frame, target: &mut Frame, params: &mut RenderParams) -> bool {
        // `Hook::callback` is `FnMut`, so invoking it needs `&mut Hook`;
        // everything downstream only ever sees `&RenderParams`, so the
        // active hook list is moved onto `self` for the duration of the
        // call and handed back afterwards regardless of outcome (§4.3).
        self.hooks = std::mem::take(&mut params.hooks);
        let result = self.render_inner(image, target, params);
        params.hooks = std::mem::take(&mut self.hooks);

        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("chromapipe: render failed: {e}");
                false
            }
        }
    }

    fn render_inner(&mut self, image: &mut Frame, target: &mut Frame, params: &RenderParams) -> Result<()> {
        crate::frame::validate(image, false)?;
        crate::frame::validate(target, true)?;
        crate::frame::fix_refs_and_rects(image)?;
        crate::frame::fix_refs_and_rects(target)?;
        crate::frame::fix_color_space(image, None);
        crate::frame::fix_color_space(target, None);

        if params.disable_fbos && !self.disable_flags.contains(DisableFlags::FBOS) {
            log::info!("chromapipe: disable_fbos requested, disabling intermediate FBO allocation permanently");
            self.disable_flags.insert(DisableFlags::FBOS);
            self.fbo_pool.disable();
        }

        let mut pass_fbos_used = vec![false; self.fbo_pool.len()];

        let mut in_flight = self.read_image(image, params, &mut pass_fbos_used)?;

        let (dst_w, dst_h) = target
            .reference_plane()
            .map(|p| (p.width(), p.height()))
            .ok_or_else(|| crate::error::Error::Validation("target frame has no reference plane".into()))?;

        let overlays_drawn = self.scale_main(&mut in_flight, image, dst_w, dst_h, params, &mut pass_fbos_used)?;

        self.output_target(
            &mut in_flight,
            &image.overlays,
            target,
            params,
            overlays_drawn,
            &mut pass_fbos_used,
        )?;

        Ok(())
    }

    /// `flush_cache(renderer)` (§6): drops every pooled FBO and the
    /// persistent filter state, and clears the one flag the disable latch
    /// permits clearing (`PEAK_DETECT`), so the next frame is measured
    /// fresh rather than carrying over smoothing state for content that no
    /// longer exists.
    pub fn flush_cache(&mut self) {
        self.fbo_pool = FboPool::new(self.fbo_format.map(|c| c.format));
        self.persistent_filters = PersistentFilterState::default();
        self.peak_state = PeakState::new();
        self.disable_flags.clear_peak_detect();
    }

    /// `resize(renderer)` (§6): a lighter-weight relative of `flush_cache`
    /// for a destination-size change -- drops pooled FBOs and per-axis
    /// filter state (both sized to the old geometry) but keeps the peak
    /// state, since scene HDR statistics don't depend on output size.
    pub fn resize(&mut self) {
        self.fbo_pool = FboPool::new(self.fbo_format.map(|c| c.format));
        self.persistent_filters = PersistentFilterState::default();
    }

    /// `load_shader_cache`/`save_shader_cache` (§6 AMBIENT 6.1): delegates
    /// to the underlying `wgpu::PipelineCache`.
    pub fn load_shader_cache(&mut self, data: Option<&[u8]>) {
        self.shader_cache.load(&self.device, data);
    }

    pub fn save_shader_cache(&self) -> Option<Vec<u8>> {
        self.shader_cache.save()
    }
}
