//! Renderer creation/destruction and capability probing (§4.1 format
//! selection, §6 lifecycle).

use crate::error::Result;
use crate::fbo_pool::{self, FboPool};
use crate::renderer::cache::{PipelineCache, ShaderCache, ShaderModuleCache};
use crate::renderer::disable_flags::DisableFlags;
use crate::renderer::peak_detect::PeakState;
use crate::renderer::{PersistentFilterState, Renderer, SamplerBank};

impl Renderer {
    /// `create(ctx, gpu) -> renderer` (§6): probes the best intermediate FBO
    /// format the adapter supports and derives the disable flags that follow
    /// from its capabilities (§4.1 "Derived disables"). If no candidate
    /// format matches at all, every intermediate-requiring feature is
    /// disabled up front rather than failing renderer creation.
    pub fn create(device: wgpu::Device, queue: wgpu::Queue, adapter: &wgpu::Adapter) -> Result<Self> {
        let caps = fbo_pool::select_fbo_format(adapter);
        let mut disable_flags = DisableFlags::empty();

        match caps {
            Some(caps) => {
                if !caps.storable {
                    log::info!("chromapipe: intermediate format has no STORAGE_BINDING, disabling compute-dependent features");
                    disable_flags.insert(DisableFlags::COMPUTE);
                }
                if !caps.is_float {
                    log::info!("chromapipe: intermediate format is not floating point, disabling HDR linear-light scaling");
                    disable_flags.insert(DisableFlags::LINEAR_HDR);
                }
                if caps.depth_bits < 16 {
                    log::info!("chromapipe: intermediate format depth < 16 bits, disabling SDR linear-light scaling");
                    disable_flags.insert(DisableFlags::LINEAR_SDR);
                }
            }
            None => {
                log::warn!("chromapipe: no suitable intermediate FBO format found on this adapter; disabling all intermediate-dependent features");
                disable_flags.insert(
                    DisableFlags::FBOS
                        | DisableFlags::COMPUTE
                        | DisableFlags::LINEAR_HDR
                        | DisableFlags::LINEAR_SDR
                        | DisableFlags::SAMPLING,
                );
            }
        }

        let fbo_pool = FboPool::new(caps.map(|c| c.format));
        let sampler_bank = SamplerBank::new(&device);

        Ok(Self {
            device,
            queue,
            fbo_format: caps,
            disable_flags,
            fbo_pool,
            peak_state: PeakState::new(),
            persistent_filters: PersistentFilterState::default(),
            shader_cache: ShaderCache::new(),
            shader_module_cache: ShaderModuleCache::new(),
            pipeline_cache: PipelineCache::new(),
            sampler_bank,
            hooks: Vec::new(),
        })
    }

    /// `destroy(renderer)` (§6): releases all FBOs, persistent shader-object
    /// handles, sampler-bank resources, and the dispatch child. In Rust this
    /// is simply dropping `self` — every GPU handle here is an owned,
    /// refcounted `wgpu` resource with no external lifetime to manage
    /// explicitly, so `destroy` exists as a named, documented entry point
    /// rather than because anything needs doing beyond `Drop`.
    pub fn destroy(self) {
        drop(self);
    }
}

impl SamplerBank {
    fn new(device: &wgpu::Device) -> Self {
        Self {
            main: crate::inflight::default_sampler(device),
            sources: smallvec::SmallVec::new(),
            destinations: smallvec::SmallVec::new(),
            overlay: Vec::new(),
        }
    }
}
