//! Persistent shader-binary cache delegation (§6, AMBIENT 6.1): `save`/
//! `load` hand off to `wgpu::PipelineCache` rather than inventing a bespoke
//! on-disk format, the same way the teacher treats persistent GPU objects
//! as owned, long-lived handles recreated only on explicit resize/flush.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

use ahash::RandomState;
use lru::LruCache;

/// Bounds how many distinct compiled `ShaderModule`s the in-memory cache
/// below keeps resident. A render loop driving a handful of hook/filter
/// configurations steady-state stays well under this; it exists to cap
/// growth for callers that vary shader bodies unboundedly (e.g. per-frame
/// hook closures that bake a literal into the WGSL text).
const MODULE_CACHE_CAPACITY: usize = 64;

/// Caches compiled `wgpu::ShaderModule`s by an `ahash` hash of their WGSL
/// source, evicted least-recently-used once `MODULE_CACHE_CAPACITY` is
/// exceeded. The accumulated fragment body in `ShaderObject` is frequently
/// identical across frames (same hooks, same filter config), so this turns
/// repeat `dispatch_shader_to_fbo` calls into a cache hit instead of a full
/// shader compile.
pub struct ShaderModuleCache {
    hasher: RandomState,
    modules: LruCache<u64, wgpu::ShaderModule>,
}

impl ShaderModuleCache {
    pub fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            modules: LruCache::new(std::num::NonZeroUsize::new(MODULE_CACHE_CAPACITY).unwrap()),
        }
    }

    /// Returns the cached module for `wgsl`, compiling and inserting one if
    /// this is the first time this exact source has been seen (or if it was
    /// since evicted).
    pub fn get_or_compile(&mut self, device: &wgpu::Device, wgsl: &str) -> &wgpu::ShaderModule {
        let mut hasher = self.hasher.build_hasher();
        hasher.write(wgsl.as_bytes());
        let key = hasher.finish();

        self.modules.get_or_insert(key, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("chromapipe_inflight_finish"),
                source: wgpu::ShaderSource::Wgsl(wgsl.to_string().into()),
            })
        })
    }
}

impl Default for ShaderModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

const PIPELINE_CACHE_CAPACITY: usize = 64;

/// Builds the `@group(0)` bind group layout for a fragment body that samples
/// `texture_count` bound textures, each at `(2i, 2i+1)` (texture, sampler) --
/// the same pairing `crate::inflight::ShaderObject::bind_texture` hands out
/// as `tN`/`sN` identifiers, generalized from the teacher's
/// `effect::create_effect_input_bind_group_layout` fixed single-texture
/// layout to however many textures a given shader body accumulated.
fn build_texture_bind_group_layout(device: &wgpu::Device, texture_count: usize) -> wgpu::BindGroupLayout {
    let mut entries = Vec::with_capacity(texture_count * 2);
    for i in 0..texture_count {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (2 * i) as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (2 * i + 1) as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("chromapipe_shader_bgl"),
        entries: &entries,
    })
}

/// Caches compiled `wgpu::RenderPipeline`s for `crate::inflight::finish_shader`,
/// keyed by the same WGSL source `ShaderModuleCache` hashes plus the target
/// format and blend state a pipeline additionally depends on (the accumulated
/// body alone doesn't determine those). Bind group layouts are cached
/// separately, by texture count only, since the same layout is reused across
/// every pipeline with that many bound textures -- mirroring the teacher's
/// `LoadedEffect` splitting a shared `input_bind_group_layout` from its
/// per-pass `pipeline`.
pub struct PipelineCache {
    hasher: RandomState,
    bind_group_layouts: HashMap<usize, Rc<wgpu::BindGroupLayout>>,
    pipelines: LruCache<u64, (wgpu::RenderPipeline, Rc<wgpu::BindGroupLayout>)>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            bind_group_layouts: HashMap::new(),
            pipelines: LruCache::new(std::num::NonZeroUsize::new(PIPELINE_CACHE_CAPACITY).unwrap()),
        }
    }

    fn layout_for(&mut self, device: &wgpu::Device, texture_count: usize) -> Rc<wgpu::BindGroupLayout> {
        self.bind_group_layouts
            .entry(texture_count)
            .or_insert_with(|| Rc::new(build_texture_bind_group_layout(device, texture_count)))
            .clone()
    }

    /// Returns the cached `(pipeline, bind group layout)` pair for this
    /// accumulated body, building one (via a fullscreen-triangle vertex
    /// stage + the body's own fragment entry point, following
    /// `effect::compile_effect_pipeline`) if this exact
    /// (source, format, texture count, blend) combination hasn't been seen.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_build(
        &mut self,
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        wgsl: &str,
        texture_count: usize,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> (&wgpu::RenderPipeline, &wgpu::BindGroupLayout) {
        let layout = self.layout_for(device, texture_count);

        let full_key = format!("{wgsl}|{format:?}|{texture_count}|{blend:?}");
        let mut hasher = self.hasher.build_hasher();
        hasher.write(full_key.as_bytes());
        let key = hasher.finish();

        let entry = self.pipelines.get_or_insert(key, || {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("chromapipe_pipeline_layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("chromapipe_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            (pipeline, layout)
        });
        (&entry.0, entry.1.as_ref())
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps an optional `wgpu::PipelineCache`, present only when the adapter
/// exposes `Features::PIPELINE_CACHE`.
pub struct ShaderCache {
    cache: Option<wgpu::PipelineCache>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self { cache: None }
    }

    /// Creates the underlying `wgpu::PipelineCache`, optionally seeded from
    /// previously-saved bytes (`load`). Replaces the field with a stub
    /// no-op (`cache = None`) if the device lacks the feature, matching the
    /// spec's framing of the cache as a pure pass-through.
    pub fn load(&mut self, device: &wgpu::Device, data: Option<&[u8]>) {
        if !device.features().contains(wgpu::Features::PIPELINE_CACHE) {
            log::info!("chromapipe: device lacks PIPELINE_CACHE feature, shader cache disabled");
            self.cache = None;
            return;
        }
        let descriptor = wgpu::PipelineCacheDescriptor {
            label: Some("chromapipe_shader_cache"),
            data,
            fallback: true,
        };
        // SAFETY-equivalent contract lives in `wgpu`: passing possibly-stale
        // cache bytes from a previous driver/GPU is handled by `fallback`.
        self.cache = Some(unsafe { device.create_pipeline_cache(&descriptor) });
    }

    /// `save(renderer, buf) -> bytes_written` (§6).
    pub fn save(&self) -> Option<Vec<u8>> {
        self.cache.as_ref().and_then(|c| c.get_data())
    }

    pub fn get(&self) -> Option<&wgpu::PipelineCache> {
        self.cache.as_ref()
    }
}

impl Default for ShaderCache {
    fn default() -> Self {
        Self::new()
    }
}
