//! # chromapipe
//!
//! A GPU-accelerated, color-managed image rendering pipeline built on
//! [`wgpu`]. `chromapipe` takes a source video frame, described as a set of
//! GPU textures in some native color encoding, and renders it into a target
//! frame while applying plane merging, debanding, film-grain synthesis,
//! linearization, sigmoidization, scaling, HDR tone mapping, 3D-LUT color
//! management, dithering, and overlay compositing.
//!
//! The pipeline degrades gracefully: when the GPU adapter is missing a
//! capability (storable textures, floating-point intermediates, blendable
//! targets, linear sampling), the affected feature is disabled for the
//! renderer's lifetime and the render continues rather than failing.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use futures::executor::block_on;
//!
//! async fn setup() {
//!     let instance = wgpu::Instance::default();
//!     let adapter = instance
//!         .request_adapter(&wgpu::RequestAdapterOptions::default())
//!         .await
//!         .expect("no suitable GPU adapter");
//!     let (device, queue) = adapter
//!         .request_device(&wgpu::DeviceDescriptor::default())
//!         .await
//!         .expect("failed to create device");
//!
//!     let mut renderer = chromapipe::Renderer::create(device, queue, &adapter)
//!         .expect("failed to create renderer");
//!     let params = chromapipe::default_params();
//!     let _ = params; // build `image`/`target` frames, then call `renderer.render(...)`
//! }
//!
//! block_on(setup());
//! ```

mod color;
mod error;
mod fbo_pool;
mod frame;
mod hooks;
mod inflight;
mod params;
mod plane;
mod rect;
mod renderer;
mod sampler;
mod shaders;

pub use color::{
    cone_distortion_matrix, ColorLevels, ColorLight, ColorPrimaries, ColorRepr, ColorSpace,
    ColorSystem, ConeModel, TransferFunction,
};
pub use error::{Error, Result};
pub use frame::{
    clear, default_rect, fix_color_space, fix_refs_and_rects, from_swapchain, is_cropped,
    set_chroma_location, validate, Frame, GrainParams, Overlay, OverlayMode, MAX_PLANES,
};
pub use hooks::{Hook, HookContext, HookOutput, Signature, Stage};
pub use inflight::{Image, ShaderBinding, ShaderObject, TextureImage};
pub use params::{
    default_params, high_quality_params, BlendParams, ColorMapParams, ConeParams, DebandParams,
    DitherParams, FrameMixerParams, Lut3dParams, PeakDetectParams, RenderParams, SigmoidParams,
};
pub use plane::{Channel, Plane, PlaneType};
pub use rect::Rect;
pub use renderer::Renderer;
pub use sampler::{Direction, FilterConfig, FilterKind, SamplerType};

pub use wgpu;
