//! Integration tests exercising whole-pipeline scenarios from the
//! render-invariants and scenario list. Each test builds a headless
//! `Renderer` exactly as the teacher's `tests/visual_regression.rs` does
//! (`futures::executor::block_on` over `wgpu`'s async adapter/device
//! request), then drives one scenario through `Renderer::render`.
//!
//! Tests are skipped (not failed) when no GPU adapter is available, the
//! same graceful-skip the teacher's own headless constructor supports, so
//! these still compile and pass in a CI sandbox with no GPU.

mod common;

use futures::executor::block_on;

use chromapipe::{Hook, HookContext, HookOutput, Overlay, OverlayMode, Renderer, Rect, Signature, Stage};

macro_rules! require_adapter {
    () => {
        match block_on(common::try_setup()) {
            Some(setup) => setup,
            None => {
                eprintln!("skipping: no GPU adapter available in this environment");
                return;
            }
        }
    };
}

/// Scenario 1 (§8): identity YCbCr -> RGB, no scaling, no overlays. A
/// 1920x1080-shaped (scaled down to keep the test fast) YUV420 source
/// merges into an RGBA target of the same size; the NOOP/no-hook-demand
/// short circuit means `render` should succeed without needing a main-scale
/// intermediate FBO.
#[test]
fn identity_ycbcr_to_rgb_no_scaling() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::yuv420_frame(&device, 64, 64);
    let mut target = common::rgba_frame(&device, 64, 64, true);

    let mut params = chromapipe::default_params();
    assert!(renderer.render(&mut image, &mut target, &mut params));
}

/// Scenario 6 (§8): with `disable_fbos` set, a render that needs an
/// intermediate FBO (forced here via a `PRE_KERNEL` hook) must fail rather
/// than silently skip the hook.
#[test]
fn disable_fbos_fails_when_a_hook_needs_one() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::yuv420_frame(&device, 64, 64);
    let mut target = common::rgba_frame(&device, 128, 128, true);

    let mut params = chromapipe::default_params();
    params.disable_fbos = true;
    params.hooks = vec![Hook::new(
        Stage::PRE_KERNEL,
        Signature::None,
        Signature::None,
        |_img, _ctx: &mut HookContext| HookOutput::None,
    )];

    assert!(!renderer.render(&mut image, &mut target, &mut params));
}

/// Scenario 6's direct-path counterpart: the same `disable_fbos` renderer
/// succeeds when nothing demands an intermediate (no hooks, no overlays),
/// since the sampler selector falls back to `DIRECT` and `scale_main`
/// short-circuits before ever touching the FBO pool.
#[test]
fn disable_fbos_succeeds_without_hook_demand() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::yuv420_frame(&device, 64, 64);
    let mut target = common::rgba_frame(&device, 128, 128, true);

    let mut params = chromapipe::default_params();
    params.disable_fbos = true;

    assert!(renderer.render(&mut image, &mut target, &mut params));
}

/// Boundary (§8): a degenerate crop (`x0 == x1`) must fail validation
/// before any GPU work is issued.
#[test]
fn degenerate_crop_fails_validation() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::yuv420_frame(&device, 64, 64);
    image.crop = chromapipe::Rect::new(10.0, 0.0, 10.0, 64.0);
    let mut target = common::rgba_frame(&device, 64, 64, true);

    let mut params = chromapipe::default_params();
    assert!(!renderer.render(&mut image, &mut target, &mut params));
}

/// Scenario 2 (§8): downscale, SDR BT.709, mitchell-style downscaler.
/// Direction DOWN forces linear-light scaling on (sigmoid stays off, since
/// SDR-with-sigmoid only applies on UP per §4.5); the 8-bit planar target
/// should still dither on write.
#[test]
fn downscale_sdr_dithers_on_write() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::yuv420_frame(&device, 256, 144);
    let mut target = common::yuv420_target_frame(&device, 128, 72);

    let mut params = chromapipe::default_params();
    assert!(renderer.render(&mut image, &mut target, &mut params));
}

/// Scenario 4 (§8): a single-plane RGBA source rendered onto a 4:2:0
/// planar YUV target. `output_target` must fan out three separate plane
/// dispatches, with the two chroma planes sharing the same half-resolution
/// geometry.
#[test]
fn rgba_source_to_planar_yuv420_target() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::rgba_frame(&device, 64, 64, false);
    let mut target = common::yuv420_target_frame(&device, 64, 64);

    let mut params = chromapipe::default_params();
    assert!(renderer.render(&mut image, &mut target, &mut params));
}

/// Scenario 3 (§8): HDR (BT.2020 PQ) upscale to an SDR RGBA target with
/// peak detection enabled. Linear and sigmoid both engage (direction UP,
/// HDR so sigmoid would normally be suppressed only when *not* upscaling);
/// color-mapping consumes the peak-detect state built up during
/// `read_image`.
#[test]
fn hdr_upscale_with_peak_detect() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::hdr_yuv420_frame(&device, 64, 64);
    let mut target = common::rgba_frame(&device, 128, 128, true);

    let mut params = chromapipe::default_params();
    assert!(params.peak_detect_params.is_some());
    assert!(renderer.render(&mut image, &mut target, &mut params));
}

/// Scenario 5 (§8): a BT.709 sRGB overlay composited over HDR BT.2020 PQ
/// content. `scale_main` must materialize a pre-kernel texture (overlays
/// always force `need_fbo`) and draw the overlay with the caller's current
/// sigmoid state threaded through.
#[test]
fn overlay_over_hdr_sigmoid_content() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::hdr_yuv420_frame(&device, 64, 64);
    let (overlay_repr, overlay_space) = common::rgb_repr();
    image.overlays.push(Overlay {
        plane: common::rgba_plane(common::make_plane_texture(&device, 16, 16, false)),
        rect: Rect::new(0.0, 0.0, 16.0, 16.0),
        mode: OverlayMode::Normal,
        base_color: [1.0, 1.0, 1.0, 1.0],
        color_repr: overlay_repr,
        color_space: overlay_space,
    });
    let mut target = common::rgba_frame(&device, 64, 64, true);

    let mut params = chromapipe::default_params();
    assert!(renderer.render(&mut image, &mut target, &mut params));
}

/// Invariant 6 (§8): a disable flag, once set, survives further renders and
/// is only cleared by `flush_cache` (and then only `PEAK_DETECT`).
#[test]
fn fbo_disable_flag_persists_across_renders() {
    let (device, queue, adapter) = require_adapter!();
    let mut renderer = Renderer::create(device.clone(), queue, &adapter).expect("renderer creation");

    let mut image = common::yuv420_frame(&device, 64, 64);
    let mut target = common::rgba_frame(&device, 128, 128, true);

    let mut params = chromapipe::default_params();
    params.disable_fbos = true;
    params.hooks = vec![Hook::new(
        Stage::PRE_KERNEL,
        Signature::None,
        Signature::None,
        |_img, _ctx: &mut HookContext| HookOutput::None,
    )];

    assert!(!renderer.render(&mut image, &mut target, &mut params));

    // A second render, even without `disable_fbos` set this time, still
    // fails: the latch from the first render persists.
    let mut params2 = chromapipe::default_params();
    params2.hooks = vec![Hook::new(
        Stage::PRE_KERNEL,
        Signature::None,
        Signature::None,
        |_img, _ctx: &mut HookContext| HookOutput::None,
    )];
    let mut image2 = common::yuv420_frame(&device, 64, 64);
    let mut target2 = common::rgba_frame(&device, 128, 128, true);
    assert!(!renderer.render(&mut image2, &mut target2, &mut params2));
}
