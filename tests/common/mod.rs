//! Shared test harness: headless `wgpu` device setup and small texture/
//! frame builders, mirroring the teacher's `Renderer::try_new_headless`
//! skip-if-no-adapter pattern so these tests degrade gracefully in a CI
//! environment without a GPU instead of panicking.

use smallvec::SmallVec;

use chromapipe::wgpu;
use chromapipe::{
    Channel, ColorLevels, ColorLight, ColorPrimaries, ColorRepr, ColorSpace, ColorSystem, Frame,
    Plane, TransferFunction,
};

pub async fn try_setup() -> Option<(wgpu::Device, wgpu::Queue, wgpu::Adapter)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok()?;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        })
        .await
        .ok()?;
    Some((device, queue, adapter))
}

/// A small source or target texture, sized `w x h`, with the usage flags
/// `Frame::validate` requires for its side (§4.9).
pub fn make_plane_texture(device: &wgpu::Device, w: u32, h: u32, is_target: bool) -> wgpu::Texture {
    let usage = if is_target {
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
    } else {
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
    };
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("chromapipe_test_plane"),
        size: wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage,
        view_formats: &[],
    })
}

pub fn rgba_plane(texture: wgpu::Texture) -> Plane {
    Plane {
        texture,
        component_mapping: SmallVec::from_vec(vec![
            Channel::Red,
            Channel::Green,
            Channel::Blue,
            Channel::Alpha,
        ]),
        shift_x: 0.0,
        shift_y: 0.0,
        address_mode: wgpu::AddressMode::ClampToEdge,
    }
}

pub fn luma_plane(texture: wgpu::Texture) -> Plane {
    Plane {
        texture,
        component_mapping: SmallVec::from_vec(vec![Channel::Luma]),
        shift_x: 0.0,
        shift_y: 0.0,
        address_mode: wgpu::AddressMode::ClampToEdge,
    }
}

pub fn chroma_plane(texture: wgpu::Texture, is_cb: bool) -> Plane {
    Plane {
        texture,
        component_mapping: SmallVec::from_vec(vec![if is_cb {
            Channel::ChromaCb
        } else {
            Channel::ChromaCr
        }]),
        shift_x: 0.0,
        shift_y: 0.0,
        address_mode: wgpu::AddressMode::ClampToEdge,
    }
}

pub fn bt709_sdr_repr() -> (ColorRepr, ColorSpace) {
    (
        ColorRepr {
            system: ColorSystem::Bt709,
            levels: ColorLevels::Limited,
            bits: Default::default(),
        },
        ColorSpace {
            primaries: ColorPrimaries::Bt709,
            transfer: TransferFunction::Bt1886,
            light: ColorLight::Display,
            hdr_peak: 203.0,
            hdr_scale: 1.0,
        },
    )
}

pub fn rgb_repr() -> (ColorRepr, ColorSpace) {
    (
        ColorRepr {
            system: ColorSystem::Rgb,
            levels: ColorLevels::Full,
            bits: Default::default(),
        },
        ColorSpace {
            primaries: ColorPrimaries::Bt709,
            transfer: TransferFunction::Srgb,
            light: ColorLight::Display,
            hdr_peak: 203.0,
            hdr_scale: 1.0,
        },
    )
}

pub fn yuv420_frame(device: &wgpu::Device, w: u32, h: u32) -> Frame {
    let (repr, space) = bt709_sdr_repr();
    let y = luma_plane(make_plane_texture(device, w, h, false));
    let cb = chroma_plane(make_plane_texture(device, w / 2, h / 2, false), true);
    let cr = chroma_plane(make_plane_texture(device, w / 2, h / 2, false), false);
    Frame::new(SmallVec::from_vec(vec![y, cb, cr]), repr, space)
}

pub fn rgba_frame(device: &wgpu::Device, w: u32, h: u32, is_target: bool) -> Frame {
    let (repr, space) = rgb_repr();
    let plane = rgba_plane(make_plane_texture(device, w, h, is_target));
    Frame::new(SmallVec::from_vec(vec![plane]), repr, space)
}

/// A 4:2:0 planar YUV target (scenario 4, §8): three separate single-
/// component planes, each sized per their own subsampling ratio.
pub fn yuv420_target_frame(device: &wgpu::Device, w: u32, h: u32) -> Frame {
    let (repr, space) = bt709_sdr_repr();
    let y = luma_plane(make_plane_texture(device, w, h, true));
    let cb = chroma_plane(make_plane_texture(device, w / 2, h / 2, true), true);
    let cr = chroma_plane(make_plane_texture(device, w / 2, h / 2, true), false);
    Frame::new(SmallVec::from_vec(vec![y, cb, cr]), repr, space)
}

pub fn bt2020_pq_repr() -> (ColorRepr, ColorSpace) {
    (
        ColorRepr {
            system: ColorSystem::Bt2100Pq,
            levels: ColorLevels::Limited,
            bits: Default::default(),
        },
        ColorSpace {
            primaries: ColorPrimaries::Bt2020,
            transfer: TransferFunction::Pq,
            light: ColorLight::Display,
            hdr_peak: 10_000.0,
            hdr_scale: 1.0,
        },
    )
}

/// An HDR (BT.2020 PQ) 4:2:0 planar source (scenario 3, §8).
pub fn hdr_yuv420_frame(device: &wgpu::Device, w: u32, h: u32) -> Frame {
    let (repr, space) = bt2020_pq_repr();
    let y = luma_plane(make_plane_texture(device, w, h, false));
    let cb = chroma_plane(make_plane_texture(device, w / 2, h / 2, false), true);
    let cr = chroma_plane(make_plane_texture(device, w / 2, h / 2, false), false);
    Frame::new(SmallVec::from_vec(vec![y, cb, cr]), repr, space)
}
