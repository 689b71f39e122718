//! Frame: the top-level source/target description (§3), plus the frame
//! preparation and validation helpers of §4.8–§4.9 and the frame helpers of
//! §6.

use smallvec::SmallVec;

use crate::color::{self, ColorRepr, ColorSpace};
use crate::error::{Error, Result};
use crate::plane::{Channel, Plane, PlaneType};
use crate::rect::Rect;

pub use crate::rect::default_rect;

pub const MAX_PLANES: usize = 4;

/// AV1 film-grain synthesis metadata (§4.4 step 4). Only the fields the
/// core pipeline needs to decide *whether* and *on which planes* to invoke
/// grain synthesis are modeled here; the synthesis itself lives in
/// `crate::shaders::grain`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainParams {
    pub seed: u16,
    pub intensity: f32,
    pub affects_luma: bool,
    pub affects_chroma: bool,
}

/// An overlay to composite at image or target scope (§3, §4.7).
#[derive(Clone)]
pub struct Overlay {
    pub plane: Plane,
    pub rect: Rect,
    pub mode: OverlayMode,
    pub base_color: [f32; 4],
    pub color_repr: ColorRepr,
    pub color_space: ColorSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    Normal,
    Monochrome,
}

/// A frame: 1..=4 planes plus frame-wide color/crop/grain/overlay metadata
/// (§3).
pub struct Frame {
    pub planes: SmallVec<[Plane; MAX_PLANES]>,
    pub color_repr: ColorRepr,
    pub color_space: ColorSpace,
    pub crop: Rect,
    pub icc_profile: Option<Vec<u8>>,
    pub grain: Option<GrainParams>,
    pub overlays: Vec<Overlay>,
    /// Index into `planes` of the highest-priority (reference) plane.
    /// Filled in by `fix_refs_and_rects`.
    pub reference_index: Option<usize>,
}

impl Frame {
    pub fn new(planes: SmallVec<[Plane; MAX_PLANES]>, color_repr: ColorRepr, color_space: ColorSpace) -> Self {
        Self {
            planes,
            color_repr,
            color_space,
            crop: Rect::ZERO,
            icc_profile: None,
            grain: None,
            overlays: Vec::new(),
            reference_index: None,
        }
    }

    pub fn reference_plane(&self) -> Option<&Plane> {
        self.reference_index.map(|i| &self.planes[i])
    }

    /// §4.9 invariant: the reference plane exists and is RGB, LUMA, or XYZ.
    pub fn classify_reference(&self) -> Option<usize> {
        self.planes
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                matches!(
                    p.plane_type(),
                    PlaneType::Rgb | PlaneType::Luma | PlaneType::Xyz
                )
            })
            .max_by_key(|(_, p)| p.plane_type())
            .map(|(i, _)| i)
    }
}

/// §4.9 validation: returns `Err` on the first violation found, without
/// attempting repair.
pub fn validate(frame: &Frame, is_target: bool) -> Result<()> {
    if frame.planes.is_empty() {
        return Err(Error::Validation("frame has zero planes".into()));
    }
    if frame.planes.len() > MAX_PLANES {
        return Err(Error::Validation(format!(
            "frame has {} planes, exceeding the maximum of {MAX_PLANES}",
            frame.planes.len()
        )));
    }
    for (i, plane) in frame.planes.iter().enumerate() {
        let usage = plane.texture.usage();
        let required = if is_target {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
        };
        if !usage.contains(required) {
            return Err(Error::Validation(format!(
                "plane {i} lacks the required {required:?} capability"
            )));
        }
        let n = plane.num_components();
        if n == 0 || n > 4 {
            return Err(Error::Validation(format!(
                "plane {i} has {n} components, expected 1..=4"
            )));
        }
    }
    if !frame.crop.dims_consistent() {
        return Err(Error::Validation(
            "crop width/height must be both zero or both non-zero".into(),
        ));
    }
    if !frame.crop.is_all_zero() && frame.crop.is_degenerate() {
        return Err(Error::Validation(
            "crop has a zero-width or zero-height axis".into(),
        ));
    }
    for (i, overlay) in frame.overlays.iter().enumerate() {
        if overlay.rect.is_degenerate() {
            return Err(Error::Validation(format!("overlay {i} rect is degenerate")));
        }
    }
    Ok(())
}

/// §4.8 `fix_refs_and_rects`: classifies planes, picks the reference plane,
/// fills default crops from the reference texture's full extent, normalizes
/// axis order (recording flips), and returns the reference index plus the
/// flip flags.
pub fn fix_refs_and_rects(frame: &mut Frame) -> Result<(bool, bool)> {
    let reference_index = frame
        .classify_reference()
        .ok_or_else(|| Error::Validation("no RGB/LUMA/XYZ reference plane found".into()))?;
    frame.reference_index = Some(reference_index);

    let reference = &frame.planes[reference_index];
    let full = Rect::new(0.0, 0.0, reference.width() as f32, reference.height() as f32);
    frame.crop = crate::rect::default_rect(frame.crop, full);

    let (normalized, flip_x, flip_y) = frame.crop.normalize();
    frame.crop = normalized;
    Ok((flip_x, flip_y))
}

/// §4.8 `fix_color_space`: fills in unset primaries/transfer/peak defaults,
/// and (for UNORM source textures) infers `sample_depth` from the texture's
/// component depth before reconciling `color_depth`/`bit_shift`.
pub fn fix_color_space(frame: &mut Frame, inferred_sample_depth: Option<u8>) {
    let (ref_w, ref_h) = frame
        .reference_plane()
        .map(|p| (p.width(), p.height()))
        .unwrap_or((0, 0));
    frame.color_space.fixup(ref_w, ref_h);

    if let Some(depth) = inferred_sample_depth {
        if frame.color_repr.bits.sample_depth == 0 {
            frame.color_repr.bits.sample_depth = depth;
        }
    }
    frame.color_repr.bits.reconcile();
}

/// §6 `set_chroma_location`: shifts chroma planes by the given offset. If
/// the reference plane exists, only subsampled planes (those whose
/// dimensions differ from the reference) are shifted; otherwise every plane
/// classified as chroma is shifted.
pub fn set_chroma_location(frame: &mut Frame, shift_x: f32, shift_y: f32) {
    let reference_dims = frame.reference_plane().map(|p| (p.width(), p.height()));
    for plane in frame.planes.iter_mut() {
        if plane.plane_type() != PlaneType::Chroma {
            continue;
        }
        let subsampled = match reference_dims {
            Some((rw, rh)) => plane.width() != rw || plane.height() != rh,
            None => true,
        };
        if subsampled {
            plane.shift_x = shift_x;
            plane.shift_y = shift_y;
        }
    }
}

/// §6 `from_swapchain`: builds a single-plane target from a swapchain
/// texture, honoring the `flipped` flag by swapping `crop.y0/y1`.
pub fn from_swapchain(texture: wgpu::Texture, flipped: bool) -> Frame {
    let w = texture.width() as f32;
    let h = texture.height() as f32;
    let plane = Plane {
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
    };
    let mut frame = Frame::new(SmallVec::from_vec(vec![plane]), ColorRepr::default(), ColorSpace::default());
    frame.crop = if flipped {
        Rect::new(0.0, h, w, 0.0)
    } else {
        Rect::new(0.0, 0.0, w, h)
    };
    frame
}

/// §6 `is_cropped`: whether the (normalized, rounded) crop strictly equals
/// the reference texture's full extent. Always false for a frame built by
/// `from_swapchain` — its crop (possibly flipped) normalizes to the full
/// extent exactly.
pub fn is_cropped(frame: &Frame) -> bool {
    let Some(reference) = frame.reference_plane() else {
        return false;
    };
    let (normalized, _, _) = frame.crop.round().normalize();
    let full = Rect::new(0.0, 0.0, reference.width() as f32, reference.height() as f32);
    normalized != full
}

/// §6 `clear`: encodes an RGB triple through the frame's color
/// representation matrix inverse and clears each plane's texture using the
/// appropriate channel layout.
pub fn clear(device: &wgpu::Device, queue: &wgpu::Queue, frame: &Frame, rgb: [f32; 3]) {
    let encoded = if frame.color_repr.system.is_ycbcr_like() {
        let decode = color::ycbcr_to_rgb_matrix(frame.color_repr.system);
        let encode = color::invert3x3(decode);
        color::mat3_mul_vec3(encode, rgb)
    } else {
        rgb
    };

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("chromapipe_clear_frame"),
    });

    for plane in &frame.planes {
        let mut channel_values = [0.0f32; 4];
        for (i, channel) in plane.component_mapping.iter().enumerate() {
            channel_values[i] = match channel {
                Channel::Red | Channel::Luma => encoded[0],
                Channel::Green | Channel::ChromaCb => encoded[1],
                Channel::Blue | Channel::ChromaCr => encoded[2],
                Channel::Alpha => 1.0,
                Channel::Xyz(c) => encoded[(*c as usize).min(2)],
                Channel::None => 0.0,
            };
        }
        let clear_color = wgpu::Color {
            r: channel_values[0] as f64,
            g: channel_values[1] as f64,
            b: channel_values[2] as f64,
            a: channel_values[3] as f64,
        };
        let view = plane.texture.create_view(&wgpu::TextureViewDescriptor::default());
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("chromapipe_clear_plane"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    queue.submit(std::iter::once(encoder.finish()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rect_fills_from_reference_extent_shape() {
        let full = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        let result = crate::rect::default_rect(Rect::ZERO, full);
        assert_eq!(result, full);
    }

    #[test]
    fn is_cropped_false_when_crop_matches_full_extent() {
        // Exercises the pure rect comparison `is_cropped` relies on without
        // needing a real device-backed texture.
        let full = Rect::new(0.0, 0.0, 100.0, 100.0);
        let (normalized, _, _) = full.round().normalize();
        assert_eq!(normalized, full);
    }
}
