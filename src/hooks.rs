//! The hook dispatcher (§4.3): user-supplied callbacks invoked at named
//! pipeline stages, which may observe or replace the in-flight image.

use bitflags::bitflags;

use crate::color::{ColorRepr, ColorSpace};
use crate::error::{Error, Result};
use crate::fbo_pool::FboPool;
use crate::inflight::Image;
use crate::rect::Rect;
use crate::renderer::cache::{PipelineCache, ShaderModuleCache};

bitflags! {
    /// The named pipeline stages a hook can register against (§4.3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Stage: u32 {
        const NATIVE        = 1 << 0;
        const RGB           = 1 << 1;
        const LUMA_INPUT    = 1 << 2;
        const CHROMA_INPUT  = 1 << 3;
        const ALPHA_INPUT   = 1 << 4;
        const RGB_INPUT     = 1 << 5;
        const XYZ_INPUT     = 1 << 6;
        const LINEAR        = 1 << 7;
        const SIGMOID       = 1 << 8;
        const PRE_OVERLAY   = 1 << 9;
        const PRE_KERNEL    = 1 << 10;
        const POST_KERNEL   = 1 << 11;
        const SCALED        = 1 << 12;
        const OUTPUT        = 1 << 13;
    }
}

impl Stage {
    /// Only these stages permit the hook to change `(w, h)`/rect of the
    /// image (§4.3, "resizable" stages).
    pub fn is_resizable(self) -> bool {
        self.intersects(
            Stage::RGB_INPUT
                | Stage::XYZ_INPUT
                | Stage::LUMA_INPUT
                | Stage::CHROMA_INPUT
                | Stage::ALPHA_INPUT
                | Stage::PRE_KERNEL
                | Stage::POST_KERNEL,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    None,
    Tex,
    Color,
}

/// What a hook invocation produced.
pub enum HookOutput {
    /// Leave the in-flight image untouched.
    None,
    /// Replace it, inheriting the given geometry/color metadata.
    Replace {
        image: Image,
        rect: Rect,
        color_repr: ColorRepr,
        color_space: ColorSpace,
        components: u8,
    },
    /// The hook itself failed.
    Failed,
}

/// Everything a hook function sees: the current image's geometry/color
/// metadata plus the pass-wide reference and destination rectangles, and a
/// pool handle it may use to request scratch FBOs of its own.
pub struct HookContext<'a> {
    pub rect: Rect,
    pub color_repr: ColorRepr,
    pub color_space: ColorSpace,
    pub components: u8,
    pub reference_rect: Rect,
    pub destination_rect: Rect,
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub(crate) fbo_pool: &'a mut FboPool,
    pub(crate) fbos_used: &'a mut Vec<bool>,
}

impl<'a> HookContext<'a> {
    /// The back-reference a hook uses to request a scratch FBO of its own
    /// from the invoking pass (§9 "the `priv` pointer the hook dispatcher
    /// supplies back to the hook"), represented here as a plain method on an
    /// explicit context struct rather than shared ownership.
    pub fn get_hook_tex(&mut self, w: u32, h: u32) -> Option<wgpu::TextureView> {
        let idx = self
            .fbo_pool
            .get_fbo(self.device, self.fbos_used, w, h)
            .ok()
            .flatten()?;
        Some(self.fbo_pool.view(idx).clone())
    }
}

type HookFn = dyn FnMut(&Image, &mut HookContext) -> HookOutput;
type ResetFn = dyn FnMut();

/// A single registered hook (§4.3, §9 "Hook polymorphism").
pub struct Hook {
    pub stages: Stage,
    pub input: Signature,
    pub output: Signature,
    pub callback: Box<HookFn>,
    pub reset: Option<Box<ResetFn>>,
}

impl Hook {
    pub fn new(
        stages: Stage,
        input: Signature,
        output: Signature,
        callback: impl FnMut(&Image, &mut HookContext) -> HookOutput + 'static,
    ) -> Self {
        Self {
            stages,
            input,
            output,
            callback: Box::new(callback),
            reset: None,
        }
    }
}

/// Walks every registered hook whose stage mask includes `stage`, in
/// registration order (§5 "Ordering"). Marshals the in-flight image into
/// the form each hook requests, invokes it, and re-absorbs the result.
///
/// Returns `Ok(true)` if any hook replaced the image, `Ok(false)` if all
/// hooks ran as no-ops, and `Err` if hook marshaling or a hook itself
/// failed — the caller is expected to set `disable_hooks` permanently on
/// `Err`, per §4.3 step 1 and §7.
#[allow(clippy::too_many_arguments)]
pub fn dispatch(
    hooks: &mut [Hook],
    stage: Stage,
    image: &mut Image,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    fbo_pool: &mut FboPool,
    fbos_used: &mut Vec<bool>,
    module_cache: &mut ShaderModuleCache,
    pipeline_cache: &mut PipelineCache,
) -> Result<bool> {
    let mut replaced = false;

    for hook in hooks.iter_mut() {
        if !hook.stages.contains(stage) {
            continue;
        }

        match hook.input {
            Signature::None => {}
            Signature::Tex => {
                image
                    .to_tex(device, queue, fbo_pool, fbos_used, module_cache, pipeline_cache)
                    .map_err(|_| Error::HookContract("failed to marshal image to texture for hook"))?;
            }
            Signature::Color => {
                image.to_sh(device);
            }
        }

        let mut ctx = HookContext {
            rect: image.rect,
            color_repr: image.color_repr,
            color_space: image.color_space,
            components: image.components,
            reference_rect: image.rect,
            destination_rect: image.rect,
            device,
            queue,
            fbo_pool,
            fbos_used,
        };

        match (hook.callback)(image, &mut ctx) {
            HookOutput::None => {}
            HookOutput::Failed => {
                return Err(Error::HookContract("hook returned failure"));
            }
            HookOutput::Replace {
                image: new_image,
                rect,
                color_repr,
                color_space,
                components,
            } => {
                let resized = new_image.w != image.w
                    || new_image.h != image.h
                    || rect.width() != image.rect.width()
                    || rect.height() != image.rect.height();
                if resized && !stage.is_resizable() {
                    return Err(Error::HookContract(
                        "hook attempted to resize the image at a non-resizable stage",
                    ));
                }
                *image = new_image;
                image.rect = rect;
                image.color_repr = color_repr;
                image.color_space = color_space;
                image.components = components;
                replaced = true;
            }
        }
    }

    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizable_stages_match_spec_table() {
        assert!(Stage::PRE_KERNEL.is_resizable());
        assert!(Stage::POST_KERNEL.is_resizable());
        assert!(Stage::RGB_INPUT.is_resizable());
        assert!(!Stage::NATIVE.is_resizable());
        assert!(!Stage::RGB.is_resizable());
        assert!(!Stage::SCALED.is_resizable());
        assert!(!Stage::OUTPUT.is_resizable());
    }

    #[test]
    fn stage_bitmask_membership() {
        let combined = Stage::LINEAR | Stage::SIGMOID;
        assert!(combined.contains(Stage::LINEAR));
        assert!(combined.contains(Stage::SIGMOID));
        assert!(!combined.contains(Stage::OUTPUT));
    }
}
