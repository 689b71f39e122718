//! The sampler selector (§4.2): classifies a sample request and dispatches
//! it to a GPU built-in or a custom filter shader.

use crate::error::Result;
use crate::inflight::ShaderObject;

/// Dead band around a 1:1 ratio; anything closer than this counts as
/// exactly 1.0 for direction classification (§4.2).
const RATIO_DEAD_BAND: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Noop,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerType {
    Nearest,
    Direct,
    Bicubic,
    Complex,
}

/// A configured scaling filter. `Polar` filters (e.g. EWA Lanczos) are
/// evaluated in one pass; everything else is separable (vertical then
/// horizontal).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    Bicubic,
    Triangle,
    Box,
    Polar { cutoff: f32 },
    Separable,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterConfig {
    pub filter: Option<FilterKind>,
    pub antiringing_strength: f32,
}

/// Inputs the selector needs beyond the ratio itself.
#[derive(Debug, Clone, Copy)]
pub struct SelectorParams {
    pub upscaler: FilterConfig,
    pub downscaler: FilterConfig,
    pub disable_builtin_scalers: bool,
    pub disable_fbos: bool,
    pub disable_sampling: bool,
    pub skip_anti_aliasing: bool,
}

/// The selector's decision: which direction/type, and the filter config to
/// use if `SamplerType::Complex`.
#[derive(Debug, Clone, Copy)]
pub struct Plan {
    pub direction: Direction,
    pub ty: SamplerType,
    pub filter: Option<FilterConfig>,
}

/// Computes `rx, ry` and classifies direction per §4.2.
pub fn classify_direction(src_w: f32, src_h: f32, dst_w: f32, dst_h: f32) -> (Direction, f32, f32) {
    let rx = dst_w / src_w;
    let ry = dst_h / src_h;
    let near_one = |r: f32| (r - 1.0).abs() <= RATIO_DEAD_BAND;
    let direction = if near_one(rx) && near_one(ry) {
        Direction::Noop
    } else if rx < 1.0 || ry < 1.0 {
        Direction::Down
    } else {
        Direction::Up
    };
    (direction, rx, ry)
}

/// Full selection per §4.2: direction, then type, with fast-path
/// substitutions when linear sampling is available and (direction is UP, or
/// anti-aliasing skip is permitted).
pub fn select(
    src_w: f32,
    src_h: f32,
    dst_w: f32,
    dst_h: f32,
    source_linear_capable: bool,
    params: &SelectorParams,
) -> Plan {
    let (direction, _rx, _ry) = classify_direction(src_w, src_h, dst_w, dst_h);

    if direction == Direction::Noop {
        return Plan {
            direction,
            ty: SamplerType::Nearest,
            filter: None,
        };
    }

    let config = match direction {
        Direction::Up => params.upscaler,
        Direction::Down => params.downscaler,
        Direction::Noop => unreachable!(),
    };

    let base_ty = if params.disable_fbos || params.disable_builtin_scalers || config.filter.is_none()
    {
        SamplerType::Direct
    } else {
        SamplerType::Complex
    };

    if params.disable_sampling {
        return Plan {
            direction,
            ty: SamplerType::Direct,
            filter: None,
        };
    }

    let fast_path_eligible =
        source_linear_capable && (direction == Direction::Up || params.skip_anti_aliasing);

    if base_ty == SamplerType::Complex && fast_path_eligible {
        if let Some(filter) = config.filter {
            match filter {
                FilterKind::Bicubic => {
                    return Plan {
                        direction,
                        ty: SamplerType::Bicubic,
                        filter: Some(config),
                    };
                }
                FilterKind::Triangle => {
                    return Plan {
                        direction,
                        ty: SamplerType::Direct,
                        filter: None,
                    };
                }
                FilterKind::Box => {
                    return Plan {
                        direction,
                        ty: if source_linear_capable {
                            SamplerType::Nearest
                        } else {
                            SamplerType::Direct
                        },
                        filter: None,
                    };
                }
                _ => {}
            }
        }
    }

    Plan {
        direction,
        ty: base_ty,
        filter: if base_ty == SamplerType::Complex {
            Some(config)
        } else {
            None
        },
    }
}

/// Dispatches a sampling operation per the plan, appending the sample
/// operation to `shader`. On any failure, the caller should set
/// `disable_sampling` and retry with a direct-sample plan (§4.2).
pub fn dispatch(
    shader: &mut ShaderObject,
    plan: &Plan,
    src_view: wgpu::TextureView,
    src_sampler: wgpu::Sampler,
) -> Result<()> {
    match plan.ty {
        SamplerType::Nearest | SamplerType::Direct | SamplerType::Bicubic => {
            let idx = shader.bind_texture(src_view, src_sampler);
            shader.append_statement(&format!("color = textureSample(t{idx}, s{idx}, uv);"));
            Ok(())
        }
        SamplerType::Complex => match plan.filter.and_then(|f| f.filter) {
            Some(FilterKind::Polar { cutoff }) => {
                crate::shaders::filters::append_polar(shader, src_view, src_sampler, cutoff)
            }
            _ => crate::shaders::filters::append_separable(shader, src_view, src_sampler),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_dead_band_counts_as_noop() {
        let (dir, _, _) = classify_direction(1920.0, 1080.0, 1920.0, 1080.0);
        assert_eq!(dir, Direction::Noop);

        let (dir, _, _) = classify_direction(1920.0, 1080.0, 1920.0 + 0.0000001, 1080.0);
        assert_eq!(dir, Direction::Noop);
    }

    #[test]
    fn direction_classifies_down_and_up() {
        let (dir, _, _) = classify_direction(3840.0, 2160.0, 1920.0, 1080.0);
        assert_eq!(dir, Direction::Down);

        let (dir, _, _) = classify_direction(1920.0, 1080.0, 3840.0, 2160.0);
        assert_eq!(dir, Direction::Up);
    }

    #[test]
    fn noop_short_circuits_before_filter_lookup() {
        let params = SelectorParams {
            upscaler: FilterConfig {
                filter: Some(FilterKind::Polar { cutoff: 0.001 }),
                antiringing_strength: 0.0,
            },
            downscaler: FilterConfig::default(),
            disable_builtin_scalers: false,
            disable_fbos: false,
            disable_sampling: false,
            skip_anti_aliasing: false,
        };
        let plan = select(100.0, 100.0, 100.0, 100.0, true, &params);
        assert_eq!(plan.ty, SamplerType::Nearest);
        assert_eq!(plan.direction, Direction::Noop);
    }

    #[test]
    fn disabled_fbos_force_direct_sampling() {
        let params = SelectorParams {
            upscaler: FilterConfig {
                filter: Some(FilterKind::Polar { cutoff: 0.001 }),
                antiringing_strength: 0.0,
            },
            downscaler: FilterConfig::default(),
            disable_builtin_scalers: false,
            disable_fbos: true,
            disable_sampling: false,
            skip_anti_aliasing: false,
        };
        let plan = select(100.0, 100.0, 200.0, 200.0, true, &params);
        assert_eq!(plan.ty, SamplerType::Direct);
    }

    #[test]
    fn triangle_fast_path_is_direct_bilinear_on_upscale() {
        let params = SelectorParams {
            upscaler: FilterConfig {
                filter: Some(FilterKind::Triangle),
                antiringing_strength: 0.0,
            },
            downscaler: FilterConfig::default(),
            disable_builtin_scalers: false,
            disable_fbos: false,
            disable_sampling: false,
            skip_anti_aliasing: false,
        };
        let plan = select(100.0, 100.0, 200.0, 200.0, true, &params);
        assert_eq!(plan.ty, SamplerType::Direct);
    }

    #[test]
    fn box_filter_prefers_nearest_when_linear_available() {
        let params = SelectorParams {
            upscaler: FilterConfig {
                filter: Some(FilterKind::Box),
                antiringing_strength: 0.0,
            },
            downscaler: FilterConfig::default(),
            disable_builtin_scalers: false,
            disable_fbos: false,
            disable_sampling: false,
            skip_anti_aliasing: false,
        };
        let plan = select(100.0, 100.0, 200.0, 200.0, true, &params);
        assert_eq!(plan.ty, SamplerType::Nearest);

        let plan_no_linear = select(100.0, 100.0, 200.0, 200.0, false, &params);
        assert_eq!(plan_no_linear.ty, SamplerType::Direct);
    }

    #[test]
    fn downscale_without_skip_aa_does_not_take_fast_path() {
        let params = SelectorParams {
            upscaler: FilterConfig::default(),
            downscaler: FilterConfig {
                filter: Some(FilterKind::Bicubic),
                antiringing_strength: 0.0,
            },
            disable_builtin_scalers: false,
            disable_fbos: false,
            disable_sampling: false,
            skip_anti_aliasing: false,
        };
        let plan = select(200.0, 200.0, 100.0, 100.0, true, &params);
        assert_eq!(plan.ty, SamplerType::Complex);
    }
}
