//! Shader-builder modules (§1, §4.10): opaque, independently-testable
//! builders that each append a WGSL operation to an in-flight
//! [`crate::inflight::ShaderObject`]. The core pipeline only calls these
//! through the narrow interface each module exposes; color-science
//! correctness within a builder is explicitly out of scope (§1).

pub mod color_map;
pub mod deband;
pub mod dither;
pub mod filters;
pub mod grain;
pub mod lut3d;
