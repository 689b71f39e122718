//! Plane descriptors: the per-texture building blocks of a [`crate::frame::Frame`].

/// Which logical channel a texture's physical component carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Luma,
    ChromaCb,
    ChromaCr,
    Red,
    Green,
    Blue,
    Alpha,
    Xyz(u8),
    None,
}

/// Plane type, ordered by priority per §3: `Alpha < Chroma < Luma < Rgb < Xyz`.
/// The highest-priority plane among a frame's planes is its reference plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlaneType {
    Alpha,
    Chroma,
    Luma,
    Rgb,
    Xyz,
}

impl PlaneType {
    /// Classifies a plane from its component mapping: the highest-priority
    /// channel present on the plane determines its type.
    pub fn classify(components: &[Channel]) -> Self {
        let mut best: Option<PlaneType> = None;
        for &c in components {
            let t = match c {
                Channel::Alpha => PlaneType::Alpha,
                Channel::ChromaCb | Channel::ChromaCr => PlaneType::Chroma,
                Channel::Luma => PlaneType::Luma,
                Channel::Red | Channel::Green | Channel::Blue => PlaneType::Rgb,
                Channel::Xyz(_) => PlaneType::Xyz,
                Channel::None => continue,
            };
            best = Some(match best {
                Some(prev) => prev.max(t),
                None => t,
            });
        }
        best.unwrap_or(PlaneType::Alpha)
    }
}

/// A texture carrying one subset of a frame's channels, with its own
/// resolution and sub-pixel shift (§3, GLOSSARY "Plane").
#[derive(Clone)]
pub struct Plane {
    pub texture: wgpu::Texture,
    /// For each texture component (in storage order), which logical channel
    /// it maps to. Length is the component count, 1..=4.
    pub component_mapping: smallvec::SmallVec<[Channel; 4]>,
    /// Sub-pixel shift, in reference-plane pixel units.
    pub shift_x: f32,
    pub shift_y: f32,
    pub address_mode: wgpu::AddressMode,
}

impl Plane {
    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn num_components(&self) -> usize {
        self.component_mapping.len()
    }

    pub fn plane_type(&self) -> PlaneType {
        PlaneType::classify(&self.component_mapping)
    }

    /// True if any component maps to alpha.
    pub fn carries_alpha(&self) -> bool {
        self.component_mapping.contains(&Channel::Alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_spec_priority() {
        assert!(PlaneType::Alpha < PlaneType::Chroma);
        assert!(PlaneType::Chroma < PlaneType::Luma);
        assert!(PlaneType::Luma < PlaneType::Rgb);
        assert!(PlaneType::Rgb < PlaneType::Xyz);
    }

    #[test]
    fn classify_picks_highest_priority_channel() {
        use Channel::*;
        assert_eq!(PlaneType::classify(&[Luma]), PlaneType::Luma);
        assert_eq!(PlaneType::classify(&[ChromaCb, ChromaCr]), PlaneType::Chroma);
        assert_eq!(PlaneType::classify(&[Red, Green, Blue, Alpha]), PlaneType::Rgb);
        assert_eq!(PlaneType::classify(&[Xyz(0), Xyz(1), Xyz(2)]), PlaneType::Xyz);
        assert_eq!(PlaneType::classify(&[Alpha]), PlaneType::Alpha);
    }
}
