//! The renderer's one-way feature-disable latch (§5, §9 "graceful
//! degradation ... model as a bitset owned by the renderer").

use bitflags::bitflags;

bitflags! {
    /// Each bit, once set, persists for the renderer's lifetime — except
    /// `PEAK_DETECT`, which `Renderer::flush_cache` clears explicitly (§3
    /// invariant 6, §6 `flush_cache`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DisableFlags: u32 {
        /// Intermediate FBO allocation (`disable_fbos`, or a prior
        /// allocation failure).
        const FBOS            = 1 << 0;
        /// Compute-shader dispatch (missing `STORABLE` on the chosen
        /// intermediate format).
        const COMPUTE          = 1 << 1;
        /// Linear-light scaling for HDR content.
        const LINEAR_HDR       = 1 << 2;
        /// Linear-light scaling for SDR content.
        const LINEAR_SDR       = 1 << 3;
        /// Custom (complex) sampling; falls back to direct sampling.
        const SAMPLING         = 1 << 4;
        /// All further user hooks for the renderer's lifetime.
        const HOOKS            = 1 << 5;
        /// AV1 film-grain synthesis.
        const GRAIN            = 1 << 6;
        /// HDR peak detection. The sole flag `flush_cache` clears.
        const PEAK_DETECT      = 1 << 7;
        /// Overlay alpha blending (target format found non-blendable).
        const OVERLAY_BLEND    = 1 << 8;
    }
}

impl DisableFlags {
    /// `flush_cache`'s one exception to the monotonic latch (§3 invariant
    /// 6, §6 `flush_cache`).
    pub fn clear_peak_detect(&mut self) {
        self.remove(DisableFlags::PEAK_DETECT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent_bits() {
        let mut flags = DisableFlags::empty();
        flags.insert(DisableFlags::FBOS);
        flags.insert(DisableFlags::GRAIN);
        assert!(flags.contains(DisableFlags::FBOS));
        assert!(flags.contains(DisableFlags::GRAIN));
        assert!(!flags.contains(DisableFlags::COMPUTE));
    }

    #[test]
    fn flush_cache_clears_only_peak_detect() {
        let mut flags = DisableFlags::FBOS | DisableFlags::PEAK_DETECT | DisableFlags::HOOKS;
        flags.clear_peak_detect();
        assert!(!flags.contains(DisableFlags::PEAK_DETECT));
        assert!(flags.contains(DisableFlags::FBOS));
        assert!(flags.contains(DisableFlags::HOOKS));
    }
}
