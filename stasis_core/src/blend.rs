// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blend states and blend-mutation strategies.
//!
//! Layers mutate the ambient blend state through a
//! [`DrawContext`](crate::layer::DrawContext), which routes every request
//! through a [`BlendStrategy`]. Drawing straight to the screen uses
//! [`PassThrough`]; drawing into a cache element uses a [`BlendInterceptor`],
//! which keeps the intermediate buffer compositing-compatible:
//!
//! - requests matching [`BlendState::STANDARD`] or [`BlendState::GLINT`] pass
//!   through unchanged,
//! - disabling blending is replaced by [`BlendState::OPAQUE_COPY`], which
//!   writes source color unchanged into the transparent buffer,
//! - any other blend function is rejected and the current state is kept.
//!
//! Rejection is a known limitation: content relying on exotic blend
//! functions renders with the standard function while cached.

use core::cell::Cell;

/// A blend factor, matching the classic fixed-function factor set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendFactor {
    /// `0`
    Zero,
    /// `1`
    One,
    /// Source color.
    SrcColor,
    /// `1 - source color`
    OneMinusSrcColor,
    /// Destination color.
    DstColor,
    /// `1 - destination color`
    OneMinusDstColor,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`
    OneMinusSrcAlpha,
    /// Destination alpha.
    DstAlpha,
    /// `1 - destination alpha`
    OneMinusDstAlpha,
    /// Blend constant color.
    ConstantColor,
    /// `1 - blend constant color`
    OneMinusConstantColor,
    /// Blend constant alpha.
    ConstantAlpha,
    /// `1 - blend constant alpha`
    OneMinusConstantAlpha,
}

/// The four factors of a separate blend function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendFunc {
    /// Source factor for color channels.
    pub src_rgb: BlendFactor,
    /// Destination factor for color channels.
    pub dst_rgb: BlendFactor,
    /// Source factor for the alpha channel.
    pub src_alpha: BlendFactor,
    /// Destination factor for the alpha channel.
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// A blend function using the same factors for color and alpha.
    #[must_use]
    pub const fn uniform(src: BlendFactor, dst: BlendFactor) -> Self {
        Self::separate(src, dst, src, dst)
    }

    /// A blend function with separate color and alpha factors.
    #[must_use]
    pub const fn separate(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }
}

/// An immutable snapshot of the ambient blend state.
///
/// The function is retained while blending is disabled so that re-enabling
/// restores it, mirroring fixed-function state machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendState {
    /// Whether blending is enabled.
    pub enabled: bool,
    /// The blend function.
    pub func: BlendFunc,
}

impl BlendState {
    /// State before any UI drawing: blending off, straight alpha function.
    pub const INITIAL: Self = Self {
        enabled: false,
        func: BlendFunc::separate(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::Zero,
        ),
    };

    /// The state a layer expects while drawing UI content.
    pub const STANDARD: Self = Self {
        enabled: true,
        func: BlendFunc::separate(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::OneMinusSrcAlpha,
        ),
    };

    /// Additive in-place edit of pixels drawn earlier in the same pass
    /// (enchantment glint style).
    pub const GLINT: Self = Self {
        enabled: true,
        func: BlendFunc::separate(
            BlendFactor::SrcColor,
            BlendFactor::One,
            BlendFactor::Zero,
            BlendFactor::One,
        ),
    };

    /// Premultiplied source-over, used when blitting cached textures.
    pub const COMPOSITE: Self = Self {
        enabled: true,
        func: BlendFunc::uniform(BlendFactor::One, BlendFactor::OneMinusSrcAlpha),
    };

    /// Replacement for "blending disabled" while drawing into a cache
    /// element: source color is copied and source alpha is scaled by the
    /// blend constant, which backends bind as `1.0`.
    pub const OPAQUE_COPY: Self = Self {
        enabled: true,
        func: BlendFunc::separate(
            BlendFactor::One,
            BlendFactor::Zero,
            BlendFactor::ConstantAlpha,
            BlendFactor::Zero,
        ),
    };

    /// Returns whether `func` equals this state's blend function.
    #[must_use]
    pub fn matches(&self, func: BlendFunc) -> bool {
        self.func == func
    }

    /// Returns a copy with blending switched on or off.
    #[must_use]
    pub const fn with_enabled(self, enabled: bool) -> Self {
        Self {
            enabled,
            func: self.func,
        }
    }

    /// Returns a copy with a different blend function.
    #[must_use]
    pub const fn with_func(self, func: BlendFunc) -> Self {
        Self {
            enabled: self.enabled,
            func,
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Decides how requested blend-state mutations are applied.
pub trait BlendStrategy {
    /// Resolves a request to move from `current` to `requested`.
    ///
    /// Returns the state to apply, or `None` to leave `current` untouched.
    fn resolve(&self, current: BlendState, requested: BlendState) -> Option<BlendState>;
}

/// Applies every request unchanged. Used for direct drawing.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl BlendStrategy for PassThrough {
    fn resolve(&self, _current: BlendState, requested: BlendState) -> Option<BlendState> {
        Some(requested)
    }
}

/// Normalizes blend mutations while drawing into a cache element.
#[derive(Debug)]
pub struct BlendInterceptor {
    default: BlendState,
    in_place: BlendState,
    rejected: Cell<u32>,
}

impl BlendInterceptor {
    /// Creates an interceptor accepting [`BlendState::STANDARD`] and
    /// [`BlendState::GLINT`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_states(BlendState::STANDARD, BlendState::GLINT)
    }

    /// Creates an interceptor with explicit default and in-place states.
    #[must_use]
    pub const fn with_states(default: BlendState, in_place: BlendState) -> Self {
        Self {
            default,
            in_place,
            rejected: Cell::new(0),
        }
    }

    /// The state layers expect when they start drawing.
    #[must_use]
    pub const fn default_state(&self) -> BlendState {
        self.default
    }

    /// Number of requests rejected since creation or the last
    /// [`take_rejected`](Self::take_rejected).
    #[must_use]
    pub fn rejected(&self) -> u32 {
        self.rejected.get()
    }

    /// Returns and resets the rejection count.
    pub fn take_rejected(&self) -> u32 {
        self.rejected.replace(0)
    }
}

impl Default for BlendInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlendStrategy for BlendInterceptor {
    fn resolve(&self, current: BlendState, requested: BlendState) -> Option<BlendState> {
        if !requested.enabled {
            // The buffer starts fully transparent, so a plain copy leaves
            // drawn pixels with the source alpha the screen would have shown.
            return Some(BlendState::OPAQUE_COPY);
        }
        if self.default.matches(requested.func) || self.in_place.matches(requested.func) {
            return Some(requested);
        }
        if requested.func == current.func {
            // Re-enabling on top of the substituted copy state.
            return None;
        }
        self.rejected.set(self.rejected.get().saturating_add(1));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_applies_everything() {
        let requested = BlendState::INITIAL;
        assert_eq!(
            PassThrough.resolve(BlendState::STANDARD, requested),
            Some(requested)
        );
    }

    #[test]
    fn interceptor_allows_default_and_glint() {
        let interceptor = BlendInterceptor::new();
        assert_eq!(
            interceptor.resolve(BlendState::STANDARD, BlendState::STANDARD),
            Some(BlendState::STANDARD)
        );
        assert_eq!(
            interceptor.resolve(BlendState::STANDARD, BlendState::GLINT),
            Some(BlendState::GLINT)
        );
        assert_eq!(interceptor.rejected(), 0);
    }

    #[test]
    fn interceptor_substitutes_disable_with_opaque_copy() {
        let interceptor = BlendInterceptor::new();
        let resolved = interceptor.resolve(
            BlendState::STANDARD,
            BlendState::STANDARD.with_enabled(false),
        );
        assert_eq!(resolved, Some(BlendState::OPAQUE_COPY));
    }

    #[test]
    fn interceptor_rejects_unknown_functions() {
        let interceptor = BlendInterceptor::new();
        let multiply = BlendState::STANDARD.with_func(BlendFunc::uniform(
            BlendFactor::DstColor,
            BlendFactor::Zero,
        ));
        assert_eq!(interceptor.resolve(BlendState::STANDARD, multiply), None);
        assert_eq!(interceptor.rejected(), 1);
        assert_eq!(interceptor.take_rejected(), 1);
        assert_eq!(interceptor.rejected(), 0);
    }

    #[test]
    fn re_enable_after_substitution_is_not_counted() {
        let interceptor = BlendInterceptor::new();
        let current = BlendState::OPAQUE_COPY;
        assert_eq!(interceptor.resolve(current, current.with_enabled(true)), None);
        assert_eq!(interceptor.rejected(), 0, "keeping the copy state is expected");
    }

    #[test]
    fn named_states_are_distinct() {
        assert_ne!(BlendState::STANDARD, BlendState::GLINT);
        assert_ne!(BlendState::STANDARD, BlendState::COMPOSITE);
        assert!(!BlendState::INITIAL.enabled);
        assert!(BlendState::COMPOSITE.enabled);
    }
}
