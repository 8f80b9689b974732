//! Mesh-spacing oracle h(x).
//!
//! The core treats spacing as a black box evaluated at query points. Each
//! query carries a location `Hint` from the previous lookup on the same
//! node, letting structured implementations amortise their search; the
//! hint is opaque to the caller.

/// Opaque location hint for amortised spacing lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hint(pub u32);

impl Hint {
    /// "No information" hint, valid for any `Hfun` implementation.
    pub const NULL: Hint = Hint(u32::MAX);
}

impl Default for Hint {
    fn default() -> Self {
        Hint::NULL
    }
}

/// Spacing-function capability, generic over the query point type.
///
/// Implementations must be pure: identical `(p, hint)` inputs yield
/// identical values, and evaluation mutates no shared state.
pub trait Hfun<P: Copy> {
    /// Evaluate h at `p`; returns the value and an updated hint.
    fn eval(&self, p: P, hint: Hint) -> (f64, Hint);

    /// Hint to use when nothing is known about the query location.
    fn null_hint(&self) -> Hint {
        Hint::NULL
    }
}

/// Constant spacing h(x) = h0.
#[derive(Clone, Copy, Debug)]
pub struct Uniform(pub f64);

impl<P: Copy> Hfun<P> for Uniform {
    #[inline]
    fn eval(&self, _p: P, hint: Hint) -> (f64, Hint) {
        (self.0, hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    #[test]
    fn uniform_ignores_location_and_keeps_hint() {
        let h = Uniform(0.25);
        let (v0, h0) = h.eval(Vector2::new(0.0, 0.0), Hint::NULL);
        let (v1, h1) = h.eval(Vector2::new(9.0, -3.0), h0);
        assert_eq!(v0, 0.25);
        assert_eq!(v1, 0.25);
        assert_eq!(h1, h0);
    }
}
