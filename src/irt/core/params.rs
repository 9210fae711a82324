//! Item parameters and their admissible bounds.
use crate::irt::errors::{IrtError, IrtResult};

/// 2PL item parameters: discrimination `alpha > 0` and difficulty `beta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemParam {
    pub alpha: f64,
    pub beta: f64,
}

impl ItemParam {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// Largest absolute component-wise change relative to `other`.
    pub fn max_abs_diff(&self, other: &ItemParam) -> f64 {
        (self.alpha - other.alpha).abs().max((self.beta - other.beta).abs())
    }
}

impl Default for ItemParam {
    /// Starting point for every item: `alpha = 1`, `beta = 0`.
    fn default() -> Self {
        Self { alpha: 1.0, beta: 0.0 }
    }
}

/// Box constraints on `(alpha, beta)` enforced by the item optimizer.
///
/// Defaults: `alpha ∈ [0.25, 2.0]`, `beta ∈ [-4.0, 4.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemBounds {
    pub alpha: (f64, f64),
    pub beta: (f64, f64),
}

impl ItemBounds {
    /// Validate and build bounds.
    ///
    /// # Errors
    /// - [`IrtError::InvalidBounds`] if either pair is non-finite or not
    ///   strictly increasing, or if the alpha lower bound is not positive.
    pub fn new(alpha: (f64, f64), beta: (f64, f64)) -> IrtResult<Self> {
        check_pair("alpha", alpha)?;
        check_pair("beta", beta)?;
        if alpha.0 <= 0.0 {
            return Err(IrtError::InvalidBounds {
                name: "alpha",
                lo: alpha.0,
                hi: alpha.1,
                reason: "discrimination lower bound must be > 0",
            });
        }
        Ok(Self { alpha, beta })
    }

    /// Clamp a parameter pair into the box.
    pub fn clamp(&self, param: ItemParam) -> ItemParam {
        ItemParam {
            alpha: param.alpha.clamp(self.alpha.0, self.alpha.1),
            beta: param.beta.clamp(self.beta.0, self.beta.1),
        }
    }

    pub fn contains(&self, param: &ItemParam) -> bool {
        (self.alpha.0..=self.alpha.1).contains(&param.alpha)
            && (self.beta.0..=self.beta.1).contains(&param.beta)
    }
}

impl Default for ItemBounds {
    fn default() -> Self {
        Self { alpha: (0.25, 2.0), beta: (-4.0, 4.0) }
    }
}

fn check_pair(name: &'static str, (lo, hi): (f64, f64)) -> IrtResult<()> {
    if !lo.is_finite() || !hi.is_finite() {
        return Err(IrtError::InvalidBounds { name, lo, hi, reason: "bounds must be finite" });
    }
    if lo >= hi {
        return Err(IrtError::InvalidBounds { name, lo, hi, reason: "lower bound must be < upper" });
    }
    Ok(())
}
