//! Range checks for presets, composed as small validators.
//!
//! ```ignore
//! use bonestudio_core::preset::validate::{ValidateExt, SpringRanges, PositiveRate, And};
//! preset.validate_with::<And<PositiveRate, SpringRanges>>()?;
//! ```

use super::Preset;
use crate::error::StoreError;

/// Checks `Cfg` and returns a domain-defined error.
pub trait Validator<Cfg> {
    type Error;
    fn validate(cfg: &Cfg) -> Result<(), Self::Error>;
}

/// Extension for `cfg.validate_with::<V>()` calls.
pub trait ValidateExt {
    fn validate_with<V>(&self) -> Result<(), <V as Validator<Self>>::Error>
    where
        Self: Sized,
        V: Validator<Self>;
}

impl<T> ValidateExt for T {
    fn validate_with<V>(&self) -> Result<(), <V as Validator<Self>>::Error>
    where
        Self: Sized,
        V: Validator<Self>,
    {
        V::validate(self)
    }
}

/// Both `A` and `B` must pass; stops at the first failure.
pub struct And<A, B>(core::marker::PhantomData<(A, B)>);

impl<Cfg, A, B, E> Validator<Cfg> for And<A, B>
where
    A: Validator<Cfg, Error = E>,
    B: Validator<Cfg, Error = E>,
{
    type Error = E;

    fn validate(cfg: &Cfg) -> Result<(), Self::Error> {
        A::validate(cfg)?;
        B::validate(cfg)?;
        Ok(())
    }
}

fn invalid(p: &Preset, msg: String) -> StoreError {
    StoreError::InvalidPreset { name: p.name.clone(), msg }
}

/// Update rate must be a positive, finite frame rate.
pub struct PositiveRate;

impl Validator<Preset> for PositiveRate {
    type Error = StoreError;
    fn validate(p: &Preset) -> Result<(), StoreError> {
        if p.update_rate.is_finite() && p.update_rate > 0.0 {
            Ok(())
        } else {
            Err(invalid(p, format!("update rate must be > 0, got {}", p.update_rate)))
        }
    }
}

/// Spring coefficients in `[0, 1]`, radius and end length non-negative.
pub struct SpringRanges;

impl Validator<Preset> for SpringRanges {
    type Error = StoreError;
    fn validate(p: &Preset) -> Result<(), StoreError> {
        let unit = [
            ("damping", p.damping),
            ("elasticity", p.elasticity),
            ("stiffness", p.stiffness),
            ("inert", p.inert),
        ];
        for (field, v) in unit {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(p, format!("{field} must be within [0, 1], got {v}")));
            }
        }
        for (field, v) in [("radius", p.radius), ("end length", p.end_length)] {
            if v.is_nan() || v < 0.0 {
                return Err(invalid(p, format!("{field} must be >= 0, got {v}")));
            }
        }
        Ok(())
    }
}

/// The full set of checks applied before a preset is stored.
pub type PresetChecks = And<PositiveRate, SpringRanges>;
