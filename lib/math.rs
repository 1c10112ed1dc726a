// Math facade: platform numeric functions plus the seedable legacy generator.
// Domain violations (sqrt(-1), log(0), ...) behave like the platform library:
// NaN or infinities, never a panic.
use once_cell::sync::Lazy;
use std::sync::{Mutex, PoisonError};

pub fn acos(x: f64) -> f64 {
    x.acos()
}

pub fn asin(x: f64) -> f64 {
    x.asin()
}

pub fn atan(x: f64) -> f64 {
    x.atan()
}

pub fn atan2(y: f64, x: f64) -> f64 {
    y.atan2(x)
}

pub fn cos(x: f64) -> f64 {
    x.cos()
}

pub fn cosh(x: f64) -> f64 {
    x.cosh()
}

pub fn sin(x: f64) -> f64 {
    x.sin()
}

pub fn sinh(x: f64) -> f64 {
    x.sinh()
}

pub fn tan(x: f64) -> f64 {
    x.tan()
}

pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

pub fn exp(x: f64) -> f64 {
    x.exp()
}

/// Split `x` into a mantissa in [0.5, 1) and a power of two:
/// `x == mantissa * 2^exponent`.
pub fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || x.is_nan() || x.is_infinite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // Subnormal: normalize first
        let (mantissa, exponent) = frexp(x * f64::from_bits(0x4350_0000_0000_0000));
        return (mantissa, exponent - 54);
    }
    let mantissa = f64::from_bits((bits & !(0x7ff << 52)) | (1022 << 52));
    (mantissa, biased - 1022)
}

/// `x * 2^exponent`
pub fn ldexp(x: f64, exponent: i32) -> f64 {
    let mut x = x;
    let mut exponent = exponent;
    while exponent > 1023 && x.is_finite() && x != 0.0 {
        x *= 2f64.powi(1023);
        exponent -= 1023;
    }
    while exponent < -1022 && x.is_finite() && x != 0.0 {
        x *= 2f64.powi(-1022);
        exponent += 1022;
    }
    x * 2f64.powi(exponent.clamp(-1022, 1023))
}

pub fn log(x: f64) -> f64 {
    x.ln()
}

pub fn log10(x: f64) -> f64 {
    x.log10()
}

/// (fractional part, integral part), both carrying the sign of `x`.
pub fn modf(x: f64) -> (f64, f64) {
    if x.is_infinite() {
        return (0f64.copysign(x), x);
    }
    let integral = x.trunc();
    (x - integral, integral)
}

pub fn pow(x: f64, y: f64) -> f64 {
    x.powf(y)
}

pub fn sqrt(x: f64) -> f64 {
    x.sqrt()
}

pub fn ceil(x: f64) -> f64 {
    x.ceil()
}

pub fn fabs(x: f64) -> f64 {
    x.abs()
}

pub fn floor(x: f64) -> f64 {
    x.floor()
}

pub fn fmod(x: f64, y: f64) -> f64 {
    x % y
}

/// Integer absolute value; `i32::MIN` maps to itself.
pub fn abs(x: i32) -> i32 {
    x.wrapping_abs()
}

pub const RAND_MAX: i32 = 32767;

const DEFAULT_SEED: u32 = 1;

/// Deterministic pseudo-random generator (ANSI C reference LCG).
///
/// Two generators seeded alike yield the same sequence. Tests create their
/// own instance; `rand`/`srand` share one process-wide instance.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Rng { state: seed }
    }

    pub fn seed(&mut self, seed: u32) {
        self.state = seed;
    }

    /// Next value in `0..=RAND_MAX`.
    pub fn next(&mut self) -> i32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.state / 65_536) % 32_768) as i32
    }
}

impl Default for Rng {
    fn default() -> Self {
        Rng::new(DEFAULT_SEED)
    }
}

// Process-wide generator; behaves as if seeded with 1 until `srand` is called
static GLOBAL_RNG: Lazy<Mutex<Rng>> = Lazy::new(|| Mutex::new(Rng::default()));

pub fn srand(seed: u32) {
    GLOBAL_RNG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .seed(seed);
}

pub fn rand() -> i32 {
    GLOBAL_RNG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frexp_and_ldexp_invert_each_other() {
        assert_eq!(frexp(8.0), (0.5, 4));
        assert_eq!(frexp(-3.0), (-0.75, 2));
        assert_eq!(frexp(0.0), (0.0, 0));
        let tiny = f64::from_bits(1);
        let (m, e) = frexp(tiny);
        assert_eq!(m, 0.5);
        assert_eq!(e, -1073);
        assert_eq!(ldexp(m, e), tiny);
        assert_eq!(ldexp(0.75, 2), 3.0);
        assert_eq!(ldexp(1.0, 2000), f64::INFINITY);
    }

    #[test]
    fn modf_keeps_sign() {
        assert_eq!(modf(3.25), (0.25, 3.0));
        assert_eq!(modf(-3.25), (-0.25, -3.0));
        let (frac, int) = modf(f64::NEG_INFINITY);
        assert_eq!(int, f64::NEG_INFINITY);
        assert!(frac == 0.0 && frac.is_sign_negative());
    }

    #[test]
    fn forwarding_matches_platform() {
        assert!((atan2(1.0, 1.0) - std::f64::consts::FRAC_PI_4).abs() < 1e-15);
        assert_eq!(fmod(7.5, 2.0), 1.5);
        assert_eq!(pow(2.0, 10.0), 1024.0);
        assert!(sqrt(-1.0).is_nan());
        assert_eq!(log(0.0), f64::NEG_INFINITY);
        assert_eq!(abs(-5), 5);
        assert_eq!(abs(i32::MIN), i32::MIN);
        assert_eq!(floor(-0.5), -1.0);
        assert_eq!(ceil(-0.5), -0.0);
    }

    #[test]
    fn generator_matches_reference_sequence() {
        let mut rng = Rng::default();
        assert_eq!(rng.next(), 16838);
        assert_eq!(rng.next(), 5758);
        assert_eq!(rng.next(), 10113);
    }

    #[test]
    fn reseeding_repeats_the_sequence() {
        let mut rng = Rng::new(42);
        let first: Vec<i32> = (0..5).map(|_| rng.next()).collect();
        rng.seed(42);
        let second: Vec<i32> = (0..5).map(|_| rng.next()).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|v| (0..=RAND_MAX).contains(v)));
    }

    #[test]
    fn global_generator_is_seedable() {
        srand(7);
        let a = rand();
        srand(7);
        assert_eq!(rand(), a);
    }
}
