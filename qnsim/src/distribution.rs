//! Random variate generators for inter-arrival, service and patience times.
//!
//! A [`Sampler`] is built once from a textual descriptor such as `"exp(80)"` or
//! `"lognormal(100;50)"`, or from a mean and a coefficient of variation, and then sampled with
//! the random number generator of the replication that owns it.
//!
//! Building a sampler never fails: anything that cannot be understood becomes
//! [`Sampler::Zero`], which always returns `0`. Callers are expected to validate the ranges of
//! their parameters before building a sampler.

use std::f64::consts::E;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde_json::Value;

/// Shapes closer to 1 than this are sampled as exponential.
const GAMMA_EXP_EPSILON: f64 = 1e-8;

/// Floor applied to the mean and the scale when converting mean/sd to gamma parameters.
const GAMMA_MIN_PARAM: f64 = 1e-6;

/// A stateless random variate generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Sampler {
    /// Always returns zero. Result of any malformed descriptor.
    Zero,
    /// Always returns the given value.
    Constant(f64),
    /// Uniform on `[low, high)`.
    Uniform {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Exponential with the given mean.
    Exponential {
        /// Expected value.
        mean: f64,
    },
    /// Log-normal parametrized by the mean and standard deviation of the underlying normal.
    LogNormal {
        /// Mean of the logarithm.
        mu: f64,
        /// Standard deviation of the logarithm.
        sigma: f64,
    },
    /// Gamma distribution.
    Gamma {
        /// Shape parameter (alpha).
        shape: f64,
        /// Scale parameter (beta).
        scale: f64,
    },
}

impl Default for Sampler {
    fn default() -> Self {
        Self::Zero
    }
}

impl Sampler {
    /// Constant sampler.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        if value.is_finite() {
            Self::Constant(value)
        } else {
            Self::Zero
        }
    }

    /// Uniform sampler on `[low, high)`.
    #[must_use]
    pub fn uniform(low: f64, high: f64) -> Self {
        if low.is_finite() && high.is_finite() {
            Self::Uniform { low, high }
        } else {
            Self::Zero
        }
    }

    /// Exponential sampler with the given mean.
    #[must_use]
    pub fn exponential(mean: f64) -> Self {
        if mean.is_finite() {
            Self::Exponential { mean }
        } else {
            Self::Zero
        }
    }

    /// Log-normal sampler with the given mean and standard deviation of the resulting variates.
    #[must_use]
    pub fn lognormal(mean: f64, sd: f64) -> Self {
        if mean <= 0.0 || sd < 0.0 {
            return Self::Zero;
        }
        let sigma2 = ((sd / mean).powi(2) + 1.0).ln();
        let mu = mean.ln() - sigma2 / 2.0;
        let sigma = sigma2.sqrt();
        if mu.is_finite() && sigma.is_finite() {
            Self::LogNormal { mu, sigma }
        } else {
            Self::Zero
        }
    }

    /// Gamma sampler with the given mean and standard deviation of the resulting variates.
    ///
    /// A shape within `1e-8` of 1 is sampled as exponential, and zero deviation gives a
    /// constant.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn gamma(mean: f64, sd: f64) -> Self {
        if !mean.is_finite() || !sd.is_finite() || mean <= 0.0 || sd < 0.0 {
            return Self::Zero;
        }
        if sd == 0.0 {
            return Self::Constant(mean);
        }
        let scale = sd * sd / mean.max(GAMMA_MIN_PARAM);
        let shape = mean / scale.max(GAMMA_MIN_PARAM);
        if (shape - 1.0).abs() < GAMMA_EXP_EPSILON {
            Self::Exponential { mean: scale }
        } else {
            Self::Gamma { shape, scale }
        }
    }

    /// Moment-matched sampler: constant for `cv == 0`, exponential for `cv == 1`, and log-normal
    /// with standard deviation `mean * cv` otherwise.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn from_mean_cv(mean: f64, cv: f64) -> Self {
        if cv == 0.0 {
            Self::constant(mean)
        } else if cv == 1.0 {
            Self::exponential(mean)
        } else {
            Self::lognormal(mean, mean * cv)
        }
    }

    /// Parses a descriptor of the form `name(p1;p2;...)`.
    ///
    /// Known names (case-insensitive): `const(c)`, `uniform(a;b)`, `exp(mean)`,
    /// `lognormal(mean;sd)`, `gamma(mean;sd)`. Decimal commas are accepted.
    #[must_use]
    pub fn parse(descriptor: &str) -> Self {
        let parsed = Self::split_descriptor(descriptor).and_then(|(name, params)| {
            match (name.as_str(), params.as_slice()) {
                ("const", &[c]) => Some(Self::constant(c)),
                ("uniform", &[a, b]) => Some(Self::uniform(a, b)),
                ("exp", &[mean]) => Some(Self::exponential(mean)),
                ("lognormal", &[mean, sd]) => Some(Self::lognormal(mean, sd)),
                ("gamma", &[mean, sd]) => Some(Self::gamma(mean, sd)),
                _ => None,
            }
        });
        parsed.unwrap_or_else(|| {
            log::debug!("Unrecognized distribution `{}`; sampling zero", descriptor);
            Self::Zero
        })
    }

    fn split_descriptor(descriptor: &str) -> Option<(String, Vec<f64>)> {
        let open = descriptor.find('(')?;
        let close = descriptor.find(')')?;
        if close < open {
            return None;
        }
        let name = descriptor[..open].trim().to_lowercase();
        let params = descriptor[open + 1..close]
            .split(';')
            .map(|p| p.trim().replace(',', ".").parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        if params.iter().all(|p| p.is_finite()) {
            Some((name, params))
        } else {
            None
        }
    }

    /// Builds a sampler from a JSON value: numbers are constants, strings are parsed with
    /// [`Sampler::parse`], and everything else samples zero.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map_or(Self::Zero, Self::constant),
            Value::String(s) => Self::parse(s),
            _ => Self::Zero,
        }
    }

    /// Expected value of the variates.
    #[must_use]
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Zero => 0.0,
            Self::Constant(c) => c,
            Self::Uniform { low, high } => (low + high) / 2.0,
            Self::Exponential { mean } => mean,
            Self::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Self::Gamma { shape, scale } => shape * scale,
        }
    }
}

impl Distribution<f64> for Sampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Zero => 0.0,
            Self::Constant(c) => c,
            Self::Uniform { low, high } => low + (high - low) * rng.gen::<f64>(),
            Self::Exponential { mean } => exponential(mean, rng),
            Self::LogNormal { mu, sigma } => lognormal(mu, sigma, rng),
            Self::Gamma { shape, scale } if shape < 1.0 => gamma_small_shape(shape, scale, rng),
            Self::Gamma { shape, scale } => gamma_large_shape(shape, scale, rng),
        }
    }
}

/// Inverse transform.
fn exponential<R: Rng + ?Sized>(mean: f64, rng: &mut R) -> f64 {
    -mean * (1.0 - rng.gen::<f64>()).ln()
}

/// Marsaglia's polar method.
fn lognormal<R: Rng + ?Sized>(mu: f64, sigma: f64, rng: &mut R) -> f64 {
    loop {
        let u = 2.0 * rng.gen::<f64>() - 1.0;
        let v = 2.0 * rng.gen::<f64>() - 1.0;
        let q = u * u + v * v;
        if q > 0.0 && q < 1.0 {
            let p = (-2.0 * q.ln() / q).sqrt();
            return (u * p * sigma + mu).exp();
        }
    }
}

/// Ahrens-Dieter, Algorithm GS, for `0 < shape < 1`.
fn gamma_small_shape<R: Rng + ?Sized>(shape: f64, scale: f64, rng: &mut R) -> f64 {
    let b = 1.0 + shape / E;
    loop {
        let p = b * rng.gen::<f64>();
        if p <= 1.0 {
            let x = p.powf(1.0 / shape);
            if rng.gen::<f64>() <= (-x).exp() {
                return scale * x;
            }
        } else {
            let x = -((b - p) / shape).ln();
            if rng.gen::<f64>() <= x.powf(shape - 1.0) {
                return scale * x;
            }
        }
    }
}

/// Marsaglia-Tsang with the squeeze test, for `shape >= 1`.
fn gamma_large_shape<R: Rng + ?Sized>(shape: f64, scale: f64, rng: &mut R) -> f64 {
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (3.0 * d.sqrt());
    loop {
        let x: f64 = rng.sample(StandardNormal);
        let v = (1.0 + c * x).powi(3);
        if v <= 0.0 {
            continue;
        }
        let x2 = x * x;
        let u: f64 = rng.gen();
        if u < 1.0 - 0.0331 * x2 * x2 || u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
            return scale * d * v;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use float_cmp::approx_eq;
    use rand_chacha::{rand_core::SeedableRng, ChaChaRng};
    use rstest::rstest;

    fn moments(sampler: &Sampler, n: usize, seed: u64) -> (f64, f64) {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        let samples: Vec<f64> = sampler.sample_iter(&mut rng).take(n).collect();
        #[allow(clippy::cast_precision_loss)]
        let n = n as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    }

    #[rstest(
        descriptor,
        expected,
        case("const(5)", Sampler::Constant(5.0)),
        case("CONST( 2,5 )", Sampler::Constant(2.5)),
        case("uniform(1;3)", Sampler::Uniform { low: 1.0, high: 3.0 }),
        case("exp(80)", Sampler::Exponential { mean: 80.0 }),
        case("Exp(0.5)", Sampler::Exponential { mean: 0.5 }),
        case("", Sampler::Zero),
        case("exp", Sampler::Zero),
        case("exp)80(", Sampler::Zero),
        case("exp(80;1)", Sampler::Zero),
        case("uniform(1)", Sampler::Zero),
        case("weibull(1;2)", Sampler::Zero),
        case("exp(abc)", Sampler::Zero),
        case("lognormal(-1;2)", Sampler::Zero),
        case("gamma(0;1)", Sampler::Zero),
        case("gamma(5;0)", Sampler::Constant(5.0))
    )]
    fn test_parse(descriptor: &str, expected: Sampler) {
        assert_eq!(Sampler::parse(descriptor), expected);
    }

    #[test]
    fn test_zero_always_returns_zero() {
        let mut rng = ChaChaRng::seed_from_u64(1);
        let sampler = Sampler::parse("nonsense");
        assert!((0..100).all(|_| sampler.sample(&mut rng) == 0.0));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            Sampler::from_json(&serde_json::json!(3)),
            Sampler::Constant(3.0)
        );
        assert_eq!(
            Sampler::from_json(&serde_json::json!("exp(2)")),
            Sampler::Exponential { mean: 2.0 }
        );
        assert_eq!(Sampler::from_json(&serde_json::json!(null)), Sampler::Zero);
        assert_eq!(Sampler::from_json(&serde_json::json!([1, 2])), Sampler::Zero);
    }

    #[test]
    fn test_from_mean_cv() {
        assert_eq!(Sampler::from_mean_cv(10.0, 0.0), Sampler::Constant(10.0));
        assert_eq!(
            Sampler::from_mean_cv(10.0, 1.0),
            Sampler::Exponential { mean: 10.0 }
        );
        match Sampler::from_mean_cv(10.0, 0.5) {
            sampler @ Sampler::LogNormal { .. } => {
                assert!(approx_eq!(f64, sampler.mean(), 10.0, epsilon = 1e-9));
            }
            other => panic!("expected log-normal, got {:?}", other),
        }
    }

    #[test]
    fn test_gamma_near_one_is_exponential() {
        assert_eq!(
            Sampler::gamma(3.0, 3.0),
            Sampler::Exponential { mean: 3.0 }
        );
        match Sampler::gamma(1.0, 0.5) {
            Sampler::Gamma { shape, scale } => {
                assert!(approx_eq!(f64, shape, 4.0, epsilon = 1e-9));
                assert!(approx_eq!(f64, scale, 0.25, epsilon = 1e-9));
            }
            other => panic!("expected gamma, got {:?}", other),
        }
    }

    #[rstest(
        sampler,
        mean,
        sd,
        tolerance,
        case(Sampler::exponential(80.0), 80.0, 80.0, 0.02),
        case(Sampler::uniform(2.0, 4.0), 3.0, 2.0 / 12_f64.sqrt(), 0.01),
        case(Sampler::lognormal(10.0, 5.0), 10.0, 5.0, 0.03),
        case(Sampler::gamma(10.0, 5.0), 10.0, 5.0, 0.02),
        case(Sampler::gamma(1.0, 2.0), 1.0, 2.0, 0.03)
    )]
    fn test_empirical_moments(sampler: Sampler, mean: f64, sd: f64, tolerance: f64) {
        let (sample_mean, sample_sd) = moments(&sampler, 200_000, 17);
        assert!(
            (sample_mean - mean).abs() / mean < tolerance,
            "mean {} vs {}",
            sample_mean,
            mean
        );
        assert!(
            (sample_sd - sd).abs() / sd < 2.0 * tolerance,
            "sd {} vs {}",
            sample_sd,
            sd
        );
        assert!(approx_eq!(f64, sampler.mean(), mean, epsilon = 1e-9));
    }

    #[test]
    fn test_gamma_is_continuous_around_unit_shape() {
        // Shapes just below, at, and just above the exponential switch point.
        let below = Sampler::Gamma {
            shape: 1.0 - 1e-6,
            scale: 5.0,
        };
        let at = Sampler::gamma(5.0, 5.0);
        let above = Sampler::Gamma {
            shape: 1.0 + 1e-6,
            scale: 5.0,
        };
        assert_eq!(at, Sampler::Exponential { mean: 5.0 });
        let (mean_below, sd_below) = moments(&below, 200_000, 3);
        let (mean_at, sd_at) = moments(&at, 200_000, 3);
        let (mean_above, sd_above) = moments(&above, 200_000, 3);
        for (m, s) in &[
            (mean_below, sd_below),
            (mean_at, sd_at),
            (mean_above, sd_above),
        ] {
            assert!((m - 5.0).abs() < 0.1, "mean {}", m);
            assert!((s - 5.0).abs() < 0.2, "sd {}", s);
        }
    }

    #[test]
    fn test_samples_are_reproducible() {
        let sampler = Sampler::lognormal(3.0, 1.0);
        let mut a = ChaChaRng::seed_from_u64(9);
        let mut b = ChaChaRng::seed_from_u64(9);
        let xs: Vec<f64> = (&sampler).sample_iter(&mut a).take(10).collect();
        let ys: Vec<f64> = (&sampler).sample_iter(&mut b).take(10).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&x| x > 0.0));
    }
}
