//! Calibration parameter value types.
//!
//! Each type carries its own conversion formula. Degenerate denominators yield
//! `0.0`; none of these conversions can fail.

/// Pixel-cell geometry class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiodeType {
    Normal = 0,
    Long = 1,
    Ganged = 2,
    Large = 3,
}

impl DiodeType {
    pub const COUNT: usize = 4;
    pub const ALL: [DiodeType; Self::COUNT] = [
        DiodeType::Normal,
        DiodeType::Long,
        DiodeType::Ganged,
        DiodeType::Large,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::str::FromStr for DiodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "long" => Ok(Self::Long),
            "ganged" => Ok(Self::Ganged),
            "large" => Ok(Self::Large),
            other => Err(format!("unknown diode type: {other}")),
        }
    }
}

/// Algorithm family used to convert charge and ToT for one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationStrategy {
    /// Non-linear fit over the full range.
    #[default]
    Run1Pix,
    /// Non-linear fit, linear extrapolation above the charge limit.
    Run3Pix,
    /// Per front-end ToT lookup table.
    LutFei4,
    Rd53,
}

impl CalibrationStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Run1Pix => "RUN1PIX",
            Self::Run3Pix => "RUN3PIX",
            Self::LutFei4 => "LUTFEI4",
            Self::Rd53 => "RD53",
        }
    }
}

/// Discriminator thresholds of one front-end, in electrons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Thresholds {
    pub value: i32,
    pub sigma: i32,
    pub noise: i32,
    pub in_time_value: i32,
}

impl Thresholds {
    pub const fn new(value: i32, sigma: i32, noise: i32, in_time_value: i32) -> Self {
        Self {
            value,
            sigma,
            noise,
            in_time_value,
        }
    }
}

/// Non-linear charge to ToT fit: `ToT(Q) = A (E + Q) / (C + Q)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LegacyFitParameters {
    pub a: f32,
    pub e: f32,
    pub c: f32,
}

impl LegacyFitParameters {
    pub const fn new(a: f32, e: f32, c: f32) -> Self {
        Self { a, e, c }
    }

    #[inline]
    pub fn tot(&self, q: f32) -> f32 {
        let denom = self.c + q;
        if denom != 0.0 {
            self.a * (self.e + q) / denom
        } else {
            0.0
        }
    }

    /// Inverse of [`Self::tot`].
    #[inline]
    pub fn q(&self, tot: f32) -> f32 {
        if self.a == 0.0 {
            return 0.0;
        }
        let ratio = tot / self.a;
        if ratio == 1.0 {
            return 0.0;
        }
        (self.c * ratio - self.e) / (1.0 - ratio)
    }
}

/// Linear charge to ToT relation: `Q = F ToT + G`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearFitParameters {
    pub f: f32,
    pub g: f32,
}

impl LinearFitParameters {
    pub const fn new(f: f32, g: f32) -> Self {
        Self { f, g }
    }

    #[inline]
    pub fn tot(&self, q: f32) -> f32 {
        if self.f != 0.0 {
            (q - self.g) / self.f
        } else {
            0.0
        }
    }

    #[inline]
    pub fn q(&self, tot: f32) -> f32 {
        self.f * tot + self.g
    }
}

/// ToT smearing: `sigma(Q) = res1 + res2 Q`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Resolutions {
    pub res1: f32,
    pub res2: f32,
}

impl Resolutions {
    pub const fn new(res1: f32, res2: f32) -> Self {
        Self { res1, res2 }
    }

    #[inline]
    pub fn total(&self, q: f32) -> f32 {
        self.res1 + self.res2 * q
    }
}

/// Charge for each ToT code 1..=16 of one FEI4 front-end.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IblCalibration {
    charges: [f32; IblCalibration::LEN],
}

impl IblCalibration {
    pub const LEN: usize = 16;

    pub const fn new(charges: [f32; Self::LEN]) -> Self {
        Self { charges }
    }

    /// Build from a slice holding exactly `LEN` charges.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let charges: [f32; Self::LEN] = values.try_into().ok()?;
        Some(Self { charges })
    }

    pub fn charges(&self) -> &[f32; Self::LEN] {
        &self.charges
    }

    /// Charge for a 1-based ToT code.
    pub fn charge(&self, tot: usize) -> Option<f32> {
        tot.checked_sub(1).and_then(|i| self.charges.get(i)).copied()
    }

    /// 1-based ToT code whose charge lies closest to `q`; first wins on ties.
    pub fn tot(&self, q: f32) -> usize {
        let mut best = 0usize;
        let mut best_diff = f32::INFINITY;
        for (i, charge) in self.charges.iter().enumerate() {
            let diff = (charge - q).abs();
            if diff < best_diff {
                best_diff = diff;
                best = i;
            }
        }
        best + 1
    }
}
