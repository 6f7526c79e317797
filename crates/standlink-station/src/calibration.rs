//! Pressure transducer transfer function and zero offsets.
//!
//! Transducers output 0.5 V at zero and 4.5 V at full scale. The ADC runs at
//! a gain of 2/3, so one count is `6.144 V / 32767`.

use serde::{Deserialize, Serialize};

/// ADC full-scale input at gain 2/3, in volts.
pub const ADC_FULL_SCALE_V: f64 = 4.096 / (2.0 / 3.0);
/// Largest positive ADC count.
pub const ADC_MAX_COUNT: f64 = 32767.0;
/// Transducer output at zero pressure.
pub const SENSOR_ZERO_V: f64 = 0.5;
/// Transducer output span from zero to full scale.
pub const SENSOR_SPAN_V: f64 = 4.0;

/// Pressure transducer range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorClass {
    /// 0..5000 psi.
    High,
    /// 0..2000 psi.
    #[default]
    Low,
}

impl SensorClass {
    pub fn full_scale_psi(self) -> f64 {
        match self {
            Self::High => 5000.0,
            Self::Low => 2000.0,
        }
    }

    /// Convert a raw ADC count to psi, before any zero offset.
    pub fn counts_to_psi(self, raw: u16) -> f64 {
        let volts = counts_to_volts(raw);
        (volts - SENSOR_ZERO_V) / SENSOR_SPAN_V * self.full_scale_psi()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

pub fn counts_to_volts(raw: u16) -> f64 {
    f64::from(raw) * (ADC_FULL_SCALE_V / ADC_MAX_COUNT)
}

/// Per-channel zero offsets in psi, subtracted at read time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calibration {
    offsets: Vec<f64>,
}

impl Calibration {
    pub fn new(channels: usize) -> Self {
        Self {
            offsets: vec![0.0; channels],
        }
    }

    pub fn offset(&self, channel: usize) -> f64 {
        self.offsets.get(channel).copied().unwrap_or(0.0)
    }

    /// Replace the offset for `channel`. Out-of-range channels are ignored.
    pub fn set_offset(&mut self, channel: usize, psi: f64) {
        if let Some(slot) = self.offsets.get_mut(channel) {
            *slot = psi;
        }
    }

    /// Calibrated pressure for a raw sample.
    pub fn apply(&self, class: SensorClass, channel: usize, raw: u16) -> f64 {
        class.counts_to_psi(raw) - self.offset(channel)
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn clear(&mut self) {
        self.offsets.iter_mut().for_each(|o| *o = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_for_volts(volts: f64) -> u16 {
        (volts / (ADC_FULL_SCALE_V / ADC_MAX_COUNT)).round() as u16
    }

    #[test]
    fn zero_volts_point_reads_zero_psi() {
        let raw = raw_for_volts(0.5);
        assert!(SensorClass::Low.counts_to_psi(raw).abs() < 0.2);
        assert!(SensorClass::High.counts_to_psi(raw).abs() < 0.5);
    }

    #[test]
    fn full_scale_reads_range_max() {
        let raw = raw_for_volts(4.5);
        assert!((SensorClass::Low.counts_to_psi(raw) - 2000.0).abs() < 0.5);
        assert!((SensorClass::High.counts_to_psi(raw) - 5000.0).abs() < 1.0);
    }

    #[test]
    fn raw_zero_is_negative_pressure() {
        // 0 V is below the transducer's 0.5 V floor.
        assert_eq!(SensorClass::Low.counts_to_psi(0), -250.0);
        assert_eq!(SensorClass::High.counts_to_psi(0), -625.0);
    }

    #[test]
    fn offsets_apply_at_read_time() {
        let mut cal = Calibration::new(2);
        let raw = 10_000;
        let before = cal.apply(SensorClass::Low, 1, raw);
        cal.set_offset(1, before);
        assert_eq!(cal.apply(SensorClass::Low, 1, raw), 0.0);
        assert_eq!(cal.apply(SensorClass::Low, 0, raw), before);

        cal.clear();
        assert_eq!(cal.apply(SensorClass::Low, 1, raw), before);
    }

    #[test]
    fn out_of_range_offset_is_ignored() {
        let mut cal = Calibration::new(1);
        cal.set_offset(5, 12.0);
        assert_eq!(cal.offset(5), 0.0);
        assert_eq!(cal.offsets(), &[0.0]);
    }

    #[test]
    fn sensor_class_parses_lowercase() {
        let classes: Vec<SensorClass> = serde_json::from_str(r#"["high","low"]"#).unwrap();
        assert_eq!(classes, vec![SensorClass::High, SensorClass::Low]);
    }
}
