use std::collections::HashMap;

use crate::error::{ContinuumError, Result};

#[derive(Debug, Clone, Default)]
pub struct CubeHeader {
    pub cards: Vec<(String, String)>,
    pub index: HashMap<String, String>,
}

impl CubeHeader {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut cards = Vec::new();
        let mut index = HashMap::new();
        for (k, v) in pairs {
            let k = k.into();
            let v = v.into();
            index.insert(k.clone(), v.clone());
            cards.push((k, v));
        }
        Self { cards, index }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|s| s.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.index.get(key)?.trim().parse().ok()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.index.get(key)?.trim().parse().ok()
    }

    pub fn require_f64(&self, key: &str) -> Result<f64> {
        self.get_f64(key)
            .ok_or_else(|| ContinuumError::MissingHeaderKey(key.to_string()))
    }

    /// Instrument valid wavelength range `[WAVGOOD0, WAVGOOD1]`.
    pub fn valid_wavelength_range(&self) -> Result<(f64, f64)> {
        let lo = self.require_f64("WAVGOOD0")?;
        let hi = self.require_f64("WAVGOOD1")?;
        if lo > hi {
            return Err(ContinuumError::Data(format!(
                "WAVGOOD0 ({}) exceeds WAVGOOD1 ({})",
                lo, hi
            )));
        }
        Ok((lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let h = CubeHeader::from_pairs([("CRVAL3", " 4000.5 "), ("NAXIS3", "120")]);
        assert_eq!(h.get_f64("CRVAL3"), Some(4000.5));
        assert_eq!(h.get_i64("NAXIS3"), Some(120));
        assert!(h.get_f64("CD3_3").is_none());
        assert!(matches!(
            h.require_f64("CD3_3"),
            Err(ContinuumError::MissingHeaderKey(k)) if k == "CD3_3"
        ));
    }

    #[test]
    fn test_valid_range_order() {
        let h = CubeHeader::from_pairs([("WAVGOOD0", "5000"), ("WAVGOOD1", "4000")]);
        assert!(h.valid_wavelength_range().is_err());

        let h = CubeHeader::from_pairs([("WAVGOOD0", "4000"), ("WAVGOOD1", "5000")]);
        assert_eq!(h.valid_wavelength_range().unwrap(), (4000.0, 5000.0));
    }
}
