//! Per-feature similarity functions
//!
//! Every function maps two values of its feature type to a score in [0.0, 1.0]
//! where 1.0 means identical. Functions are deterministic and total over
//! well-formed values; a value of the wrong shape is reported as
//! [`Error::InvalidFeatureValue`] rather than silently scored.

use ahash::AHashSet;
use featsim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Similarity between two values of one feature type.
pub trait FeatureSimilarity: Send + Sync + fmt::Debug {
    /// Score two present values of `feature`.
    fn similarity(&self, feature: &str, a: &Value, b: &Value) -> Result<f64>;

    /// Whether `similarity(a, b) == similarity(b, a)` for all inputs. Symmetric
    /// functions also guarantee `similarity(x, x) == 1.0`.
    fn is_symmetric(&self) -> bool {
        true
    }
}

/// Distance method for numeric features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericDistance {
    /// 1 - |a - b| / max(|a|, |b|)
    #[default]
    Relative,
    /// exp(-|a - b| / scale) with a scale adapted to the magnitudes
    Absolute,
    /// 1 if equal, 0 otherwise
    Exact,
}

/// Comparison method for free-text features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMethod {
    /// Share of the first text's tokens found in the second. Directional.
    #[default]
    Overlap,
    /// Jaccard over character trigrams
    Trigram,
}

fn scalar_text<'a>(feature: &str, value: &'a Value) -> Result<std::borrow::Cow<'a, str>> {
    match value {
        Value::String(s) => Ok(std::borrow::Cow::Borrowed(s.as_str())),
        Value::Number(n) => Ok(std::borrow::Cow::Owned(n.to_string())),
        Value::Bool(b) => Ok(std::borrow::Cow::Owned(b.to_string())),
        other => Err(Error::invalid_value(
            feature,
            format!("expected a scalar, got {}", other),
        )),
    }
}

fn number(feature: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() => Ok(x),
        _ => Err(Error::invalid_value(
            feature,
            format!("expected a finite number, got {}", value),
        )),
    }
}

fn normalize_token(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Categorical values compared case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalSimilarity;

impl FeatureSimilarity for CategoricalSimilarity {
    fn similarity(&self, feature: &str, a: &Value, b: &Value) -> Result<f64> {
        let a = scalar_text(feature, a)?;
        let b = scalar_text(feature, b)?;
        Ok(if normalize_token(&a) == normalize_token(&b) { 1.0 } else { 0.0 })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumericSimilarity {
    pub distance: NumericDistance,
}

impl FeatureSimilarity for NumericSimilarity {
    fn similarity(&self, feature: &str, a: &Value, b: &Value) -> Result<f64> {
        let a = number(feature, a)?;
        let b = number(feature, b)?;
        if a == b {
            return Ok(1.0);
        }

        let sim = match self.distance {
            NumericDistance::Relative => {
                let max = a.abs().max(b.abs());
                (1.0 - (a - b).abs() / max).max(0.0)
            }
            NumericDistance::Absolute => {
                // halved before adding so the scale stays finite near f64::MAX
                let scale = a.abs() / 2.0 + b.abs() / 2.0 + 0.5;
                (-(a - b).abs() / scale).exp()
            }
            NumericDistance::Exact => 0.0,
        };
        if !sim.is_finite() {
            return Ok(0.0);
        }
        Ok(sim.clamp(0.0, 1.0))
    }
}

/// Jaccard similarity between value sets.
///
/// A set is either a JSON array of scalars or a string joined by `separator`.
#[derive(Debug, Clone)]
pub struct SetSimilarity {
    pub separator: String,
}

impl Default for SetSimilarity {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
        }
    }
}

impl SetSimilarity {
    fn elements(&self, feature: &str, value: &Value) -> Result<AHashSet<String>> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| scalar_text(feature, item).map(|s| normalize_token(&s)))
                .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
                .collect(),
            Value::String(s) => Ok(s
                .split(self.separator.as_str())
                .map(normalize_token)
                .filter(|item| !item.is_empty())
                .collect()),
            Value::Number(_) | Value::Bool(_) => {
                let mut set = AHashSet::new();
                set.insert(normalize_token(&scalar_text(feature, value)?));
                Ok(set)
            }
            other => Err(Error::invalid_value(
                feature,
                format!("expected an array or delimited string, got {}", other),
            )),
        }
    }
}

impl FeatureSimilarity for SetSimilarity {
    fn similarity(&self, feature: &str, a: &Value, b: &Value) -> Result<f64> {
        let a = self.elements(feature, a)?;
        let b = self.elements(feature, b)?;
        Ok(jaccard(&a, &b))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextSimilarity {
    pub method: TextMethod,
}

impl FeatureSimilarity for TextSimilarity {
    fn similarity(&self, feature: &str, a: &Value, b: &Value) -> Result<f64> {
        let a = scalar_text(feature, a)?;
        let b = scalar_text(feature, b)?;
        Ok(match self.method {
            TextMethod::Overlap => directional_overlap(&a, &b),
            TextMethod::Trigram => trigram_similarity(&a, &b),
        })
    }

    fn is_symmetric(&self) -> bool {
        self.method != TextMethod::Overlap
    }
}

/// Ordinal values: similarity falls off linearly with the distance between
/// the two positions in `levels`.
#[derive(Debug, Clone)]
pub struct OrdinalSimilarity {
    levels: Vec<String>,
}

impl OrdinalSimilarity {
    pub fn new(levels: &[String]) -> Self {
        Self {
            levels: levels.iter().map(|l| normalize_token(l)).collect(),
        }
    }

    fn rank(&self, feature: &str, value: &Value) -> Result<usize> {
        let text = normalize_token(&scalar_text(feature, value)?);
        self.levels
            .iter()
            .position(|level| *level == text)
            .ok_or_else(|| Error::invalid_value(feature, format!("unknown level '{}'", text)))
    }
}

impl FeatureSimilarity for OrdinalSimilarity {
    fn similarity(&self, feature: &str, a: &Value, b: &Value) -> Result<f64> {
        let a = self.rank(feature, a)?;
        let b = self.rank(feature, b)?;
        if self.levels.len() < 2 {
            return Ok(1.0);
        }
        let span = (self.levels.len() - 1) as f64;
        Ok(1.0 - a.abs_diff(b) as f64 / span)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanSimilarity;

impl BooleanSimilarity {
    fn flag(feature: &str, value: &Value) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(Error::invalid_value(
                feature,
                format!("expected a boolean, got {}", other),
            )),
        }
    }
}

impl FeatureSimilarity for BooleanSimilarity {
    fn similarity(&self, feature: &str, a: &Value, b: &Value) -> Result<f64> {
        Ok(if Self::flag(feature, a)? == Self::flag(feature, b)? { 1.0 } else { 0.0 })
    }
}

fn jaccard(a: &AHashSet<String>, b: &AHashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

fn tokens(text: &str) -> AHashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// |tok(a) ∩ tok(b)| / |tok(a)|
fn directional_overlap(a: &str, b: &str) -> f64 {
    let tokens_a = tokens(a);
    let tokens_b = tokens(b);
    if tokens_a.is_empty() {
        return if tokens_b.is_empty() { 1.0 } else { 0.0 };
    }
    let shared = tokens_a.intersection(&tokens_b).count();
    shared as f64 / tokens_a.len() as f64
}

/// Jaccard similarity over padded character trigrams
fn trigram_similarity(a: &str, b: &str) -> f64 {
    let trigrams_a = generate_trigrams(&a.to_lowercase());
    let trigrams_b = generate_trigrams(&b.to_lowercase());
    if trigrams_a.is_empty() || trigrams_b.is_empty() {
        return if trigrams_a.is_empty() && trigrams_b.is_empty() { 1.0 } else { 0.0 };
    }
    jaccard(&trigrams_a, &trigrams_b)
}

fn generate_trigrams(s: &str) -> AHashSet<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return AHashSet::new();
    }
    let padded = format!("  {}  ", trimmed);
    let chars: Vec<char> = padded.chars().collect();
    chars.windows(3).map(|w| w.iter().collect::<String>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_categorical_similarity() {
        let f = CategoricalSimilarity;
        assert_eq!(f.similarity("c", &json!("NetCDF"), &json!("netcdf")).unwrap(), 1.0);
        assert_eq!(f.similarity("c", &json!("NetCDF"), &json!("HDF")).unwrap(), 0.0);
        assert_eq!(f.similarity("c", &json!(4), &json!("4")).unwrap(), 1.0);
        assert!(matches!(
            f.similarity("c", &json!({"a": 1}), &json!("x")),
            Err(Error::InvalidFeatureValue { .. })
        ));
    }

    #[test]
    fn test_numeric_relative_similarity() {
        let f = NumericSimilarity::default();
        assert_eq!(f.similarity("n", &json!(10.0), &json!(10.0)).unwrap(), 1.0);
        assert_eq!(f.similarity("n", &json!(0), &json!(0)).unwrap(), 1.0);
        let sim = f.similarity("n", &json!(10.0), &json!(20.0)).unwrap();
        assert!((sim - 0.5).abs() < 1e-12);
        assert_eq!(f.similarity("n", &json!(-5.0), &json!(5.0)).unwrap(), 0.0);
        // numeric strings are accepted, junk is not
        assert_eq!(f.similarity("n", &json!("25"), &json!(25)).unwrap(), 1.0);
        assert!(f.similarity("n", &json!("25 km"), &json!(25)).is_err());
        assert!(f.similarity("n", &json!("NaN"), &json!(25)).is_err());
    }

    #[test]
    fn test_numeric_absolute_and_exact() {
        let abs = NumericSimilarity { distance: NumericDistance::Absolute };
        let sim = abs.similarity("n", &json!(10.0), &json!(11.0)).unwrap();
        assert!(sim > 0.5 && sim < 1.0);

        let exact = NumericSimilarity { distance: NumericDistance::Exact };
        assert_eq!(exact.similarity("n", &json!(3), &json!(3.0)).unwrap(), 1.0);
        assert_eq!(exact.similarity("n", &json!(3), &json!(3.1)).unwrap(), 0.0);
    }

    #[test]
    fn test_numeric_extreme_magnitudes_stay_in_range() {
        let abs = NumericSimilarity { distance: NumericDistance::Absolute };
        assert_eq!(abs.similarity("n", &json!(1e308), &json!(-1e308)).unwrap(), 0.0);
        let sim = abs.similarity("n", &json!(1e308), &json!(1.5e308)).unwrap();
        assert!(sim > 0.0 && sim < 1.0, "got {}", sim);
        assert_eq!(abs.similarity("n", &json!(1.7e308), &json!(1.7e308)).unwrap(), 1.0);

        let rel = NumericSimilarity::default();
        assert_eq!(rel.similarity("n", &json!(1e308), &json!(-1e308)).unwrap(), 0.0);
        let sim = rel.similarity("n", &json!(1e308), &json!(1.5e308)).unwrap();
        assert!(sim.is_finite() && (0.0..=1.0).contains(&sim));
    }

    #[test]
    fn test_set_similarity() {
        let f = SetSimilarity::default();
        let sim = f
            .similarity("s", &json!(["AVHRR", "MODIS"]), &json!("modis, VIIRS"))
            .unwrap();
        assert!((sim - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(f.similarity("s", &json!([]), &json!("")).unwrap(), 1.0);
        assert_eq!(f.similarity("s", &json!(["a", "b"]), &json!(["b", "a"])).unwrap(), 1.0);
        assert!(f.similarity("s", &json!([["nested"]]), &json!("a")).is_err());
    }

    #[test]
    fn test_text_overlap_is_directional() {
        let f = TextSimilarity::default();
        assert!(!f.is_symmetric());

        let short = json!("sea surface");
        let long = json!("Sea surface temperature, daily");
        assert_eq!(f.similarity("t", &short, &long).unwrap(), 1.0);
        assert_eq!(f.similarity("t", &long, &short).unwrap(), 0.5);
        assert_eq!(f.similarity("t", &long, &long).unwrap(), 1.0);
    }

    #[test]
    fn test_text_trigram_similarity() {
        let f = TextSimilarity { method: TextMethod::Trigram };
        assert!(f.is_symmetric());
        let sim = f.similarity("t", &json!("sea surface temp"), &json!("sea surface salinity")).unwrap();
        assert!(sim > 0.3 && sim < 1.0);
        assert_eq!(f.similarity("t", &json!("abc"), &json!("ABC")).unwrap(), 1.0);
        assert_eq!(f.similarity("t", &json!(""), &json!("")).unwrap(), 1.0);
    }

    #[test]
    fn test_ordinal_similarity() {
        let levels: Vec<String> = ["1", "2", "3", "4"].iter().map(|s| s.to_string()).collect();
        let f = OrdinalSimilarity::new(&levels);
        assert_eq!(f.similarity("o", &json!("2"), &json!(2)).unwrap(), 1.0);
        let sim = f.similarity("o", &json!("1"), &json!("4")).unwrap();
        assert_eq!(sim, 0.0);
        let sim = f.similarity("o", &json!("3"), &json!("4")).unwrap();
        assert!((sim - 2.0 / 3.0).abs() < 1e-12);
        assert!(f.similarity("o", &json!("5"), &json!("4")).is_err());
    }

    #[test]
    fn test_boolean_similarity() {
        let f = BooleanSimilarity;
        assert_eq!(f.similarity("b", &json!(true), &json!("TRUE")).unwrap(), 1.0);
        assert_eq!(f.similarity("b", &json!(true), &json!(false)).unwrap(), 0.0);
        assert!(f.similarity("b", &json!(1), &json!(true)).is_err());
    }

    #[test]
    fn test_trigram_generation() {
        let trigrams = generate_trigrams("hello");
        assert!(trigrams.contains("hel"));
        assert!(trigrams.contains("llo"));
        assert!(generate_trigrams("   ").is_empty());
    }
}
