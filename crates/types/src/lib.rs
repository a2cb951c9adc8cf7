//! Validated domain primitives shared across the quoting workspace.
//!
//! These newtypes exist so that the core services never have to re-check
//! invariants that were already established at a boundary: an [`ExamCode`]
//! is always non-empty, and a [`CoveragePercent`] is always inside 0–100.

/// Errors that can occur when creating validated code types.
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// The input code was empty or contained only whitespace
    #[error("Exam code cannot be empty")]
    Empty,
}

/// A price-list exam code: a non-empty, trimmed identifier string.
///
/// Codes arrive from uploaded price files where the code column may be
/// numeric; numeric normalisation (dropping a spurious `.0` tail) happens
/// at the ingestion boundary, not here. This type only guarantees that a
/// code has at least one non-whitespace character.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExamCode(String);

impl ExamCode {
    /// Creates a new `ExamCode` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the
    /// trimmed result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, CodeError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CodeError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExamCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ExamCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for ExamCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ExamCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ExamCode::new(&s).map_err(serde::de::Error::custom)
    }
}

/// An insurer coverage percentage, always within `[0, 100]`.
///
/// Construction clamps rather than fails: operator input outside the range
/// is a local correction, not an error (spelled out in the quoting rules).
/// The complement ([`CoveragePercent::copay`]) is the patient's
/// out-of-pocket percentage.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CoveragePercent(f64);

impl CoveragePercent {
    /// Creates a coverage percentage, clamping the input into `[0, 100]`.
    ///
    /// Non-finite input clamps to 0.
    pub fn clamped(value: f64) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 100.0))
        } else {
            Self(0.0)
        }
    }

    /// The covered fraction of the insurer-resolved amount, as a percentage.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// The patient's co-payment percentage (`100 - coverage`).
    pub fn copay(&self) -> f64 {
        100.0 - self.0
    }
}

impl Default for CoveragePercent {
    /// The original system pre-fills the coverage field with 80%.
    fn default() -> Self {
        Self(80.0)
    }
}

impl std::fmt::Display for CoveragePercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
