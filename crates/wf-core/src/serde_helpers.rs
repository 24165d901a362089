//! Shared serde default functions.

/// Serde default for boolean flags that are on unless disabled.
pub fn default_true() -> bool {
    true
}
