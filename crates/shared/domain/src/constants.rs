//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Validation
// =============================================================================

/// Minimum login length requirement (in bytes)
pub const MIN_LOGIN_LENGTH: usize = 1;

/// Maximum login length accepted for storage (in bytes)
pub const MAX_LOGIN_LENGTH: usize = 255;
