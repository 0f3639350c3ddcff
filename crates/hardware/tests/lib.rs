//! Integration tests exercising pipeline-wide invariants across multiple
//! cycles, rather than a single module in isolation (spec §8 "testable
//! properties").

/// Cross-cycle structural properties: retirement order, tag monotonicity,
/// and physical-register conservation.
mod properties;
