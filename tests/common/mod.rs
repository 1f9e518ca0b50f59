//! Shared helpers for the integration test binaries.

/// Asserts that two `f32` slices are approximately equal.
#[track_caller]
pub fn assert_vec_relative_eq(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (a, e) in actual.iter().zip(expected.iter()) {
        approx::assert_relative_eq!(a, e, epsilon = 1e-4);
    }
}
