//! Pure shape predicates over the fixed-4-dim `ne`/`nb` arrays.
//!
//! Ported from the spec's §4.2 contract. Grounded on the teacher's
//! `tensor/layout.rs` contiguous-stride check, reworked from a dynamic
//! `Box<[usize]>` layout to the spec's fixed-rank `[usize; MAX_DIMS]`
//! representation (unused trailing dims are `1`, never elided).

use super::MAX_DIMS;

/// `true` if every dimension is `1`.
#[must_use]
pub fn is_scalar(ne: &[usize; MAX_DIMS]) -> bool {
    ne.iter().all(|&d| d == 1)
}

/// `true` if at most dimension 0 is non-unit.
#[must_use]
pub fn is_vector(ne: &[usize; MAX_DIMS]) -> bool {
    ne[1..].iter().all(|&d| d == 1)
}

/// `true` if at most dimensions 0 and 1 are non-unit.
#[must_use]
pub fn is_matrix(ne: &[usize; MAX_DIMS]) -> bool {
    ne[2..].iter().all(|&d| d == 1)
}

/// `true` if `nb[0] == elem_size` and `nb[i] == nb[i-1] * ne[i-1]` for all `i`.
#[must_use]
pub fn is_contiguous(ne: &[usize; MAX_DIMS], nb: &[usize; MAX_DIMS], elem_size: usize) -> bool {
    if nb[0] != elem_size {
        return false;
    }
    (1..MAX_DIMS).all(|i| nb[i] == nb[i - 1] * ne[i - 1])
}

/// `true` if contiguous except possibly along dimension 1 (row padding).
#[must_use]
pub fn is_padded_1d(ne: &[usize; MAX_DIMS], nb: &[usize; MAX_DIMS], elem_size: usize) -> bool {
    nb[0] == elem_size && nb[3] == nb[2] * ne[2] && nb[2] == nb[1] * ne[1]
}

/// `true` if the two shapes are element-wise equal.
#[must_use]
pub fn same_shape(a: &[usize; MAX_DIMS], b: &[usize; MAX_DIMS]) -> bool {
    a == b
}

/// `true` if `a` and `b` can be used as the two operands of `MUL_MAT`:
/// shared inner dimension and matching batch dims.
#[must_use]
pub fn can_mul_mat(a: &[usize; MAX_DIMS], b: &[usize; MAX_DIMS]) -> bool {
    a[0] == b[0] && a[2] == b[2] && a[3] == b[3]
}

/// `true` if `src` can be tiled (repeated) to cover `dst`: every dimension
/// of `dst` must be an integer multiple of the corresponding `src` dimension.
#[must_use]
pub fn can_repeat(src: &[usize; MAX_DIMS], dst: &[usize; MAX_DIMS]) -> bool {
    (0..MAX_DIMS).all(|i| src[i] != 0 && dst[i] % src[i] == 0)
}

/// Row-major (C-contiguous) strides for a given shape and element size.
#[must_use]
pub fn contiguous_strides(ne: &[usize; MAX_DIMS], elem_size: usize) -> [usize; MAX_DIMS] {
    let mut nb = [0usize; MAX_DIMS];
    nb[0] = elem_size;
    for i in 1..MAX_DIMS {
        nb[i] = nb[i - 1] * ne[i - 1];
    }
    nb
}

/// Total element count (product of all four dims; `1` for a scalar).
#[must_use]
pub fn numel(ne: &[usize; MAX_DIMS]) -> usize {
    ne.iter().product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_vector_matrix() {
        assert!(is_scalar(&[1, 1, 1, 1]));
        assert!(!is_scalar(&[2, 1, 1, 1]));

        assert!(is_vector(&[4, 1, 1, 1]));
        assert!(!is_vector(&[4, 2, 1, 1]));

        assert!(is_matrix(&[4, 3, 1, 1]));
        assert!(!is_matrix(&[4, 3, 2, 1]));
    }

    #[test]
    fn contiguous_strides_are_row_major() {
        let ne = [2, 3, 1, 1];
        let nb = contiguous_strides(&ne, 4);
        assert_eq!(nb, [4, 8, 24, 24]);
        assert!(is_contiguous(&ne, &nb, 4));
    }

    #[test]
    fn permute_breaks_contiguity() {
        let ne = [3, 2, 1, 1];
        let nb = [8, 4, 24, 24]; // dims 0/1 swapped strides
        assert!(!is_contiguous(&ne, &nb, 4));
    }

    #[test]
    fn padded_1d_allows_row_padding() {
        let ne = [4, 3, 1, 1];
        let nb = [4, 20, 60, 60]; // row stride padded beyond 4*4=16
        assert!(is_padded_1d(&ne, &nb, 4));
        assert!(!is_contiguous(&ne, &nb, 4));
    }

    #[test]
    fn mul_mat_and_repeat_checks() {
        assert!(can_mul_mat(&[3, 2, 1, 1], &[3, 4, 1, 1]));
        assert!(!can_mul_mat(&[3, 2, 1, 1], &[4, 4, 1, 1]));

        assert!(can_repeat(&[1, 3, 1, 1], &[4, 3, 1, 1]));
        assert!(can_repeat(&[2, 3, 1, 1], &[4, 3, 1, 1]));
        assert!(!can_repeat(&[3, 3, 1, 1], &[4, 3, 1, 1]));
    }

    #[test]
    fn numel_counts_all_four_dims() {
        assert_eq!(numel(&[1, 1, 1, 1]), 1);
        assert_eq!(numel(&[2, 3, 4, 1]), 24);
    }
}
