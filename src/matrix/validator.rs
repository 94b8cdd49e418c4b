//! Sanity checks for candidate view matrices
//!
//! The same predicate runs during acquisition and on every refresh tick.

use super::RawMatrix;

/// Largest plausible absolute translation on any axis
pub const DEFAULT_WORLD_BOUND: f32 = 5000.0;

/// Minimum squared distance from the origin while a round is active
const MIN_ORIGIN_DISTANCE_SQ: f32 = 1.0;

/// Why a candidate matrix was rejected
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ValidationFailure {
    /// A header or translation element is NaN or infinite
    #[error("matrix contains a non-finite header or translation element")]
    NonFinite,

    /// All four header elements are zero
    #[error("matrix header is all zeros")]
    DegenerateHeader,

    /// Translation lies outside the world bound
    #[error("translation component {value} exceeds world bound {bound}")]
    OutOfWorld {
        /// Offending component
        value: f32,
        /// Bound it was checked against
        bound: f32,
    },

    /// Camera sits at the world origin while a round is active
    #[error("camera is at the world origin during an active round")]
    AtOrigin,
}

/// Validate a candidate matrix
///
/// `in_round` enables the origin check, which is only trustworthy once
/// the round has actually started.
pub fn validate(matrix: &RawMatrix, in_round: bool, world_bound: f32) -> Result<(), ValidationFailure> {
    let header = [matrix.at(1, 1), matrix.at(2, 2), matrix.at(3, 3), matrix.at(4, 4)];
    let translation = matrix.translation_row();

    if header.iter().any(|v| !v.is_finite()) || !translation.is_finite() {
        return Err(ValidationFailure::NonFinite);
    }

    if header.iter().all(|&v| v == 0.0) {
        return Err(ValidationFailure::DegenerateHeader);
    }

    if let Some(&value) = translation.to_array().iter().find(|v| v.abs() > world_bound) {
        return Err(ValidationFailure::OutOfWorld { value, bound: world_bound });
    }

    if in_round && translation.length_squared() < MIN_ORIGIN_DISTANCE_SQ {
        return Err(ValidationFailure::AtOrigin);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_world(x: f32, y: f32, z: f32) -> RawMatrix {
        RawMatrix::from_rows([
            [0.8, 0.1, 0.0, 0.0],
            [0.0, 1.2, 0.3, 0.0],
            [0.4, 0.0, 0.9, 1.0],
            [x, y, z, 1.0],
        ])
    }

    #[test]
    fn test_accepts_plausible_matrix() {
        assert_eq!(validate(&in_world(120.0, 4.0, -300.0), true, DEFAULT_WORLD_BOUND), Ok(()));
    }

    #[test]
    fn test_rejects_non_finite_header_and_translation() {
        let header_slots = [(1, 1), (2, 2), (3, 3), (4, 4)];
        let translation_slots = [(4, 1), (4, 2), (4, 3)];

        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            for &(r, c) in header_slots.iter().chain(translation_slots.iter()) {
                let mut matrix = in_world(10.0, 10.0, 10.0);
                matrix.m[(r - 1) * 4 + (c - 1)] = bad;
                assert_eq!(
                    validate(&matrix, false, DEFAULT_WORLD_BOUND),
                    Err(ValidationFailure::NonFinite),
                    "M{r}{c} = {bad}"
                );
            }
        }
    }

    #[test]
    fn test_non_finite_outside_checked_slots_is_ignored() {
        let mut matrix = in_world(10.0, 10.0, 10.0);
        matrix.m[1] = f32::NAN; // M12
        assert_eq!(validate(&matrix, false, DEFAULT_WORLD_BOUND), Ok(()));
    }

    #[test]
    fn test_rejects_zero_header_regardless_of_translation() {
        for translation in [(0.0, 0.0, 0.0), (50.0, 2.0, 80.0), (4999.0, 0.0, -4999.0)] {
            let mut matrix = in_world(translation.0, translation.1, translation.2);
            matrix.m[0] = 0.0;
            matrix.m[5] = 0.0;
            matrix.m[10] = 0.0;
            matrix.m[15] = 0.0;
            assert_eq!(
                validate(&matrix, false, DEFAULT_WORLD_BOUND),
                Err(ValidationFailure::DegenerateHeader)
            );
        }
    }

    #[test]
    fn test_rejects_out_of_world_on_any_axis() {
        for matrix in [
            in_world(5000.5, 0.0, 10.0),
            in_world(0.0, -7000.0, 10.0),
            in_world(10.0, 0.0, 1.0e6),
        ] {
            assert!(matches!(
                validate(&matrix, false, DEFAULT_WORLD_BOUND),
                Err(ValidationFailure::OutOfWorld { .. })
            ));
        }

        // The bound itself is still inside the world
        assert_eq!(validate(&in_world(5000.0, 0.0, 10.0), false, DEFAULT_WORLD_BOUND), Ok(()));
    }

    #[test]
    fn test_origin_check_only_in_round() {
        let matrix = in_world(0.3, 0.2, -0.5);

        assert_eq!(
            validate(&matrix, true, DEFAULT_WORLD_BOUND),
            Err(ValidationFailure::AtOrigin)
        );
        assert_eq!(validate(&matrix, false, DEFAULT_WORLD_BOUND), Ok(()));
    }

    #[test]
    fn test_custom_world_bound() {
        assert!(validate(&in_world(600.0, 0.0, 0.0), false, 500.0).is_err());
        assert!(validate(&in_world(600.0, 0.0, 0.0), false, 1000.0).is_ok());
    }
}
