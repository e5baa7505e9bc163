//! The eight square symmetries (dihedral group of order 8) used to match blocks.
//!
//! An isometry is a row flip followed by a counter-clockwise rotation by a
//! multiple of 90°. It only rearranges samples; values are never changed.

use std::fmt;

use imgref::{ImgRef, ImgVec};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rotation by a multiple of 90°, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation.
    R0,
    /// Quarter turn.
    R90,
    /// Half turn.
    R180,
    /// Three-quarter turn.
    R270,
}

impl Rotation {
    /// All rotations in enumeration order.
    pub const ALL: [Rotation; 4] = [Self::R0, Self::R90, Self::R180, Self::R270];

    /// Number of quarter turns.
    pub fn quarter_turns(self) -> u8 {
        match self {
            Self::R0 => 0,
            Self::R90 => 1,
            Self::R180 => 2,
            Self::R270 => 3,
        }
    }

    /// Rotation angle in degrees.
    pub fn degrees(self) -> u16 {
        u16::from(self.quarter_turns()) * 90
    }

    /// Rotation from a quarter-turn count (taken modulo 4).
    pub fn from_quarter_turns(turns: u8) -> Self {
        Self::ALL[usize::from(turns % 4)]
    }

    /// Rotation from an angle in degrees; only multiples of 90 are accepted.
    pub fn from_degrees(degrees: u16) -> Result<Self> {
        if degrees % 90 != 0 || degrees >= 360 {
            return Err(Error::InvalidArgument(format!("unsupported rotation {degrees}°")));
        }
        Ok(Self::from_quarter_turns((degrees / 90) as u8))
    }
}

/// One of the eight block symmetries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Isometry {
    /// Reverse row order before rotating.
    pub flip: bool,
    /// Rotation applied after the flip.
    pub rotation: Rotation,
}

impl Isometry {
    /// The identity transform.
    pub const IDENTITY: Isometry = Isometry {
        flip: false,
        rotation: Rotation::R0,
    };

    /// All isometries in enumeration order: no flip first, rotations inner.
    ///
    /// The position of each entry equals its [`code`](Self::code).
    pub const ALL: [Isometry; 8] = [
        Isometry { flip: false, rotation: Rotation::R0 },
        Isometry { flip: false, rotation: Rotation::R90 },
        Isometry { flip: false, rotation: Rotation::R180 },
        Isometry { flip: false, rotation: Rotation::R270 },
        Isometry { flip: true, rotation: Rotation::R0 },
        Isometry { flip: true, rotation: Rotation::R90 },
        Isometry { flip: true, rotation: Rotation::R180 },
        Isometry { flip: true, rotation: Rotation::R270 },
    ];

    /// Create an isometry.
    #[must_use]
    pub fn new(flip: bool, rotation: Rotation) -> Self {
        Self { flip, rotation }
    }

    /// Flip direction as the `±1` sign convention (`-1` = rows reversed).
    pub fn flip_sign(self) -> i8 {
        if self.flip { -1 } else { 1 }
    }

    /// Build from the `(flip ∈ {+1,-1}, rotation in degrees)` pair.
    pub fn from_sign_and_degrees(flip: i8, degrees: u16) -> Result<Self> {
        let flip = match flip {
            1 => false,
            -1 => true,
            other => {
                return Err(Error::InvalidArgument(format!("flip must be +1 or -1, got {other}")));
            }
        };
        Ok(Self::new(flip, Rotation::from_degrees(degrees)?))
    }

    /// 3-bit code: `flip << 2 | quarter_turns`.
    pub fn code(self) -> u8 {
        (u8::from(self.flip) << 2) | self.rotation.quarter_turns()
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| Error::InvalidArgument(format!("isometry code {code} out of range")))
    }

    /// The isometry equivalent to applying `self` and then `next`.
    #[must_use]
    pub fn then(self, next: Isometry) -> Isometry {
        // A reflection conjugates a rotation into its inverse.
        let (a, b) = (self.rotation.quarter_turns(), next.rotation.quarter_turns());
        let turns = if next.flip { b + 4 - a } else { a + b };
        Isometry::new(self.flip != next.flip, Rotation::from_quarter_turns(turns))
    }

    /// The isometry that undoes `self`.
    #[must_use]
    pub fn inverse(self) -> Isometry {
        if self.flip {
            self
        } else {
            Isometry::new(false, Rotation::from_quarter_turns(4 - self.rotation.quarter_turns()))
        }
    }

    /// Position in the input block that lands at `(row, col)` of the output.
    #[inline]
    fn source_of(self, n: usize, row: usize, col: usize) -> (usize, usize) {
        let last = n - 1;
        let (r, c) = match self.rotation {
            Rotation::R0 => (row, col),
            Rotation::R90 => (col, last - row),
            Rotation::R180 => (last - row, last - col),
            Rotation::R270 => (last - col, row),
        };
        if self.flip { (last - r, c) } else { (r, c) }
    }

    /// Rearrange a square block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the block is not square.
    pub fn apply(self, block: ImgRef<'_, f64>) -> Result<ImgVec<f64>> {
        if block.width() != block.height() {
            return Err(Error::DimensionMismatch {
                expected: (block.height(), block.height()),
                actual: (block.width(), block.height()),
            });
        }
        Ok(self.apply_square(block))
    }

    /// Unchecked core of [`apply`](Self::apply).
    pub(crate) fn apply_square(self, block: ImgRef<'_, f64>) -> ImgVec<f64> {
        let n = block.width();
        if self == Self::IDENTITY {
            return ImgVec::new(block.pixels().collect(), n, n);
        }
        let stride = block.stride();
        let buf = block.buf();
        let mut out = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                let (r, c) = self.source_of(n, row, col);
                out.push(buf[r * stride + c]);
            }
        }
        ImgVec::new(out, n, n)
    }
}

impl Default for Isometry {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Isometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flip {:+} rot {}°", self.flip_sign(), self.rotation.degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distinct_block(n: usize) -> ImgVec<f64> {
        ImgVec::new((0..n * n).map(|i| i as f64).collect(), n, n)
    }

    #[test]
    fn test_identity_and_flip() {
        let block = distinct_block(3);
        assert_eq!(Isometry::IDENTITY.apply(block.as_ref()).unwrap().buf(), block.buf());

        let flipped = Isometry::new(true, Rotation::R0).apply(block.as_ref()).unwrap();
        assert_eq!(flipped.buf(), &[6.0, 7.0, 8.0, 3.0, 4.0, 5.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_quarter_turn_is_counter_clockwise() {
        let block = distinct_block(2);
        // [0 1; 2 3] rotated a quarter turn counter-clockwise is [1 3; 0 2]
        let rotated = Isometry::new(false, Rotation::R90).apply(block.as_ref()).unwrap();
        assert_eq!(rotated.buf(), &[1.0, 3.0, 0.0, 2.0]);
    }

    #[test]
    fn test_flip_half_turn_is_involution() {
        let block = distinct_block(4);
        let iso = Isometry::from_sign_and_degrees(-1, 180).unwrap();
        let once = iso.apply(block.as_ref()).unwrap();
        let twice = iso.apply(once.as_ref()).unwrap();
        assert_eq!(twice.buf(), block.buf());
        assert_ne!(once.buf(), block.buf());
    }

    #[test]
    fn test_group_closure_matches_pixels() {
        let block = distinct_block(4);
        for a in Isometry::ALL {
            for b in Isometry::ALL {
                let sequential = b.apply(a.apply(block.as_ref()).unwrap().as_ref()).unwrap();
                let composed = a.then(b);
                assert!(Isometry::ALL.contains(&composed));
                assert_eq!(composed.apply(block.as_ref()).unwrap().buf(), sequential.buf(), "{a} then {b}");
            }
        }
    }

    #[test]
    fn test_all_distinct_and_invertible() {
        let block = distinct_block(4);
        let images: Vec<_> = Isometry::ALL
            .iter()
            .map(|iso| iso.apply(block.as_ref()).unwrap().into_buf())
            .collect();
        for i in 0..images.len() {
            for j in i + 1..images.len() {
                assert_ne!(images[i], images[j]);
            }
        }
        for iso in Isometry::ALL {
            assert_eq!(iso.then(iso.inverse()), Isometry::IDENTITY);
        }
    }

    #[test]
    fn test_preserves_value_multiset() {
        let block = ImgVec::new(vec![5.0, 1.0, 1.0, 9.0, 3.0, 3.0, 0.5, 7.0, 2.0], 3, 3);
        let mut expected = block.buf().clone();
        expected.sort_by(f64::total_cmp);
        for iso in Isometry::ALL {
            let mut values = iso.apply(block.as_ref()).unwrap().into_buf();
            values.sort_by(f64::total_cmp);
            assert_eq!(values, expected);
        }
    }

    #[test]
    fn test_code_round_trip_and_order() {
        for (i, iso) in Isometry::ALL.iter().enumerate() {
            assert_eq!(usize::from(iso.code()), i);
            assert_eq!(Isometry::from_code(iso.code()).unwrap(), *iso);
        }
        assert!(Isometry::from_code(8).is_err());
    }

    #[test]
    fn test_rejects_non_square() {
        let block = ImgVec::new(vec![0.0; 6], 3, 2);
        assert!(Isometry::IDENTITY.apply(block.as_ref()).is_err());
        assert!(Rotation::from_degrees(45).is_err());
        assert!(Isometry::from_sign_and_degrees(0, 90).is_err());
    }
}
