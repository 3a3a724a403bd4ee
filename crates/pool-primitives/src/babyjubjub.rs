//! babyjubjub twisted edwards curve over the bn254 scalar field
//!
//! `a*x^2 + y^2 = 1 + d*x^2*y^2` with a = 168700, d = 168696.
//! all keys live in the prime-order subgroup generated by [`BASE8`].

use ark_ff::{BigInteger, Field, MontFp, One, PrimeField, Zero};

use crate::error::{PrimitiveError, Result};
use crate::field::FieldElement;

pub const A: FieldElement = MontFp!("168700");
pub const D: FieldElement = MontFp!("168696");

/// generator of the prime-order subgroup
pub const BASE8: Point = Point {
    x: MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553"),
    y: MontFp!("16950150798460657717958625567821834550301663161624707787222815936182638968203"),
};

const ORDER: FieldElement =
    MontFp!("2736030358979909402780800718157159386076813972158567259200215660948447373041");

/// affine point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: FieldElement,
    pub y: FieldElement,
}

impl Point {
    pub const IDENTITY: Point = Point {
        x: MontFp!("0"),
        y: MontFp!("1"),
    };

    /// point from coordinates, rejecting anything off the curve
    pub fn new(x: FieldElement, y: FieldElement) -> Result<Self> {
        let point = Self { x, y };
        if point.is_on_curve() {
            Ok(point)
        } else {
            Err(PrimitiveError::PointNotOnCurve)
        }
    }

    /// point from coordinates without the curve check
    ///
    /// used for values read back from chain, where a bad point must surface
    /// later as a failed decryption rather than here.
    pub fn from_coordinates(x: FieldElement, y: FieldElement) -> Self {
        Self { x, y }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_on_curve(&self) -> bool {
        let x2 = self.x.square();
        let y2 = self.y.square();
        A * x2 + y2 == FieldElement::one() + D * x2 * y2
    }

    pub fn in_subgroup(&self) -> bool {
        self.is_on_curve() && self.mul_scalar(&ORDER).is_identity()
    }

    pub fn add(&self, other: &Point) -> Point {
        Projective::from(*self)
            .add(&Projective::from(*other))
            .to_affine()
    }

    /// scalar multiplication, most significant bit first
    pub fn mul_scalar(&self, scalar: &FieldElement) -> Point {
        let base = Projective::from(*self);
        let mut acc = Projective::IDENTITY;
        let mut started = false;
        for bit in scalar.into_bigint().to_bits_be() {
            if started {
                acc = acc.add(&acc);
            }
            if bit {
                acc = acc.add(&base);
                started = true;
            }
        }
        acc.to_affine()
    }

    pub fn coordinates(&self) -> [FieldElement; 2] {
        [self.x, self.y]
    }
}

/// public key for a scalar
pub fn public_key(scalar: &FieldElement) -> Point {
    BASE8.mul_scalar(scalar)
}

/// projective coordinates, the edwards addition law is complete so the same
/// formula doubles
#[derive(Clone, Copy, Debug)]
struct Projective {
    x: FieldElement,
    y: FieldElement,
    z: FieldElement,
}

impl Projective {
    const IDENTITY: Projective = Projective {
        x: MontFp!("0"),
        y: MontFp!("1"),
        z: MontFp!("1"),
    };

    // add-2008-bbjlp
    fn add(&self, other: &Projective) -> Projective {
        let a = self.z * other.z;
        let b = a.square();
        let c = self.x * other.x;
        let d = self.y * other.y;
        let e = D * c * d;
        let f = b - e;
        let g = b + e;
        let x3 = a * f * ((self.x + self.y) * (other.x + other.y) - c - d);
        let y3 = a * g * (d - A * c);
        let z3 = f * g;
        Projective { x: x3, y: y3, z: z3 }
    }

    fn to_affine(self) -> Point {
        // z only vanishes for inputs off the curve
        match self.z.inverse() {
            Some(inv) => Point {
                x: self.x * inv,
                y: self.y * inv,
            },
            None => Point {
                x: FieldElement::zero(),
                y: FieldElement::zero(),
            },
        }
    }
}

impl From<Point> for Projective {
    fn from(p: Point) -> Self {
        Projective {
            x: p.x,
            y: p.y,
            z: FieldElement::one(),
        }
    }
}
