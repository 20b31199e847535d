use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

///Represents a vector in 2D space.
/// Serialized as a two element `[x, y]` list, which is the shape every document on
/// the wire and on disk uses for positions, velocities and forces.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is east.
    pub x: f64,
    ///Value along the y-axis.
    /// Positive direction is north.
    pub y: f64,
}

impl From<[f64; 2]> for Vector2 {
    fn from([x, y]: [f64; 2]) -> Self {
        Vector2 { x, y }
    }
}

impl From<Vector2> for [f64; 2] {
    fn from(v: Vector2) -> Self {
        [v.x, v.y]
    }
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f64) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the z component of the 3D cross product.
    /// Anticlockwise torque of `force` applied at `self` about the origin is positive.
    pub fn cross(&self, other: &Vector2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn distance(&self, other: &Vector2) -> f64 {
        (*self - *other).magnitude()
    }

    ///Returns the direction of the vector in degrees anticlockwise from east, in (-180, 180].
    pub fn angle_degrees(&self) -> f64 {
        self.y.atan2(self.x).to_degrees()
    }

    ///Returns the vector rotated anticlockwise by `degrees`.
    pub fn rotated_degrees(&self, degrees: f64) -> Vector2 {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Vector2 {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector2 {
    type Output = Vector2;
    fn add(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, other: Vector2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2 {
    type Output = Vector2;
    fn sub(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x - other.x, self.y - other.y)
    }
}

impl SubAssign for Vector2 {
    fn sub_assign(&mut self, other: Vector2) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Neg for Vector2 {
    type Output = Vector2;
    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;
    fn mul(self, scalar: f64) -> Vector2 {
        self.scale(scalar)
    }
}

impl Div<f64> for Vector2 {
    type Output = Vector2;
    fn div(self, scalar: f64) -> Vector2 {
        Vector2::new(self.x / scalar, self.y / scalar)
    }
}

/// Wraps an angle in degrees into [0, 360).
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `a` to `b` in degrees, in [-180, 180).
pub fn angle_diff(a: f64, b: f64) -> f64 {
    (b - a + 180.0).rem_euclid(360.0) - 180.0
}

/// Whether `x` lies strictly inside the anticlockwise arc that starts at `a` and ends at `b`.
pub fn is_angle_between(x: f64, a: f64, b: f64) -> bool {
    let offset = (x - a).rem_euclid(360.0);
    0.0 < offset && offset < (b - a).rem_euclid(360.0)
}

/// Sign with zero counted as positive.
pub fn sign(value: f64) -> f64 {
    if value >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Position, heading and velocity of a body, used to move vectors between the
/// global frame and the body's local frame.
///
/// In the local frame +Y points along the heading, so a heading of 90 degrees makes
/// the local and global axes coincide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyFrame {
    pub pos: Vector2,
    pub angle: f64,
    pub velocity: Vector2,
}

impl BodyFrame {
    pub fn to_global(&self, v: Vector2) -> Vector2 {
        v.rotated_degrees(normalize_angle(self.angle - 90.0))
    }

    pub fn to_local(&self, v: Vector2) -> Vector2 {
        v.rotated_degrees(normalize_angle(-(self.angle - 90.0)))
    }

    pub fn pos_to_global(&self, p: Vector2) -> Vector2 {
        self.to_global(p) + self.pos
    }

    pub fn pos_to_local(&self, p: Vector2) -> Vector2 {
        self.to_local(p - self.pos)
    }

    /// Velocity of `v` as seen by an observer riding the body (apparent flow).
    pub fn velocity_to_local(&self, v: Vector2) -> Vector2 {
        self.to_local(v - self.velocity)
    }
}
