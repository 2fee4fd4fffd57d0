//! Rigid-body poses and 4×4 homogeneous matrices.
//!
//! Matrices follow the OpenGL convention used by the AR session and the
//! renderer: **column-major** storage, right-handed camera space with the
//! camera looking down −Z, and column vectors (`p' = M · p`).  Element
//! `(row, col)` lives at index `col * 4 + row`, so a matrix's translation
//! occupies indices 12, 13 and 14.
//!
//! # Example
//!
//! ```rust
//! use anchorsight_perception::pose::{Mat4, Pose, Quaternion, Vec3};
//!
//! // An anchor 2 m in front of a camera sitting at the world origin.
//! let anchor = Pose::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity());
//! let model = anchor.to_matrix();
//!
//! let view = Mat4::identity();
//! let view_model = view.mul(&model);
//! assert!((view_model.translation().z + 2.0).abs() < 1e-6);
//! ```

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` around the +Y (up) axis.
    pub fn from_yaw(angle_rad: f32) -> Self {
        let half = angle_rad * 0.5;
        Self::new(half.cos(), 0.0, half.sin(), 0.0)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body pose: rotation followed by translation.
///
/// To move a point from the pose's local frame into world space, rotate it
/// by `rotation` then add `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Pose {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity pose (world origin, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two poses: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// The inverse pose (T_B_A for T_A_B).
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        let t = inv_rot.rotate(self.translation);
        Self::new(Vec3::new(-t.x, -t.y, -t.z), inv_rot)
    }

    /// Column-major homogeneous matrix for this pose.
    pub fn to_matrix(self) -> Mat4 {
        let Quaternion { w, x, y, z } = self.rotation;
        let t = self.translation;
        Mat4([
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y + w * z),
            2.0 * (x * z - w * y),
            0.0,
            2.0 * (x * y - w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z + w * x),
            0.0,
            2.0 * (x * z + w * y),
            2.0 * (y * z - w * x),
            1.0 - 2.0 * (x * x + y * y),
            0.0,
            t.x,
            t.y,
            t.z,
            1.0,
        ])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mat4
// ────────────────────────────────────────────────────────────────────────────

/// A 4×4 homogeneous transform stored column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    pub fn identity() -> Self {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        Self(m)
    }

    /// Uniform scale on X, Y and Z.
    pub fn scale(factor: f32) -> Self {
        let mut m = Self::identity();
        m.0[0] = factor;
        m.0[5] = factor;
        m.0[10] = factor;
        m
    }

    /// Element at `(row, col)`.
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }

    /// Matrix product `self × rhs`.
    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut sum = 0.0f32;
                for k in 0..4 {
                    sum += self.0[k * 4 + row] * rhs.0[col * 4 + k];
                }
                out[col * 4 + row] = sum;
            }
        }
        Mat4(out)
    }

    /// Transform a homogeneous column vector.
    pub fn mul_vec4(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for (row, slot) in out.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for (k, component) in v.iter().enumerate() {
                sum += self.0[k * 4 + row] * component;
            }
            *slot = sum;
        }
        out
    }

    /// The translation column.
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.0[12], self.0[13], self.0[14])
    }

    /// Standard OpenGL perspective projection.
    ///
    /// `fov_y_rad` is the vertical field of view; `aspect` is width / height.
    pub fn perspective(fov_y_rad: f32, aspect: f32, near: f32, far: f32) -> Self {
        let f = 1.0 / (fov_y_rad * 0.5).tan();
        let range = near - far;
        let mut m = [0.0f32; 16];
        m[0] = f / aspect;
        m[5] = f;
        m[10] = (far + near) / range;
        m[11] = -1.0;
        m[14] = 2.0 * far * near / range;
        Mat4(m)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Pose> for Mat4 {
    fn from(pose: Pose) -> Self {
        pose.to_matrix()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
