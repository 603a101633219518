use glam::{Mat4, Vec3};

use crate::world::DocumentCamera;

const NEAR: f32 = 1.0;
const FAR: f32 = 32768.0;
const MAX_PITCH: f32 = 89.0_f32 * std::f32::consts::PI / 180.0;

/// A free-flying, Z-up perspective camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Radians, positive looks up.
    pub pitch: f32,
    /// Radians, counter-clockwise from +X around +Z.
    pub yaw: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn new(fov: f32, aspect: f32) -> Camera {
        Camera {
            position: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            fov,
            aspect,
        }
    }

    pub fn from_document(camera: &DocumentCamera, fov: f32, aspect: f32) -> Camera {
        Camera {
            position: camera.position,
            pitch: camera.look.x.to_radians().clamp(-MAX_PITCH, MAX_PITCH),
            yaw: camera.look.y.to_radians(),
            fov,
            aspect,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vec3::new(cos_pitch * cos_yaw, cos_pitch * sin_yaw, sin_pitch)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Z).normalize_or_zero()
    }

    /// Moves along the camera's own axes: `x` right, `y` forward, `z` up.
    pub fn translate_local(&mut self, offset: Vec3) {
        self.position += self.right() * offset.x + self.forward() * offset.y + Vec3::Z * offset.z;
    }

    /// Turns by the given angles in radians. Pitch stops just short of
    /// straight up or down.
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        self.pitch = (self.pitch + pitch).clamp(-MAX_PITCH, MAX_PITCH);
        self.yaw = (self.yaw + yaw).rem_euclid(std::f32::consts::TAU);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Z)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect, NEAR, FAR)
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::IDENTITY
    }
}
