//! CPU velocity/pressure solver for the ether effect.
//!
//! A compact stable-fluids pass over a coarse grid: pointer forces splat in
//! with a radius-clamped falloff, optional viscous diffusion and a pressure
//! projection run as Jacobi sweeps, and semi-Lagrangian advection carries the
//! field forward. Velocities are in cells per second; the grid is a fraction
//! of the surface resolution, so the whole step stays cheap enough for the
//! UI thread.

/// Solver knobs, mirrored from the effect configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidParams {
    /// Enables the viscous diffusion pass.
    pub is_viscous: bool,
    /// Viscosity coefficient for the diffusion pass.
    pub viscous: f32,
    /// Jacobi sweeps for the diffusion pass.
    pub iterations_viscous: u32,
    /// Jacobi sweeps for the pressure projection.
    pub iterations_poisson: u32,
    /// Reflect velocities at the walls instead of damping them to zero.
    pub is_bounce: bool,
    /// Per-step velocity retention factor.
    pub dissipation: f32,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            is_viscous: false,
            viscous: 30.0,
            iterations_viscous: 32,
            iterations_poisson: 32,
            is_bounce: false,
            dissipation: 0.985,
        }
    }
}

/// Velocity field plus the scratch buffers the solver needs.
pub struct FluidField {
    width: usize,
    height: usize,
    vx: Vec<f32>,
    vy: Vec<f32>,
    scratch_x: Vec<f32>,
    scratch_y: Vec<f32>,
    pressure: Vec<f32>,
    divergence: Vec<f32>,
}

impl FluidField {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(4);
        let height = height.max(4);
        let cells = width * height;
        Self {
            width,
            height,
            vx: vec![0.0; cells],
            vy: vec![0.0; cells],
            scratch_x: vec![0.0; cells],
            scratch_y: vec![0.0; cells],
            pressure: vec![0.0; cells],
            divergence: vec![0.0; cells],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Reallocates the grid for a new surface size, dropping the old field.
    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    fn clamped(&self, x: isize, y: isize) -> usize {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.index(x, y)
    }

    pub fn velocity_at(&self, x: usize, y: usize) -> [f32; 2] {
        let index = self.clamped(x as isize, y as isize);
        [self.vx[index], self.vy[index]]
    }

    /// Adds an impulse around `center` (normalized `[0,1]²`, top-left origin)
    /// with a radius-clamped falloff: full weight at the center fading with
    /// `(1 - d/r)²` to zero at `radius_cells`. Nearby cells therefore pick up
    /// more of the motion than distant ones.
    pub fn splat(&mut self, center: [f32; 2], impulse: [f32; 2], radius_cells: f32) {
        let radius = radius_cells.max(0.5);
        let cx = center[0].clamp(0.0, 1.0) * (self.width - 1) as f32;
        let cy = center[1].clamp(0.0, 1.0) * (self.height - 1) as f32;

        let min_x = ((cx - radius).floor().max(0.0)) as usize;
        let max_x = ((cx + radius).ceil() as usize).min(self.width - 1);
        let min_y = ((cy - radius).floor().max(0.0)) as usize;
        let max_y = ((cy + radius).ceil() as usize).min(self.height - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let distance = (dx * dx + dy * dy).sqrt();
                let t = (distance / radius).min(1.0);
                let weight = (1.0 - t) * (1.0 - t);
                if weight > 0.0 {
                    let index = self.index(x, y);
                    self.vx[index] += impulse[0] * weight;
                    self.vy[index] += impulse[1] * weight;
                }
            }
        }
    }

    /// Advances the field by `dt` seconds: optional viscous diffusion,
    /// semi-Lagrangian advection with dissipation, then pressure projection.
    pub fn step(&mut self, dt: f32, params: &FluidParams) {
        if dt <= 0.0 {
            return;
        }
        if params.is_viscous && params.iterations_viscous > 0 {
            self.diffuse(dt, params);
        }
        self.advect(dt, params);
        self.project(params);
        self.apply_boundary(params);
    }

    fn diffuse(&mut self, dt: f32, params: &FluidParams) {
        let a = params.viscous * dt;
        let denom = 1.0 + 4.0 * a;
        self.scratch_x.copy_from_slice(&self.vx);
        self.scratch_y.copy_from_slice(&self.vy);

        for _ in 0..params.iterations_viscous {
            for y in 0..self.height as isize {
                for x in 0..self.width as isize {
                    let index = self.index(x as usize, y as usize);
                    let neighbours_x = self.vx[self.clamped(x - 1, y)]
                        + self.vx[self.clamped(x + 1, y)]
                        + self.vx[self.clamped(x, y - 1)]
                        + self.vx[self.clamped(x, y + 1)];
                    let neighbours_y = self.vy[self.clamped(x - 1, y)]
                        + self.vy[self.clamped(x + 1, y)]
                        + self.vy[self.clamped(x, y - 1)]
                        + self.vy[self.clamped(x, y + 1)];
                    self.scratch_x[index] = (self.vx[index] + a * neighbours_x) / denom;
                    self.scratch_y[index] = (self.vy[index] + a * neighbours_y) / denom;
                }
            }
            std::mem::swap(&mut self.vx, &mut self.scratch_x);
            std::mem::swap(&mut self.vy, &mut self.scratch_y);
        }
    }

    fn sample_bilinear(&self, field: &[f32], x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let top = field[self.index(x0, y0)] * (1.0 - fx) + field[self.index(x1, y0)] * fx;
        let bottom = field[self.index(x0, y1)] * (1.0 - fx) + field[self.index(x1, y1)] * fx;
        top * (1.0 - fy) + bottom * fy
    }

    fn advect(&mut self, dt: f32, params: &FluidParams) {
        for y in 0..self.height {
            for x in 0..self.width {
                let index = self.index(x, y);
                let back_x = x as f32 - self.vx[index] * dt;
                let back_y = y as f32 - self.vy[index] * dt;
                self.scratch_x[index] =
                    self.sample_bilinear(&self.vx, back_x, back_y) * params.dissipation;
                self.scratch_y[index] =
                    self.sample_bilinear(&self.vy, back_x, back_y) * params.dissipation;
            }
        }
        std::mem::swap(&mut self.vx, &mut self.scratch_x);
        std::mem::swap(&mut self.vy, &mut self.scratch_y);
    }

    fn project(&mut self, params: &FluidParams) {
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let index = self.index(x as usize, y as usize);
                self.divergence[index] = -0.5
                    * (self.vx[self.clamped(x + 1, y)] - self.vx[self.clamped(x - 1, y)]
                        + self.vy[self.clamped(x, y + 1)]
                        - self.vy[self.clamped(x, y - 1)]);
                self.pressure[index] = 0.0;
            }
        }

        for _ in 0..params.iterations_poisson.max(1) {
            for y in 0..self.height as isize {
                for x in 0..self.width as isize {
                    let index = self.index(x as usize, y as usize);
                    self.scratch_x[index] = (self.divergence[index]
                        + self.pressure[self.clamped(x - 1, y)]
                        + self.pressure[self.clamped(x + 1, y)]
                        + self.pressure[self.clamped(x, y - 1)]
                        + self.pressure[self.clamped(x, y + 1)])
                        / 4.0;
                }
            }
            std::mem::swap(&mut self.pressure, &mut self.scratch_x);
        }

        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let index = self.index(x as usize, y as usize);
                self.vx[index] -= 0.5
                    * (self.pressure[self.clamped(x + 1, y)]
                        - self.pressure[self.clamped(x - 1, y)]);
                self.vy[index] -= 0.5
                    * (self.pressure[self.clamped(x, y + 1)]
                        - self.pressure[self.clamped(x, y - 1)]);
            }
        }
    }

    fn apply_boundary(&mut self, params: &FluidParams) {
        let w = self.width;
        let h = self.height;
        for y in 0..h {
            let left = self.index(0, y);
            let right = self.index(w - 1, y);
            if params.is_bounce {
                self.vx[left] = -self.vx[self.index(1, y)];
                self.vx[right] = -self.vx[self.index(w - 2, y)];
            } else {
                self.vx[left] = 0.0;
                self.vy[left] = 0.0;
                self.vx[right] = 0.0;
                self.vy[right] = 0.0;
            }
        }
        for x in 0..w {
            let top = self.index(x, 0);
            let bottom = self.index(x, h - 1);
            if params.is_bounce {
                self.vy[top] = -self.vy[self.index(x, 1)];
                self.vy[bottom] = -self.vy[self.index(x, h - 2)];
            } else {
                self.vx[top] = 0.0;
                self.vy[top] = 0.0;
                self.vx[bottom] = 0.0;
                self.vy[bottom] = 0.0;
            }
        }
    }

    #[cfg(test)]
    fn divergence_magnitude(&self) -> f32 {
        let mut total = 0.0;
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let div = -0.5
                    * (self.vx[self.clamped(x + 1, y)] - self.vx[self.clamped(x - 1, y)]
                        + self.vy[self.clamped(x, y + 1)]
                        - self.vy[self.clamped(x, y - 1)]);
                total += div.abs();
            }
        }
        total
    }

    /// Total speed over the grid; a cheap activity probe.
    pub fn total_speed(&self) -> f32 {
        self.vx
            .iter()
            .zip(&self.vy)
            .map(|(vx, vy)| (vx * vx + vy * vy).sqrt())
            .sum()
    }

    /// Interleaved `(vx, vy)` texels for an `Rg32Float` upload.
    pub fn texels(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.vx.len() * 2);
        for (vx, vy) in self.vx.iter().zip(&self.vy) {
            out.push(*vx);
            out.push(*vy);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splat_weights_fall_off_with_distance() {
        let mut field = FluidField::new(64, 64);
        field.splat([0.5, 0.5], [10.0, 0.0], 12.0);

        let center = field.velocity_at(32, 32)[0].abs();
        let near = field.velocity_at(36, 32)[0].abs();
        let far = field.velocity_at(42, 32)[0].abs();
        assert!(center > near, "center {center} should exceed near {near}");
        assert!(near > far, "near {near} should exceed far {far}");
    }

    #[test]
    fn splat_is_radius_clamped() {
        let mut field = FluidField::new(64, 64);
        field.splat([0.5, 0.5], [10.0, 0.0], 6.0);
        assert_eq!(field.velocity_at(32 + 10, 32), [0.0, 0.0]);
    }

    #[test]
    fn projection_reduces_divergence() {
        let mut field = FluidField::new(48, 48);
        field.splat([0.3, 0.4], [25.0, -10.0], 8.0);
        let before = field.divergence_magnitude();
        field.project(&FluidParams::default());
        let after = field.divergence_magnitude();
        assert!(
            after < before * 0.75,
            "projection should cut divergence: {before} -> {after}"
        );
    }

    #[test]
    fn damped_walls_zero_edge_velocities() {
        let mut field = FluidField::new(32, 32);
        field.splat([0.0, 0.5], [40.0, 0.0], 6.0);
        field.step(1.0 / 60.0, &FluidParams::default());
        assert_eq!(field.velocity_at(0, 16), [0.0, 0.0]);
    }

    #[test]
    fn bouncing_walls_reflect_normal_component() {
        let mut field = FluidField::new(32, 32);
        let params = FluidParams {
            is_bounce: true,
            ..FluidParams::default()
        };
        field.splat([0.05, 0.5], [40.0, 0.0], 6.0);
        field.step(1.0 / 60.0, &params);
        let wall = field.velocity_at(0, 16)[0];
        let interior = field.velocity_at(1, 16)[0];
        assert!((wall + interior).abs() < 1e-4, "wall {wall} vs interior {interior}");
    }

    #[test]
    fn dissipation_decays_the_field() {
        let mut field = FluidField::new(32, 32);
        field.splat([0.5, 0.5], [15.0, 5.0], 8.0);
        let before = field.total_speed();
        for _ in 0..30 {
            field.step(1.0 / 60.0, &FluidParams::default());
        }
        let after = field.total_speed();
        assert!(after < before, "field should decay: {before} -> {after}");
    }

    #[test]
    fn step_is_deterministic() {
        let run = || {
            let mut field = FluidField::new(24, 24);
            field.splat([0.6, 0.3], [12.0, 7.0], 5.0);
            for _ in 0..5 {
                field.step(1.0 / 60.0, &FluidParams::default());
            }
            field.texels()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn texels_interleave_both_components() {
        let mut field = FluidField::new(8, 8);
        field.splat([0.5, 0.5], [3.0, -2.0], 4.0);
        let texels = field.texels();
        assert_eq!(texels.len(), 8 * 8 * 2);
        let center = field.velocity_at(4, 4);
        let base = (4 * 8 + 4) * 2;
        assert_eq!(texels[base], center[0]);
        assert_eq!(texels[base + 1], center[1]);
    }
}
