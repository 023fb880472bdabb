//! ODE integration for the compartmental models.
//!
//! The simulator only depends on the [`IntegratorCore`] contract: a core
//! proposes a step from `(y, t, dt)` and may shrink or grow `dt` within its
//! configured bounds. [`RkAdaptive`] is the default, an embedded
//! Runge-Kutta-Fehlberg 4(5) pair with per-component error control;
//! [`EulerCore`] exists for tests and debugging.

use crate::error::EpiError;
use crate::time_series::TimeSeries;
use nalgebra::DVector;

/// Right-hand side of an ODE system: writes `dy/dt` at `(t, y)` into `dydt`.
pub trait OdeRhs {
    fn rhs(&self, t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>);
}

impl<F> OdeRhs for F
where
    F: Fn(f64, &DVector<f64>, &mut DVector<f64>),
{
    fn rhs(&self, t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>) {
        self(t, y, dydt);
    }
}

/// A single-step integrator core. `step` advances `t` by the step size it
/// actually took and suggests the next step size in `dt`.
pub trait IntegratorCore {
    fn step(
        &self,
        f: &dyn OdeRhs,
        y: &DVector<f64>,
        t: &mut f64,
        dt: &mut f64,
        y_next: &mut DVector<f64>,
    ) -> Result<(), EpiError>;
}

/// Explicit Euler with a fixed step.
pub struct EulerCore;

impl IntegratorCore for EulerCore {
    fn step(
        &self,
        f: &dyn OdeRhs,
        y: &DVector<f64>,
        t: &mut f64,
        dt: &mut f64,
        y_next: &mut DVector<f64>,
    ) -> Result<(), EpiError> {
        let mut dydt = DVector::zeros(y.len());
        f.rhs(*t, y, &mut dydt);
        *y_next = y + &dydt * *dt;
        *t += *dt;
        Ok(())
    }
}

// Runge-Kutta-Fehlberg 4(5) Butcher tableau.
const RKF_C: [f64; 6] = [0.0, 0.25, 3.0 / 8.0, 12.0 / 13.0, 1.0, 0.5];
const RKF_A: [[f64; 5]; 5] = [
    [0.25, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0],
    [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0],
    [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0],
    [
        -8.0 / 27.0,
        2.0,
        -3544.0 / 2565.0,
        1859.0 / 4104.0,
        -11.0 / 40.0,
    ],
];
const RKF_B5: [f64; 6] = [
    16.0 / 135.0,
    0.0,
    6656.0 / 12825.0,
    28561.0 / 56430.0,
    -9.0 / 50.0,
    2.0 / 55.0,
];
const RKF_B4: [f64; 6] = [
    25.0 / 216.0,
    0.0,
    1408.0 / 2565.0,
    2197.0 / 4104.0,
    -1.0 / 5.0,
    0.0,
];

/// Adaptive embedded Runge-Kutta-Fehlberg 4(5).
pub struct RkAdaptive {
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub dt_min: f64,
    pub dt_max: f64,
}

impl Default for RkAdaptive {
    fn default() -> Self {
        RkAdaptive {
            abs_tol: 1e-10,
            rel_tol: 1e-5,
            dt_min: 1e-6,
            dt_max: 1.0,
        }
    }
}

impl IntegratorCore for RkAdaptive {
    fn step(
        &self,
        f: &dyn OdeRhs,
        y: &DVector<f64>,
        t: &mut f64,
        dt: &mut f64,
        y_next: &mut DVector<f64>,
    ) -> Result<(), EpiError> {
        let n = y.len();
        let mut k = vec![DVector::zeros(n); 6];
        // The requested step caps the attempt so the caller can land exactly
        // on interval boundaries; dt_min only bounds rejection shrinking.
        let mut h = dt.min(self.dt_max);

        loop {
            f.rhs(*t, y, &mut k[0]);
            for stage in 1..6 {
                let mut y_stage = y.clone();
                for (j, kj) in k.iter().enumerate().take(stage) {
                    let a = RKF_A[stage - 1][j];
                    if a != 0.0 {
                        y_stage += kj * (a * h);
                    }
                }
                let mut ks = DVector::zeros(n);
                f.rhs(*t + RKF_C[stage] * h, &y_stage, &mut ks);
                k[stage] = ks;
            }

            let mut y5 = y.clone();
            let mut y4 = y.clone();
            for (j, kj) in k.iter().enumerate() {
                y5 += kj * (RKF_B5[j] * h);
                y4 += kj * (RKF_B4[j] * h);
            }

            // Per-component error against mixed absolute/relative tolerance.
            let mut err_ratio: f64 = 0.0;
            for i in 0..n {
                let scale = self.abs_tol + self.rel_tol * y[i].abs().max(y5[i].abs());
                err_ratio = err_ratio.max((y5[i] - y4[i]).abs() / scale);
            }

            if err_ratio <= 1.0 || h <= self.dt_min {
                if err_ratio > 1.0 {
                    return Err(EpiError::IntegratorError(format!(
                        "minimal step size {h} cannot meet the error tolerance at t = {t}"
                    )));
                }
                *y_next = y5;
                *t += h;
                // Step size suggestion for the next step.
                let growth = if err_ratio > 0.0 {
                    0.9 * err_ratio.powf(-0.2)
                } else {
                    5.0
                };
                *dt = (h * growth.clamp(0.2, 5.0)).clamp(self.dt_min, self.dt_max);
                return Ok(());
            }

            // Reject and retry with a smaller step.
            let shrink = 0.9 * err_ratio.powf(-0.2);
            h = (h * shrink.clamp(0.1, 0.9)).max(self.dt_min);
        }
    }
}

/// Integrates `f` from `t0` to `tmax` and collects the dense output. The
/// final time point lands exactly on `tmax`.
pub fn integrate(
    f: &dyn OdeRhs,
    y0: DVector<f64>,
    t0: f64,
    tmax: f64,
    dt0: f64,
    core: &dyn IntegratorCore,
) -> Result<TimeSeries, EpiError> {
    if !(tmax > t0) {
        return Err(EpiError::InvalidValue(format!(
            "integration end {tmax} must be after start {t0}"
        )));
    }
    let mut result = TimeSeries::new(y0.len());
    result.add_time_point(t0, y0.clone())?;

    let mut t = t0;
    let mut dt = dt0;
    let mut y = y0;
    let mut y_next = DVector::zeros(y.len());
    while t < tmax {
        let remaining = tmax - t;
        let mut step_dt = dt.min(remaining);
        core.step(f, &y, &mut t, &mut step_dt, &mut y_next)?;
        if step_dt < remaining {
            dt = step_dt;
        }
        std::mem::swap(&mut y, &mut y_next);
        result.add_time_point(t, y.clone())?;
    }
    Ok(result)
}
