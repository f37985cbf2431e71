//! Poiseuille convergence sweep.
//!
//! Each case runs a quiet channel simulation at one viscosity for a fixed
//! number of steps and records `max(u_flow) / maxv` over fluid nodes after
//! the last step. Cases are independent engines and run in parallel.

use std::cell::Cell;
use std::rc::Rc;

use rayon::prelude::*;
use tracing::debug;

use crate::config::Configuration;
use crate::error::{Error, Result, ShapeMismatch};
use crate::fields::Fields;
use crate::geometry::Geometry;
use crate::hooks::{Action, Flow};
use crate::lbm::Sim;
use crate::FloatNum;

/// Maximum flow-axis velocity over fluid nodes relative to `geo.maxv()`.
pub fn max_velocity_ratio(
    geo: &Geometry,
    fields: &Fields,
) -> std::result::Result<FloatNum, ShapeMismatch> {
    let masked = geo.mask_array_by_fluid(fields.velocity(geo.flow_axis()))?;
    let max = masked.iter().copied().fold(FloatNum::NEG_INFINITY, FloatNum::max);
    Ok(max / geo.maxv())
}

/// `num` points spaced evenly on a log scale from `10^start` to `10^stop`.
pub fn logspace(start: FloatNum, stop: FloatNum, num: usize) -> Vec<FloatNum> {
    match num {
        0 => Vec::new(),
        1 => vec![(10 as FloatNum).powf(start)],
        _ => {
            let step = (stop - start) / (num - 1) as FloatNum;
            (0..num)
                .map(|i| (10 as FloatNum).powf(start + step * i as FloatNum))
                .collect()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SweepPoint {
    pub visc: FloatNum,
    pub ratio: FloatNum,
}

impl SweepPoint {
    /// Distance of the diagnostic from its asymptotic value 1.
    pub fn deviation(&self) -> FloatNum {
        (1. - self.ratio).abs()
    }
}

#[derive(Clone, Debug)]
pub struct PoiseuilleSweep {
    pub max_iters: u64,
    pub viscosities: Vec<FloatNum>,
    /// Extra flags passed to every case, e.g. lattice size.
    pub args: Vec<String>,
}

impl PoiseuilleSweep {
    pub const MAX_ITERS: u64 = 50_000;

    pub fn new(max_iters: u64) -> Self {
        PoiseuilleSweep {
            max_iters,
            viscosities: logspace(-3., -1., 10),
            args: Vec::new(),
        }
    }

    pub fn with_viscosities(mut self, viscosities: Vec<FloatNum>) -> Self {
        self.viscosities = viscosities;
        self
    }

    pub fn with_args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn case_args(&self, visc: FloatNum) -> Vec<String> {
        let mut args = vec![
            "--test".to_owned(),
            format!("--visc={}", visc),
            "--quiet".to_owned(),
            format!("--max-iters={}", self.max_iters),
        ];
        args.extend(self.args.iter().cloned());
        args
    }

    /// Runs one case and returns its convergence diagnostic.
    pub fn run_case(&self, visc: FloatNum) -> Result<FloatNum> {
        let config = Configuration::build(self.case_args(visc))?;
        let mut sim = Sim::build(config)?;
        sim.clear_hooks();

        let last = self.max_iters.checked_sub(1).ok_or(Error::InvalidHookIndex {
            index: 0,
            reason: "sweep needs at least one iteration",
        })?;
        let result = Rc::new(Cell::new(None));
        let slot = result.clone();
        sim.add_hook(
            last,
            Action::named("save_output", move |scope| {
                slot.set(Some(max_velocity_ratio(scope.geo(), scope.fields())?));
                Ok(Flow::Continue)
            }),
        )?;
        sim.run(None)?;

        let ratio = result
            .get()
            .ok_or_else(|| Error::MissingDiagnostic(format!("visc={}", visc)))?;
        debug!(visc, ratio, "sweep case finished");
        Ok(ratio)
    }

    /// Runs every case, in parallel, preserving viscosity order.
    pub fn run(&self) -> Result<Vec<SweepPoint>> {
        self.viscosities
            .par_iter()
            .map(|&visc| self.run_case(visc).map(|ratio| SweepPoint { visc, ratio }))
            .collect()
    }
}

/// True if, ordered by increasing viscosity, no deviation exceeds the
/// previous one by more than `tolerance`.
pub fn deviation_is_monotone(points: &[SweepPoint], tolerance: FloatNum) -> bool {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.visc.total_cmp(&b.visc));
    sorted
        .windows(2)
        .all(|w| w[1].deviation() <= w[0].deviation() + tolerance)
}
