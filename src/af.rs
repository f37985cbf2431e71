//! ArrayFire kernel for the `single_fluid` template.
//!
//! Populations live on the device as a `(nodes, 9)` array. Streaming and
//! half-way bounce-back are one gather through an index built on the host
//! from the node map; the two-relaxation-time collision is done with
//! batched array arithmetic.

use arrayfire::*;
use tracing::info;

use crate::context::{Context, KernelTemplate};
use crate::distribution::D2Q9;
use crate::error::{KernelError, Result};
use crate::fields::Fields;
use crate::geometry::{population_bytes, Geometry, NodeType};
use crate::grid::StructuredRectangular;
use crate::traits::{Codegen, Distribution, Kernel};
use crate::FloatNum;

const BACKEND: &str = "arrayfire";

#[derive(Copy, Clone, Debug, Default)]
pub struct ArrayFireCodegen;

impl Codegen for ArrayFireCodegen {
    fn materialize(&self, template: KernelTemplate, ctx: &Context) -> Result<Box<dyn Kernel>> {
        match template {
            KernelTemplate::SingleFluid => Ok(Box::new(AfKernel::from_context(ctx)?)),
        }
    }
}

/// Device-side state, uploaded by `init`.
struct Device {
    f: Array<FloatNum>,
    nb_index: Array<u32>,
    fluid: Array<FloatNum>,
    solid: Array<FloatNum>,
}

pub struct AfKernel {
    grid: StructuredRectangular,
    periodic: [bool; 2],
    tau: FloatNum,
    tau_minus: FloatNum,
    accel: [FloatNum; 2],
    opp: Array<u32>,
    ex: Array<FloatNum>,
    ey: Array<FloatNum>,
    w: Array<FloatNum>,
    device: Option<Device>,
}

impl AfKernel {
    pub fn from_context(ctx: &Context) -> Result<AfKernel> {
        let unsupported = |symbol: &str, found: &str| KernelError::Backend {
            backend: BACKEND,
            reason: format!("unsupported {} `{}`", symbol, found),
        };
        let grid = ctx.text("grid")?;
        if grid != "D2Q9" {
            return Err(unsupported("grid", grid).into());
        }
        let tau = ctx.float("tau")?;
        let tau_minus = match ctx.text("model")? {
            "trt" => 0.5 + ctx.float("magic")? / (tau - 0.5),
            "bgk" => tau,
            other => return Err(unsupported("model", other).into()),
        };
        let lid = [ctx.float("lid_vx")?, ctx.float("lid_vy")?];
        if lid != [0., 0.] {
            return Err(KernelError::Backend {
                backend: BACKEND,
                reason: "moving walls are not supported".to_owned(),
            }
            .into());
        }

        set_device(0);
        info!("arrayfire backend: {:?}", get_active_backend());

        let nx = ctx.int("lat_nx")?.max(0) as usize;
        let ny = ctx.int("lat_ny")?.max(0) as usize;
        if population_bytes(nx, ny, D2Q9::size()).is_none() {
            return Err(KernelError::Backend {
                backend: BACKEND,
                reason: format!("{}x{} lattice does not fit in memory", nx, ny),
            }
            .into());
        }
        let opp: Vec<u32> = (0..D2Q9::size()).map(|i| D2Q9::opposite(i) as u32).collect();
        let ex: Vec<FloatNum> = D2Q9::ex().iter().map(|&e| e as FloatNum).collect();
        let ey: Vec<FloatNum> = D2Q9::ey().iter().map(|&e| e as FloatNum).collect();
        Ok(AfKernel {
            grid: StructuredRectangular::new(nx, ny),
            periodic: [ctx.flag("periodic_x")?, ctx.flag("periodic_y")?],
            tau,
            tau_minus,
            accel: [ctx.float("accel_x")?, ctx.float("accel_y")?],
            opp: Array::new(&opp, dim4!(9)),
            ex: Array::new(&ex, dim4!(1, 9)),
            ey: Array::new(&ey, dim4!(1, 9)),
            w: Array::new(D2Q9::weights(), dim4!(1, 9)),
            device: None,
        })
    }

    fn total(&self) -> u64 {
        self.grid.size() as u64
    }

    /// Pull-scheme gather index: entry `i * n + node` names the flat
    /// position the population `i` of `node` is read from.
    fn gather_index(&self, mask: &[NodeType]) -> Vec<u32> {
        let n = self.grid.size();
        let mut index = vec![0u32; n * D2Q9::size()];
        for y in 0..self.grid.y {
            for x in 0..self.grid.x {
                let node = self.grid.index(x, y);
                for i in 0..D2Q9::size() {
                    let own = i * n + node;
                    if mask[node] != NodeType::Fluid {
                        index[own] = own as u32;
                        continue;
                    }
                    let src = self
                        .grid
                        .neighbor(x, y, -D2Q9::ex()[i], -D2Q9::ey()[i], self.periodic)
                        .map(|(sx, sy)| self.grid.index(sx, sy))
                        .filter(|&s| mask[s] == NodeType::Fluid);
                    index[own] = match src {
                        Some(s) => (i * n + s) as u32,
                        None => (D2Q9::opposite(i) * n + node) as u32,
                    };
                }
            }
        }
        index
    }

    fn equilibrium(
        &self,
        rho: &Array<FloatNum>,
        ux: &Array<FloatNum>,
        uy: &Array<FloatNum>,
    ) -> Array<FloatNum> {
        let eu = add(&mul(ux, &self.ex, true), &mul(uy, &self.ey, true), false);
        let u_sq = tile(&(ux * ux + uy * uy), dim4!(1, 9));
        let rw = mul(rho, &self.w, true);
        rw * ((1.0 as FloatNum) + (3.0 as FloatNum) * &eu + (4.5 as FloatNum) * &(&eu * &eu)
            - (1.5 as FloatNum) * &u_sq)
    }

    fn host(a: &Array<FloatNum>) -> Vec<FloatNum> {
        let mut buf = vec![0.; a.elements()];
        a.host(&mut buf);
        buf
    }
}

impl Kernel for AfKernel {
    fn name(&self) -> &'static str {
        KernelTemplate::SingleFluid.name()
    }

    fn init(&mut self, geo: &Geometry, fields: &Fields) -> std::result::Result<(), KernelError> {
        if geo.grid() != self.grid || fields.shape() != self.grid.shape() {
            return Err(KernelError::Layout {
                expected: self.grid.shape(),
                found: fields.shape(),
            });
        }
        let mask: Vec<NodeType> = geo.mask().iter().copied().collect();
        if mask.contains(&NodeType::Velocity) {
            return Err(KernelError::Backend {
                backend: BACKEND,
                reason: "moving walls are not supported".to_owned(),
            });
        }

        let n = self.total();
        let fluid: Vec<FloatNum> = mask
            .iter()
            .map(|&m| if m == NodeType::Fluid { 1. } else { 0. })
            .collect();
        let fluid = Array::new(&fluid, dim4!(n));
        let solid = (1.0 as FloatNum) - &fluid;

        let rho: Vec<FloatNum> = fields.density.iter().copied().collect();
        let ux: Vec<FloatNum> = fields.ux.iter().copied().collect();
        let uy: Vec<FloatNum> = fields.uy.iter().copied().collect();
        let f = self.equilibrium(
            &Array::new(&rho, dim4!(n)),
            &Array::new(&ux, dim4!(n)),
            &Array::new(&uy, dim4!(n)),
        );
        let f = mul(&f, &fluid, true);

        let index = self.gather_index(&mask);
        self.device = Some(Device {
            f: flat(&f),
            nb_index: Array::new(&index, dim4!(index.len() as u64)),
            fluid,
            solid,
        });
        sync(get_device());
        Ok(())
    }

    fn step(&mut self, iteration: u64, fields: &mut Fields) -> std::result::Result<(), KernelError> {
        if fields.shape() != self.grid.shape() {
            return Err(KernelError::Layout {
                expected: self.grid.shape(),
                found: fields.shape(),
            });
        }
        let dev = self.device.as_ref().ok_or(KernelError::NotInitialized)?;
        let n = self.total();

        // Streaming with bounce-back, by reading from the pre-built index.
        let f_streamed = moddims(&lookup(&dev.f, &dev.nb_index, 0), dim4!(n, 9));

        let rho = sum(&f_streamed, 1);
        let rho_safe = &rho + &dev.solid;
        // Force-corrected velocity, used by the equilibrium and reported.
        let ux = &(sum(&mul(&f_streamed, &self.ex, true), 1) / &rho_safe) + 0.5 * self.accel[0];
        let uy = &(sum(&mul(&f_streamed, &self.ey, true), 1) / &rho_safe) + 0.5 * self.accel[1];

        // Two-relaxation-time collision on the parts symmetric and
        // antisymmetric under direction reversal.
        let feq = self.equilibrium(&rho, &ux, &uy);
        let f_opp = lookup(&f_streamed, &self.opp, 1);
        let feq_opp = lookup(&feq, &self.opp, 1);
        let (wp, wm) = (1. / self.tau, 1. / self.tau_minus);
        let neq_sym = 0.5 * &(&(&f_streamed + &f_opp) - &(&feq + &feq_opp));
        let neq_asym = 0.5 * &(&(&f_streamed - &f_opp) - &(&feq - &feq_opp));
        let ea = &(&self.ex * self.accel[0]) + &(&self.ey * self.accel[1]);
        let source = mul(&rho, &mul(&ea, &self.w, false), true)
            * ((1. - 0.5 * wm) / D2Q9::c_squ());
        let f = &(&(&f_streamed - &(wp * &neq_sym)) - &(wm * &neq_asym)) + &source;
        let f = mul(&f, &dev.fluid, true);

        let rho_h = Self::host(&rho);
        let mass = sum_all(&f).0;
        if !mass.is_finite() {
            let node = rho_h
                .iter()
                .position(|r| !r.is_finite())
                .unwrap_or_default();
            return Err(KernelError::NonFinite {
                iteration,
                quantity: "density",
                x: node % self.grid.x.max(1),
                y: node / self.grid.x.max(1),
            });
        }

        let ux_h = Self::host(&mul(&ux, &dev.fluid, false));
        let uy_h = Self::host(&mul(&uy, &dev.fluid, false));
        for (dst, &v) in fields.density.iter_mut().zip(&rho_h) {
            *dst = v;
        }
        for (dst, &v) in fields.ux.iter_mut().zip(&ux_h) {
            *dst = v;
        }
        for (dst, &v) in fields.uy.iter_mut().zip(&uy_h) {
            *dst = v;
        }

        if let Some(dev) = self.device.as_mut() {
            dev.f = flat(&f);
        }
        sync(get_device());
        Ok(())
    }
}
