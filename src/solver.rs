//! Portable CPU kernel for the `single_fluid` template.

use ndarray::Array3;

use crate::boundary::{self, Type};
use crate::context::{Context, KernelTemplate};
use crate::distribution::D2Q9;
use crate::error::{KernelError, Result};
use crate::fields::Fields;
use crate::geometry::{population_bytes, Geometry, NodeType};
use crate::grid::StructuredRectangular;
use crate::physics::{moments, TwoRelaxationTime};
use crate::traits::{Codegen, Distribution, Kernel};
use crate::FloatNum;

const BACKEND: &str = "native";

/// Materializes kernels that run on the host.
#[derive(Copy, Clone, Debug, Default)]
pub struct NativeCodegen;

impl Codegen for NativeCodegen {
    fn materialize(&self, template: KernelTemplate, ctx: &Context) -> Result<Box<dyn Kernel>> {
        match template {
            KernelTemplate::SingleFluid => Ok(Box::new(Solver::from_context(ctx)?)),
        }
    }
}

/// Lattice-Boltzmann Solver state
pub struct Solver {
    grid: StructuredRectangular,
    periodic: [bool; 2],
    rho0: FloatNum,
    pub bcs: boundary::Handler<D2Q9>,
    physics: TwoRelaxationTime<D2Q9>,
    nodes: Vec<NodeType>,
    f: Array3<FloatNum>,     // Post-collision distributions, (q, y, x)
    f_hlp: Array3<FloatNum>,
    initialized: bool,
}

impl Solver {
    pub fn from_context(ctx: &Context) -> Result<Solver> {
        let grid_name = ctx.text("grid")?;
        if grid_name != "D2Q9" {
            return Err(unsupported("grid", grid_name));
        }
        let tau = ctx.float("tau")?;
        let accel = [ctx.float("accel_x")?, ctx.float("accel_y")?];
        let physics = match ctx.text("model")? {
            "trt" => TwoRelaxationTime::new(tau, ctx.float("magic")?, accel),
            "bgk" => TwoRelaxationTime::bgk(tau, accel),
            other => return Err(unsupported("model", other)),
        };

        let nx = ctx.int("lat_nx")?.max(0) as usize;
        let ny = ctx.int("lat_ny")?.max(0) as usize;
        if population_bytes(nx, ny, D2Q9::size()).is_none() {
            return Err(KernelError::Backend {
                backend: BACKEND,
                reason: format!("{}x{} lattice does not fit in memory", nx, ny),
            }
            .into());
        }
        let rho0 = ctx.float("rho0")?;
        let lid = [ctx.float("lid_vx")?, ctx.float("lid_vy")?];
        let periodic = [ctx.flag("periodic_x")?, ctx.flag("periodic_y")?];

        let grid = StructuredRectangular::new(nx, ny);
        let dims = (D2Q9::size(), ny, nx);
        Ok(Solver {
            grid,
            periodic,
            rho0,
            bcs: boundary::Handler::new(lid, rho0),
            physics,
            nodes: vec![NodeType::Fluid; grid.size()],
            f: Array3::zeros(dims),
            f_hlp: Array3::zeros(dims),
            initialized: false,
        })
    }

    #[inline(always)]
    fn node(&self, x: usize, y: usize) -> NodeType {
        self.nodes[self.grid.index(x, y)]
    }

    /// Gathers the populations arriving at `(x, y)`, bouncing back those
    /// that would come from a wall.
    #[inline(always)]
    fn streaming(&self, x: usize, y: usize, f_in: &mut [FloatNum]) {
        for (i, f) in f_in.iter_mut().enumerate() {
            let src = self
                .grid
                .neighbor(x, y, -D2Q9::ex()[i], -D2Q9::ey()[i], self.periodic);
            let condition = match src {
                Some((sx, sy)) => match self.bcs.condition(self.node(sx, sy)) {
                    None => {
                        *f = self.f[[i, sy, sx]];
                        continue;
                    }
                    Some(c) => c,
                },
                None => Type::BounceBack,
            };
            *f = self
                .bcs
                .reflect(condition, i, self.f[[D2Q9::opposite(i), y, x]]);
        }
    }

    fn write_solid(&self, x: usize, y: usize, fields: &mut Fields) {
        let u = match self.bcs.condition(self.node(x, y)) {
            Some(Type::Moving(ux, uy)) => [ux, uy],
            _ => [0., 0.],
        };
        fields.density[[y, x]] = 0.;
        fields.ux[[y, x]] = u[0];
        fields.uy[[y, x]] = u[1];
    }
}

impl Kernel for Solver {
    fn name(&self) -> &'static str {
        KernelTemplate::SingleFluid.name()
    }

    /// Starts every fluid node in equilibrium with the given fields.
    fn init(&mut self, geo: &Geometry, fields: &Fields) -> std::result::Result<(), KernelError> {
        if geo.grid() != self.grid || fields.shape() != self.grid.shape() {
            return Err(KernelError::Layout {
                expected: self.grid.shape(),
                found: fields.shape(),
            });
        }
        self.nodes = geo.mask().iter().copied().collect();
        self.f.fill(0.);
        self.f_hlp.fill(0.);
        for ((y, x), &node) in geo.mask().indexed_iter() {
            if node != NodeType::Fluid {
                continue;
            }
            let rho = fields.density[[y, x]];
            let u = [fields.ux[[y, x]], fields.uy[[y, x]]];
            for i in 0..D2Q9::size() {
                self.f[[i, y, x]] = D2Q9::equilibrium(i, rho, u);
            }
        }
        self.initialized = true;
        Ok(())
    }

    fn step(&mut self, iteration: u64, fields: &mut Fields) -> std::result::Result<(), KernelError> {
        if !self.initialized {
            return Err(KernelError::NotInitialized);
        }
        if fields.shape() != self.grid.shape() {
            return Err(KernelError::Layout {
                expected: self.grid.shape(),
                found: fields.shape(),
            });
        }

        let mut f_in = [0.; 9];
        let mut f_out = [0.; 9];
        for y in 0..self.grid.y {
            for x in 0..self.grid.x {
                if self.node(x, y) != NodeType::Fluid {
                    self.write_solid(x, y, fields);
                    continue;
                }
                self.streaming(x, y, &mut f_in);
                let (rho, u) = moments::<D2Q9>(&f_in);
                if !rho.is_finite() || rho <= 0. {
                    return Err(KernelError::NonFinite {
                        iteration,
                        quantity: "density",
                        x,
                        y,
                    });
                }
                if !(u[0].is_finite() && u[1].is_finite()) {
                    return Err(KernelError::NonFinite {
                        iteration,
                        quantity: "velocity",
                        x,
                        y,
                    });
                }
                let v = self.physics.physical_velocity(u);
                self.physics.collide(&f_in, rho, v, &mut f_out);
                for (i, &f) in f_out.iter().enumerate() {
                    self.f_hlp[[i, y, x]] = f;
                }
                fields.density[[y, x]] = rho;
                fields.ux[[y, x]] = v[0];
                fields.uy[[y, x]] = v[1];
            }
        }
        std::mem::swap(&mut self.f, &mut self.f_hlp);
        Ok(())
    }
}

fn unsupported(symbol: &str, found: &str) -> crate::error::Error {
    KernelError::Backend {
        backend: BACKEND,
        reason: format!("unsupported {} `{}`", symbol, found),
    }
    .into()
}

impl Solver {
    /// Total mass carried by fluid nodes.
    pub fn mass(&self) -> FloatNum {
        let mut m = 0.;
        for ((_, y, x), &f) in self.f.indexed_iter() {
            if self.node(x, y) == NodeType::Fluid {
                m += f;
            }
        }
        m
    }

    pub fn rho0(&self) -> FloatNum {
        self.rho0
    }
}
