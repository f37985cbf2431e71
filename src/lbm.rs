//! The simulation engine: owns configuration, geometry, kernel, fields and
//! hooks, and drives the step loop.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Backend, Configuration};
use crate::context::{build_context, Context, KernelTemplate};
use crate::error::{Error, HookError, Result};
use crate::fields::Fields;
use crate::geometry::{Geometry, NodeType};
use crate::hooks::{Action, Flow, HookRegistry, HookScope};
use crate::kind::SimKind;
use crate::solver::NativeCodegen;
use crate::traits::{Codegen, Kernel};
use crate::FloatNum;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Ready to run, no step executed yet.
    Built,
    Running,
    Finished,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of completed steps.
    pub iterations: u64,
    /// A hook stopped the run before the iteration bound.
    pub stopped_early: bool,
}

/// Step timing accumulated between progress reports.
#[derive(Debug)]
struct Timing {
    elapsed: Duration,
    steps: u64,
}

impl Timing {
    fn new() -> Self {
        Timing {
            elapsed: Duration::zero(),
            steps: 0,
        }
    }

    fn record(&mut self, d: Duration) {
        self.elapsed = self.elapsed + d;
        self.steps += 1;
    }

    fn report(&mut self, iteration: u64, geo: &Geometry, fields: &Fields) {
        let us = self.elapsed.num_microseconds().unwrap_or(i64::MAX).max(1) as FloatNum;
        let mlups = (geo.fluid_nodes() as FloatNum * self.steps as FloatNum) / us;
        let mean_speed = match geo.mask_array_by_fluid(&fields.speed()) {
            Ok(v) => v.mean().unwrap_or(0.),
            Err(e) => {
                warn!("progress: {}", e);
                FloatNum::NAN
            }
        };
        info!(
            iteration = iteration + 1,
            ms_per_step = us / 1000. / self.steps.max(1) as FloatNum,
            mlups,
            mean_speed,
            "progress"
        );
        *self = Timing::new();
    }
}

pub struct Sim {
    config: Configuration,
    kind: SimKind,
    geo: Geometry,
    template: KernelTemplate,
    ctx: Context,
    kernel: Box<dyn Kernel>,
    fields: Fields,
    hooks: HookRegistry,
    state: State,
    iteration: u64,
    timing: Timing,
}

impl<'a> Sim {
    pub fn to_ptr(self) -> *mut Sim {
        let sim_boxed = Box::new(self);
        Box::into_raw(sim_boxed)
    }

    /// # Safety
    ///
    /// `ptr` must come from [`Sim::to_ptr`] and not have been freed.
    pub unsafe fn from_ptr(ptr: *mut Sim) -> &'a mut Sim {
        &mut *ptr
    }

    /// Builds a simulation with the kernel backend selected by `config`.
    pub fn build(config: Configuration) -> Result<Sim> {
        match config.backend() {
            Backend::Native => Sim::with_codegen(config, &NativeCodegen),
            #[cfg(feature = "accel")]
            Backend::Arrayfire => Sim::with_codegen(config, &crate::af::ArrayFireCodegen),
            #[cfg(not(feature = "accel"))]
            Backend::Arrayfire => Err(crate::config::ConfigError::InvalidValue {
                name: "backend",
                reason: "built without the `accel` feature".to_owned(),
            }
            .into()),
        }
    }

    /// Builds a simulation whose kernel is materialized by `codegen`.
    pub fn with_codegen(config: Configuration, codegen: &dyn Codegen) -> Result<Sim> {
        let geo = Geometry::build(&config)?;
        let kind = SimKind::resolve(geo.kind());
        let template = KernelTemplate::from_name(config.template_name())?;
        let ctx = build_context(&config, &geo, template, kind.contributor())?;

        let mut kernel = codegen.materialize(template, &ctx)?;
        let fields = initial_fields(&config, &geo, &ctx)?;
        kernel.init(&geo, &fields)?;

        let mut hooks = HookRegistry::new();
        if !config.test_mode() && !config.quiet() && config.every() > 0 {
            hooks.add_periodic_hook(config.every(), Action::Progress)?;
        }

        info!(
            kind = kind.name(),
            kernel = kernel.name(),
            nx = geo.grid().x,
            ny = geo.grid().y,
            fluid_nodes = geo.fluid_nodes(),
            visc = config.visc(),
            "simulation built"
        );

        Ok(Sim {
            config,
            kind,
            geo,
            template,
            ctx,
            kernel,
            fields,
            hooks,
            state: State::Built,
            iteration: 0,
            timing: Timing::new(),
        })
    }

    /// Registers `action` to run after iteration `index` completes.
    pub fn add_hook(&mut self, index: u64, action: Action) -> Result<()> {
        if self.state == State::Finished {
            return Err(Error::AlreadyRun);
        }
        if let Some(max) = self.config.max_iters() {
            if index >= max {
                return Err(Error::InvalidHookIndex {
                    index,
                    reason: "beyond max_iters",
                });
            }
        }
        self.hooks.add_hook(index, action)
    }

    /// Registers `action` to run after every `period` iterations.
    pub fn add_periodic_hook(&mut self, period: u64, action: Action) -> Result<()> {
        if self.state == State::Finished {
            return Err(Error::AlreadyRun);
        }
        self.hooks.add_periodic_hook(period, action)
    }

    /// Drops every registered hook, including the framework defaults.
    pub fn clear_hooks(&mut self) {
        self.hooks.clear_hooks();
    }

    /// Runs until `max_iters` (or the configured bound) steps have completed
    /// or a hook asks to stop. A simulation runs once.
    pub fn run(&mut self, max_iters: Option<u64>) -> Result<RunSummary> {
        if self.state != State::Built {
            return Err(Error::AlreadyRun);
        }
        let bound = max_iters.or_else(|| self.config.max_iters());
        self.state = State::Running;
        debug!(kind = self.kind.name(), ?bound, "run started");

        let result = self.run_loop(bound);
        self.state = State::Finished;
        match &result {
            Ok(summary) => info!(
                iterations = summary.iterations,
                stopped_early = summary.stopped_early,
                "run finished"
            ),
            Err(e) => warn!(iteration = self.iteration, "run aborted: {}", e),
        }
        result
    }

    fn run_loop(&mut self, bound: Option<u64>) -> Result<RunSummary> {
        let mut i = 0;
        loop {
            if bound.map_or(false, |b| i >= b) {
                return Ok(RunSummary {
                    iterations: i,
                    stopped_early: false,
                });
            }

            let mut step = Ok(());
            let d = Duration::span(|| step = self.kernel.step(i, &mut self.fields));
            step?;
            self.timing.record(d);
            self.iteration = i + 1;

            let flow = self.fire_hooks(i)?;
            i += 1;
            if flow == Flow::Stop {
                return Ok(RunSummary {
                    iterations: i,
                    stopped_early: bound.map_or(true, |b| i < b),
                });
            }
        }
    }

    fn fire_hooks(&mut self, i: u64) -> Result<Flow> {
        let mut due = self.hooks.take_due(i);
        let Sim {
            config,
            geo,
            ctx,
            fields,
            hooks,
            timing,
            ..
        } = self;

        let result = due.run(|action| match action {
            Action::Progress => {
                timing.report(i, geo, fields);
                Ok(Flow::Continue)
            }
            Action::Stop => {
                debug!(iteration = i, "stop requested");
                Ok(Flow::Stop)
            }
            Action::Named { name, run } => {
                let mut scope = HookScope {
                    iteration: i,
                    config: &*config,
                    geo: &*geo,
                    context: &*ctx,
                    fields: &mut *fields,
                    pending: &mut *hooks,
                };
                run(&mut scope).map_err(|source| {
                    Error::from(HookError {
                        iteration: i,
                        action: name.clone(),
                        source,
                    })
                })
            }
        });
        self.hooks.restore(due);
        result
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn kind(&self) -> SimKind {
        self.kind
    }

    pub fn geo(&self) -> &Geometry {
        &self.geo
    }

    pub fn template(&self) -> KernelTemplate {
        self.template
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Number of completed steps.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }
}

/// Rest state at `rho0`, lid velocity on moving walls, plus the seeded
/// perturbation on fluid nodes.
fn initial_fields(config: &Configuration, geo: &Geometry, ctx: &Context) -> Result<Fields> {
    let rho0 = ctx.float("rho0")?;
    let lid = [ctx.float("lid_vx")?, ctx.float("lid_vy")?];
    let amp = config.perturbation();
    let mut rng = StdRng::seed_from_u64(config.seed());

    let mut fields = Fields::zeros(geo.shape());
    for ((y, x), &node) in geo.mask().indexed_iter() {
        match node {
            NodeType::Fluid => {
                fields.density[[y, x]] = rho0;
                if amp > 0. {
                    fields.ux[[y, x]] = rng.gen_range(-amp..=amp);
                    fields.uy[[y, x]] = rng.gen_range(-amp..=amp);
                }
            }
            NodeType::Velocity => {
                fields.ux[[y, x]] = lid[0];
                fields.uy[[y, x]] = lid[1];
            }
            NodeType::Wall => {}
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextError;
    use crate::error::KernelError;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sim(args: &[&str]) -> Sim {
        let config = Configuration::build(args.iter().copied()).unwrap();
        Sim::build(config).unwrap()
    }

    #[test]
    fn build_registers_progress_unless_testing() {
        let s = sim(&["--lat-nx=6", "--lat-ny=4", "--every=10"]);
        assert_eq!(s.state(), State::Built);
        assert_eq!(s.hooks().hooks_at(9).len(), 1);
        let s = sim(&["--lat-nx=6", "--lat-ny=4", "--every=10", "--test"]);
        assert!(s.hooks().is_empty());
    }

    #[test]
    fn run_is_single_use() {
        let mut s = sim(&["--lat-nx=6", "--lat-ny=4", "--test"]);
        let summary = s.run(Some(3)).unwrap();
        assert_eq!(summary.iterations, 3);
        assert!(!summary.stopped_early);
        assert_eq!(s.state(), State::Finished);
        assert!(matches!(s.run(Some(3)), Err(Error::AlreadyRun)));
        assert!(matches!(s.add_hook(0, Action::Stop), Err(Error::AlreadyRun)));
    }

    #[test]
    fn stop_action_ends_the_run() {
        let mut s = sim(&["--lat-nx=6", "--lat-ny=4", "--test", "--max-iters=0"]);
        s.add_hook(4, Action::Stop).unwrap();
        let summary = s.run(None).unwrap();
        assert_eq!(summary.iterations, 5);
        assert!(summary.stopped_early);
        assert_eq!(s.iteration(), 5);
    }

    #[test]
    fn hooks_beyond_max_iters_are_rejected() {
        let mut s = sim(&["--lat-nx=6", "--lat-ny=4", "--max-iters=10"]);
        assert!(s.add_hook(9, Action::Stop).is_ok());
        assert!(matches!(
            s.add_hook(10, Action::Stop),
            Err(Error::InvalidHookIndex { index: 10, .. })
        ));
    }

    #[test]
    fn failing_hook_aborts_with_its_name() {
        let mut s = sim(&["--lat-nx=6", "--lat-ny=4", "--test", "--max-iters=10"]);
        let later = Rc::new(RefCell::new(false));
        let flag = later.clone();
        s.add_hook(2, Action::named("explode", |_| Err("no".into())))
            .unwrap();
        s.add_hook(5, Action::named("later", move |_| {
            *flag.borrow_mut() = true;
            Ok(Flow::Continue)
        }))
        .unwrap();
        match s.run(None) {
            Err(Error::Hook(e)) => {
                assert_eq!(e.action, "explode");
                assert_eq!(e.iteration, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!*later.borrow());
        assert_eq!(s.state(), State::Finished);
    }

    #[test]
    fn hooks_can_schedule_future_hooks() {
        let mut s = sim(&["--lat-nx=6", "--lat-ny=4", "--test", "--max-iters=10"]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        s.add_hook(1, Action::named("chain", move |scope| {
            let log = log.clone();
            log.borrow_mut().push(scope.iteration());
            assert!(scope.add_hook(1, Action::Stop).is_err());
            scope.add_hook(
                4,
                Action::named("chained", move |scope| {
                    log.borrow_mut().push(scope.iteration());
                    Ok(Flow::Continue)
                }),
            )?;
            Ok(Flow::Continue)
        }))
        .unwrap();
        s.run(None).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 4]);
    }

    struct BrokenCodegen;

    impl Codegen for BrokenCodegen {
        fn materialize(&self, _: KernelTemplate, _: &Context) -> Result<Box<dyn Kernel>> {
            Err(ContextError::Missing("tau".into()).into())
        }
    }

    #[test]
    fn codegen_failure_aborts_build() {
        let config = Configuration::build(["--lat-nx=6", "--lat-ny=4"]).unwrap();
        assert!(matches!(
            Sim::with_codegen(config, &BrokenCodegen),
            Err(Error::Context(ContextError::Missing(_)))
        ));
    }

    #[test]
    fn template_is_chosen_by_name() {
        let s = sim(&["--lat-nx=6", "--lat-ny=4", "--template=single_fluid"]);
        assert_eq!(s.template(), KernelTemplate::SingleFluid);
        let config = Configuration::build(["--lat-nx=6", "--lat-ny=4", "--template=two_fluid"]).unwrap();
        assert!(matches!(
            Sim::build(config),
            Err(Error::Context(ContextError::UnknownTemplate(name))) if name == "two_fluid"
        ));
    }

    struct Exploding;

    impl Kernel for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn init(&mut self, _: &Geometry, _: &Fields) -> std::result::Result<(), KernelError> {
            Ok(())
        }
        fn step(&mut self, iteration: u64, _: &mut Fields) -> std::result::Result<(), KernelError> {
            if iteration == 3 {
                return Err(KernelError::NonFinite {
                    iteration,
                    quantity: "density",
                    x: 0,
                    y: 0,
                });
            }
            Ok(())
        }
    }

    struct ExplodingCodegen;

    impl Codegen for ExplodingCodegen {
        fn materialize(&self, _: KernelTemplate, _: &Context) -> Result<Box<dyn Kernel>> {
            Ok(Box::new(Exploding))
        }
    }

    #[test]
    fn kernel_failure_aborts_the_run() {
        let config = Configuration::build(["--lat-nx=6", "--lat-ny=4", "--test"]).unwrap();
        let mut s = Sim::with_codegen(config, &ExplodingCodegen).unwrap();
        let fired = Rc::new(RefCell::new(false));
        let flag = fired.clone();
        s.add_hook(3, Action::named("after_blowup", move |_| {
            *flag.borrow_mut() = true;
            Ok(Flow::Continue)
        }))
        .unwrap();
        assert!(matches!(
            s.run(Some(10)),
            Err(Error::Kernel(KernelError::NonFinite { iteration: 3, .. }))
        ));
        assert!(!*fired.borrow());
        assert_eq!(s.iteration(), 3);
    }

    #[test]
    fn perturbation_is_seeded() {
        let a = sim(&["--lat-nx=6", "--lat-ny=4", "--perturbation=0.001", "--seed=7"]);
        let b = sim(&["--lat-nx=6", "--lat-ny=4", "--perturbation=0.001", "--seed=7"]);
        let c = sim(&["--lat-nx=6", "--lat-ny=4", "--perturbation=0.001", "--seed=8"]);
        assert_eq!(a.fields(), b.fields());
        assert_ne!(a.fields(), c.fields());
        assert_eq!(a.fields().ux[[0, 0]], 0.);
    }
}
