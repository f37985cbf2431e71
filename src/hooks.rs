//! Iteration hooks: actions run right after selected time steps.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::Configuration;
use crate::context::Context;
use crate::error::{BoxError, Error, Result};
use crate::fields::Fields;
use crate::geometry::Geometry;

/// What the engine does after a hook returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Finish the run after the current iteration.
    Stop,
}

pub type HookFn = Box<dyn FnMut(&mut HookScope<'_>) -> std::result::Result<Flow, BoxError>>;

/// A registered action.
pub enum Action {
    /// Log iteration, timing and mean fluid speed.
    Progress,
    /// Request termination after this iteration.
    Stop,
    /// User code, identified by `name` in errors and logs.
    Named { name: String, run: HookFn },
}

impl Action {
    pub fn named<F>(name: impl Into<String>, run: F) -> Action
    where
        F: FnMut(&mut HookScope<'_>) -> std::result::Result<Flow, BoxError> + 'static,
    {
        Action::Named {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Action::Progress => "progress",
            Action::Stop => "stop",
            Action::Named { name, .. } => name,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({})", self.name())
    }
}

struct Entry {
    seq: u64,
    action: Action,
}

struct Periodic {
    period: u64,
    entry: Entry,
}

impl Periodic {
    fn due(&self, index: u64) -> bool {
        (index + 1) % self.period == 0
    }
}

/// Ordered map from iteration index to actions, plus periodic actions.
#[derive(Default)]
pub struct HookRegistry {
    at: BTreeMap<u64, Vec<Entry>>,
    every: Vec<Periodic>,
    next_seq: u64,
    /// Indices below this have already been consulted.
    consulted: u64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Registers `action` to run after iteration `index` completes.
    pub fn add_hook(&mut self, index: u64, action: Action) -> Result<()> {
        if index < self.consulted {
            return Err(Error::InvalidHookIndex {
                index,
                reason: "iteration already passed",
            });
        }
        let seq = self.next_seq();
        self.at.entry(index).or_default().push(Entry { seq, action });
        Ok(())
    }

    /// Registers `action` to run after every `period`-th iteration.
    pub fn add_periodic_hook(&mut self, period: u64, action: Action) -> Result<()> {
        if period == 0 {
            return Err(Error::InvalidHookIndex {
                index: 0,
                reason: "period must be positive",
            });
        }
        let seq = self.next_seq();
        self.every.push(Periodic {
            period,
            entry: Entry { seq, action },
        });
        Ok(())
    }

    pub fn clear_hooks(&mut self) {
        self.at.clear();
        self.every.clear();
    }

    /// Actions that would run after iteration `index`, in registration order.
    pub fn hooks_at(&self, index: u64) -> Vec<&Action> {
        let mut due: Vec<&Entry> = self.at.get(&index).into_iter().flatten().collect();
        due.extend(self.every.iter().filter(|p| p.due(index)).map(|p| &p.entry));
        due.sort_by_key(|e| e.seq);
        due.into_iter().map(|e| &e.action).collect()
    }

    pub fn len(&self) -> usize {
        self.at.values().map(Vec::len).sum::<usize>() + self.every.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detaches the actions due at `index`. One-shot entries are consumed;
    /// periodic ones go back with [`HookRegistry::restore`].
    pub(crate) fn take_due(&mut self, index: u64) -> Due {
        self.consulted = index + 1;
        Due {
            once: self.at.remove(&index).unwrap_or_default(),
            periodic: std::mem::take(&mut self.every),
            index,
        }
    }

    pub(crate) fn restore(&mut self, due: Due) {
        let added = std::mem::replace(&mut self.every, due.periodic);
        self.every.extend(added);
    }
}

pub(crate) struct Due {
    once: Vec<Entry>,
    periodic: Vec<Periodic>,
    index: u64,
}

impl Due {
    /// Visits the due actions in registration order, stopping at the first
    /// failure. A stop request is reported once every action has run.
    pub(crate) fn run<F>(&mut self, mut f: F) -> Result<Flow>
    where
        F: FnMut(&mut Action) -> Result<Flow>,
    {
        let index = self.index;
        let mut order: Vec<(u64, Slot)> = self
            .once
            .iter()
            .enumerate()
            .map(|(i, e)| (e.seq, Slot::Once(i)))
            .collect();
        order.extend(
            self.periodic
                .iter()
                .enumerate()
                .filter(|(_, p)| p.due(index))
                .map(|(i, p)| (p.entry.seq, Slot::Periodic(i))),
        );
        order.sort_by_key(|&(seq, _)| seq);

        let mut flow = Flow::Continue;
        for (_, slot) in order {
            let action = match slot {
                Slot::Once(i) => &mut self.once[i].action,
                Slot::Periodic(i) => &mut self.periodic[i].entry.action,
            };
            if f(action)? == Flow::Stop {
                flow = Flow::Stop;
            }
        }
        Ok(flow)
    }
}

#[derive(Copy, Clone)]
enum Slot {
    Once(usize),
    Periodic(usize),
}

/// Engine state lent to a hook for the duration of one call.
pub struct HookScope<'a> {
    pub(crate) iteration: u64,
    pub(crate) config: &'a Configuration,
    pub(crate) geo: &'a Geometry,
    pub(crate) context: &'a Context,
    pub(crate) fields: &'a mut Fields,
    pub(crate) pending: &'a mut HookRegistry,
}

impl<'a> HookScope<'a> {
    /// Index of the iteration that just completed.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn config(&self) -> &Configuration {
        self.config
    }

    pub fn geo(&self) -> &Geometry {
        self.geo
    }

    pub fn context(&self) -> &Context {
        self.context
    }

    pub fn fields(&self) -> &Fields {
        &*self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut *self.fields
    }

    /// Schedules `action` for a later iteration of the current run.
    pub fn add_hook(&mut self, index: u64, action: Action) -> Result<()> {
        if let Some(max) = self.config.max_iters() {
            if index >= max {
                return Err(Error::InvalidHookIndex {
                    index,
                    reason: "beyond max_iters",
                });
            }
        }
        self.pending.add_hook(index, action)
    }
}
