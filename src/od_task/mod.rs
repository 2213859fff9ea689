//! # Orbit-determination tasks
//!
//! An [`OdTask`] owns an [`ObservationSet`], an optional initial element set, a target
//! epoch and an [`OdConfig`]. [`OdTask::run`] executes the whole pipeline:
//!
//! 1. **Seed** – the initial set, or a Gibbs state converted to an element set.
//! 2. **Re-epoch** – the seed is moved to the target epoch (default: last observation).
//! 3. **Coarse fits** – long tracks are first fitted on downsampled copies by nested tasks
//!    (more than 1000 observations: 100 points; then more than 50 (100 for extended sets):
//!    a third of the track), otherwise the full track is fitted directly.
//! 4. **Term search** – drag and/or radiation grids are scanned and narrowed until the
//!    grid spread falls below 3e-5 (2e-5 for extended sets) or the round budget runs out.
//! 5. **Final fit** – every solved term free, kept if it improves the RMS.
//!
//! Progress (state, status text, round, RMS, best result so far) is published through a
//! shared [`TaskProgress`] that the [`runner`] exposes to callers.
//!
//! ## State machine
//!
//! ```text
//! Created → Running → Converged | Exhausted | Failed
//! ```
//!
//! A [`CancellationToken`] is checked between stages and term-search rounds; a cancelled
//! task ends `Failed` with the status "cancelled".

/// Task configuration and its builder.
pub mod config;

/// Thread-pool execution of tasks by identifier.
pub mod runner;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
};

use hifitime::Epoch;
use log::{info, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{
    downsample::downsample,
    element_set::{ElementSet, ElementType},
    fit::{fit_element_set, position_rms},
    initial_orbit_determination::{
        cart_to_elements::{cart_to_element_set, shift_epoch},
        gibbs::{estimate_best_step, gibbs},
    },
    observations::ObservationSet,
    od_env::OdEnv,
    od_task::config::OdConfig,
    orbit_type::{cartesian_state::CartesianState, OrbitState},
    ref_system::Frame,
    term_search::{
        grid_spread, min_rms_for_terms, new_terms, simple_new_terms, terms_are_valid, Term,
        WIDE_DRAG_TERMS, WIDE_RANGE,
    },
    tlefit_errors::TleFitError,
};

/// Tracks longer than this are first fitted on [`FIRST_DOWNSAMPLE_SIZE`] points.
pub const FIRST_DOWNSAMPLE_THRESHOLD: usize = 1000;
pub const FIRST_DOWNSAMPLE_SIZE: usize = 100;

/// Points of the narrowed term grids.
const REFINED_GRID_POINTS: usize = 9;

/// Widening of the last drag grid value after each standard round.
const LAST_TERM_WIDENING: f64 = 1.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Created,
    Running,
    /// A convergence criterion fired.
    Converged,
    /// The round budget ran out first.
    Exhausted,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Converged | TaskState::Exhausted | TaskState::Failed
        )
    }
}

/// Cooperative cancellation flag, shared by clones.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(TleFitError::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<(), TleFitError> {
        if self.is_cancelled() {
            Err(TleFitError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Snapshot of a task's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub state: TaskState,
    pub status: String,
    /// Term-search round, 1 after the initial fit.
    pub iteration: usize,
    pub rms: f64,
    /// Best state found so far; final once `state` is terminal.
    pub result: Option<OrbitState>,
}

/// Progress shared between a running task and its observers.
#[derive(Debug)]
pub struct TaskProgress {
    inner: Mutex<ProgressSnapshot>,
    finished: Condvar,
}

impl Default for TaskProgress {
    fn default() -> Self {
        TaskProgress {
            inner: Mutex::new(ProgressSnapshot {
                state: TaskState::Created,
                status: "created".into(),
                iteration: 0,
                rms: f64::NAN,
                result: None,
            }),
            finished: Condvar::new(),
        }
    }
}

impl TaskProgress {
    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F: FnOnce(&mut ProgressSnapshot)>(&self, f: F) {
        let mut guard = self.lock();
        f(&mut guard);
        if guard.state.is_terminal() {
            self.finished.notify_all();
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn status(&self) -> String {
        self.lock().status.clone()
    }

    pub fn result(&self) -> Option<OrbitState> {
        self.lock().result.clone()
    }

    /// Block until the task reaches a terminal state.
    pub fn wait(&self) -> ProgressSnapshot {
        let guard = self.lock();
        let guard = self
            .finished
            .wait_while(guard, |p| !p.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }
}

/// Element-type dependent schedule of the pipeline.
#[derive(Debug, Clone, Copy)]
struct SearchPlan {
    /// `(points, factor)` of the grids built after the first nested run
    coarse: (usize, f64),
    /// `(points, factor)` of the grids built after the second nested run
    fine: (usize, f64),
    second_downsample_threshold: usize,
    spread_stop: f64,
    /// Grids derived from nested runs replace the initial ones
    narrowed_grids: bool,
    widen_last_drag_term: bool,
    nested_iteration_divisor: usize,
}

impl SearchPlan {
    fn for_element_type(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Standard => SearchPlan {
                coarse: (21, 10.0),
                fine: (31, 3.0),
                second_downsample_threshold: 50,
                spread_stop: 3e-5,
                narrowed_grids: false,
                widen_last_drag_term: true,
                nested_iteration_divisor: 1,
            },
            ElementType::Extended => SearchPlan {
                coarse: (15, 20.0),
                fine: (15, 3.0),
                second_downsample_threshold: 100,
                spread_stop: 2e-5,
                narrowed_grids: true,
                widen_last_drag_term: false,
                nested_iteration_divisor: 2,
            },
        }
    }
}

/// A term being searched: its grid, the grid it restarts from and whether it is still
/// refined.
#[derive(Debug, Clone)]
struct TermGrid {
    term: Term,
    initial: Vec<f64>,
    grid: Vec<f64>,
    active: bool,
}

impl TermGrid {
    fn new(term: Term, grid: Vec<f64>, active: bool) -> Self {
        TermGrid {
            term,
            initial: grid.clone(),
            grid,
            active,
        }
    }

    fn narrow(&mut self, val: f64, (points, factor): (usize, f64)) {
        self.grid = simple_new_terms(val, points, factor);
        self.initial = self.grid.clone();
        if !terms_are_valid(&self.grid) {
            info!("{:?} grid collapsed around {val:e}", self.term);
            self.active = false;
        }
    }

    fn spread(&self) -> f64 {
        if self.active {
            grid_spread(&self.grid)
        } else {
            f64::NAN
        }
    }
}

/// Outcome of [`OdTask::execute`].
struct Solution {
    set: ElementSet,
    rms: f64,
    iterations: usize,
    converged: bool,
    covariance: Option<DMatrix<f64>>,
}

impl Solution {
    fn into_orbit_state(self) -> OrbitState {
        OrbitState::from_element_set(self.set, self.rms, self.iterations)
            .with_covariance(self.covariance)
    }
}

/// An orbit-determination job.
#[derive(Debug, Clone)]
pub struct OdTask {
    observations: ObservationSet,
    epoch: Option<Epoch>,
    initial: Option<ElementSet>,
    config: OdConfig,
    depth: usize,
    cancel: CancellationToken,
    progress: Arc<TaskProgress>,
}

impl OdTask {
    pub fn new(observations: ObservationSet, config: OdConfig) -> Self {
        OdTask {
            observations,
            epoch: None,
            initial: None,
            config,
            depth: 0,
            cancel: CancellationToken::new(),
            progress: Arc::new(TaskProgress::default()),
        }
    }

    /// Epoch of the fitted set; the last observation's epoch when unset.
    pub fn with_epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Seed the fit with a known set instead of the Gibbs estimate.
    pub fn with_initial_state(mut self, set: ElementSet) -> Self {
        self.initial = Some(set);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    pub fn epoch(&self) -> Option<Epoch> {
        self.epoch
    }

    pub fn initial_state(&self) -> Option<&ElementSet> {
        self.initial.as_ref()
    }

    pub fn config(&self) -> &OdConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> Arc<TaskProgress> {
        Arc::clone(&self.progress)
    }

    pub fn state(&self) -> TaskState {
        self.progress.state()
    }

    pub fn iteration(&self) -> usize {
        self.progress.snapshot().iteration
    }

    pub fn rms(&self) -> f64 {
        self.progress.snapshot().rms
    }

    pub fn status(&self) -> String {
        self.progress.status()
    }

    pub fn solved_state(&self) -> Option<OrbitState> {
        self.progress.result()
    }

    /// Execute the pipeline and publish the terminal state.
    ///
    /// Return
    /// ------
    /// * The solved orbit (converged or best effort), or the error that stopped the run;
    ///   on error the progress keeps the best state found before it.
    pub fn run(&self, env: &OdEnv) -> Result<OrbitState, TleFitError> {
        self.progress.update(|p| {
            p.state = TaskState::Running;
            p.status = "running".into();
        });
        info!(
            "OD task started: {} observations, {}",
            self.observations.len(),
            self.config
        );

        match self.execute(env) {
            Ok(solution) => {
                let state = if solution.converged {
                    TaskState::Converged
                } else {
                    TaskState::Exhausted
                };
                let orbit = solution.into_orbit_state();
                info!("OD task {state:?}: RMS {:.6e}", orbit.rms);
                self.progress.update(|p| {
                    p.state = state;
                    p.status = format!("{state:?}").to_lowercase();
                    p.rms = orbit.rms;
                    p.iteration = orbit.iterations;
                    p.result = Some(orbit.clone());
                });
                Ok(orbit)
            }
            Err(e) => {
                warn!("OD task failed: {e}");
                self.progress.update(|p| {
                    p.state = TaskState::Failed;
                    p.status = match e {
                        TleFitError::Cancelled => "cancelled".into(),
                        ref other => format!("failed: {other}"),
                    };
                });
                Err(e)
            }
        }
    }

    fn publish(&self, set: &ElementSet, rms: f64, iteration: usize) {
        self.progress.update(|p| {
            p.iteration = iteration;
            p.rms = rms;
            p.status = format!("iteration {iteration}: RMS {rms:.6e}");
            p.result = Some(OrbitState::from_element_set(set.clone(), rms, iteration));
        });
    }

    fn seed(&self, states: &[CartesianState], env: &OdEnv) -> Result<ElementSet, TleFitError> {
        if let Some(set) = &self.initial {
            return Ok(set.clone());
        }
        let step = estimate_best_step(states, self.config.gibbs_separation_minutes).ok_or(
            TleFitError::NotEnoughObservations {
                needed: 3,
                got: states.len(),
            },
        )?;
        let cart = gibbs(&states[0], &states[step], &states[2 * step], env.mu)?;
        cart_to_element_set(&cart, &self.config.object_id, self.config.element_type, env)
    }

    /// Fit `max` downsampled points with a nested task seeded by `set`.
    fn nested_run(
        &self,
        env: &OdEnv,
        states: &[CartesianState],
        max: usize,
        epoch: Epoch,
        set: &ElementSet,
        grids: (&TermGrid, &TermGrid),
    ) -> Result<ElementSet, TleFitError> {
        let plan = SearchPlan::for_element_type(self.config.element_type);
        let mut config = self.config.clone();
        config.allow_downsample = false;
        config.preferred_drag_terms = Some(grids.0.grid.clone());
        config.preferred_radiation_terms = Some(grids.1.grid.clone());
        config.max_iterations = (config.max_iterations / plan.nested_iteration_divisor).max(1);

        let nested = OdTask {
            observations: ObservationSet::new(Frame::Teme, downsample(states, max)),
            epoch: Some(epoch),
            initial: Some(set.clone()),
            config,
            depth: self.depth + 1,
            cancel: self.cancel.clone(),
            progress: Arc::new(TaskProgress::default()),
        };

        info!("nested run on {} of {} points", nested.observations.len(), states.len());
        let out = nested.execute(env)?;
        info!("nested run over: RMS {:.6e}\n{}", out.rms, out.set);
        Ok(out.set)
    }

    fn can_nest(&self) -> bool {
        self.config.allow_downsample && self.depth < self.config.max_nested_depth
    }

    fn execute(&self, env: &OdEnv) -> Result<Solution, TleFitError> {
        let states = env.teme_states(&self.observations);
        let last = states.last().ok_or(TleFitError::NotEnoughObservations {
            needed: 1,
            got: 0,
        })?;
        let epoch = self.epoch.unwrap_or(last.epoch);
        let cfg = &self.config;
        let plan = SearchPlan::for_element_type(cfg.element_type);
        let terms = cfg.fitted_terms();
        let search = cfg.term_search_settings();

        let mut set = self.seed(&states, env)?;
        if set.epoch() != epoch {
            set = shift_epoch(&set, epoch, env)?;
        }
        self.cancel.check()?;

        let default_drag = match cfg.element_type {
            ElementType::Standard => WIDE_DRAG_TERMS.to_vec(),
            ElementType::Extended => WIDE_RANGE.to_vec(),
        };
        let mut drag = TermGrid::new(
            Term::Drag,
            cfg.preferred_drag_terms.clone().unwrap_or(default_drag),
            terms.bstar,
        );
        let mut radiation = TermGrid::new(
            Term::Radiation,
            cfg.preferred_radiation_terms
                .clone()
                .unwrap_or_else(|| WIDE_RANGE.to_vec()),
            terms.agom,
        );
        let mut log_spacing = true;

        let n = states.len();
        let mut rms;
        let mut converged;
        let mut covariance = None;

        if n > FIRST_DOWNSAMPLE_THRESHOLD && self.can_nest() {
            set = self.nested_run(
                env,
                &states,
                FIRST_DOWNSAMPLE_SIZE,
                epoch,
                &set,
                (&drag, &radiation),
            )?;
            rms = position_rms(env, &states, &set);
            converged = false;
            if plan.narrowed_grids {
                drag.narrow(set.bstar(), plan.coarse);
                radiation.narrow(set.nddot(), plan.coarse);
                drag.active &= terms.bstar;
                radiation.active &= terms.agom;
            }
            log_spacing = false;
        } else {
            let fitted = fit_element_set(env, &states, epoch, &set, terms, &cfg.fit)?;
            set = fitted.set;
            rms = fitted.rms;
            converged = fitted.converged;
            covariance = fitted.covariance;
        }
        self.cancel.check()?;

        if n > plan.second_downsample_threshold && self.can_nest() {
            set = self.nested_run(env, &states, n / 3, epoch, &set, (&drag, &radiation))?;
            rms = position_rms(env, &states, &set);
            converged = false;
            covariance = None;
            if plan.narrowed_grids {
                drag.narrow(set.bstar(), plan.fine);
                radiation.narrow(set.nddot(), plan.fine);
                drag.active &= terms.bstar;
                radiation.active &= terms.agom;
            }
            log_spacing = false;
        }

        let mut iterations = 1;
        self.publish(&set, rms, iterations);

        if !terms.any() {
            return Ok(Solution {
                set,
                rms,
                iterations,
                converged,
                covariance,
            });
        }

        let mut best = (set.clone(), f64::MAX);
        converged = false;

        for i in 0..cfg.max_iterations {
            self.cancel.check()?;

            for grid in [&mut radiation, &mut drag] {
                if !grid.active {
                    continue;
                }
                let found = min_rms_for_terms(env, &states, &set, grid.term, &grid.grid, &search)?;
                set = found.set;
                if found.rms < best.1 {
                    best = (set.clone(), found.rms);
                }

                grid.grid = new_terms(
                    grid.term.value(&set),
                    &grid.grid,
                    REFINED_GRID_POINTS,
                    log_spacing,
                );
                if grid.term == Term::Drag && plan.widen_last_drag_term {
                    if let Some(last) = grid.grid.last_mut() {
                        *last *= LAST_TERM_WIDENING;
                    }
                }
                if !terms_are_valid(&grid.grid) {
                    info!("{:?} grid collapsed, refinement stopped", grid.term);
                    grid.active = false;
                }
            }

            if i > 1 {
                log_spacing = false;
            } else if i == 0 {
                radiation.grid = radiation.initial.clone();
            }

            iterations = i + 2;
            self.publish(&best.0, best.1, iterations);

            let (del, del2) = (drag.spread(), radiation.spread());
            info!("term search round {i}: spreads {del:e} {del2:e}");
            if del < plan.spread_stop || del2 < plan.spread_stop {
                converged = true;
                break;
            }
            if !drag.active && !radiation.active {
                converged = true;
                break;
            }
        }
        self.cancel.check()?;

        let (best_set, min_rms) = best;
        let refit = fit_element_set(env, &states, epoch, &best_set, terms, &cfg.fit)?;
        let solution = if refit.rms < min_rms {
            Solution {
                set: refit.set,
                rms: refit.rms,
                iterations,
                converged,
                covariance: refit.covariance,
            }
        } else {
            Solution {
                set: best_set,
                rms: min_rms,
                iterations,
                converged,
                covariance: None,
            }
        };
        Ok(solution)
    }
}
