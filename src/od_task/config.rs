//! # Orbit-determination task configuration
//!
//! [`OdConfig`] gathers every tunable of an [`OdTask`](crate::od_task::OdTask) run: which
//! terms are solved for, how long tracks are downsampled, the term-search schedule and the
//! least-squares settings of each fit. It is built with [`OdConfig::builder`], which
//! validates the values, and derives `serde` traits so hosts can load it from any format.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tlefit::element_set::ElementType;
//! use tlefit::od_task::config::OdConfig;
//!
//! let config = OdConfig::builder()
//!     .element_type(ElementType::Extended)
//!     .solve_for_drag(true)
//!     .solve_for_radiation(true)
//!     .max_iterations(10)
//!     .parallel_term_search(true)
//!     .build()
//!     .unwrap();
//! println!("{config:#}");
//! ```

use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    element_set::ElementType,
    fit::{residuals::FittedTerms, FitSettings},
    term_search::{terms_are_valid, TermSearchSettings},
    tlefit_errors::TleFitError,
};

/// Configuration of an orbit-determination task.
///
/// Fields
/// -----------------
/// **Model**
/// * `element_type` – propagator model of the fitted set. Radiation terms exist only for
///   [`ElementType::Extended`].
/// * `object_id` – identifier written into a set seeded from the observations.
/// * `solve_for_drag`, `solve_for_radiation` – terms refined by the term search and freed
///   in the final fit.
///
/// **Downsampling**
/// * `allow_downsample` – run nested fits on downsampled tracks before the full one.
/// * `max_nested_depth` – how deep nested fits may go.
///
/// **Term search**
/// * `max_iterations` – term-search rounds.
/// * `parallel_term_search` – fit the values of a grid in parallel.
/// * `preferred_drag_terms`, `preferred_radiation_terms` – initial grids replacing the
///   defaults.
///
/// **Seeding / fits**
/// * `gibbs_separation_minutes` – minimum spacing of the Gibbs samples.
/// * `fit` – settings of the full fits (seed fit and final re-fit).
/// * `term_search` – settings of the per-value fits inside the term search.
///
/// Defaults
/// -----------------
/// * `element_type`: standard
/// * `object_id`: "99999"
/// * `solve_for_drag`: true, `solve_for_radiation`: false
/// * `allow_downsample`: true, `max_nested_depth`: 1
/// * `max_iterations`: 20
/// * `parallel_term_search`: false
/// * no preferred grids
/// * `gibbs_separation_minutes`: 15
/// * `fit`, `term_search`: budgets of the element type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdConfig {
    // --- Model ---
    pub element_type: ElementType,
    pub object_id: String,
    pub solve_for_drag: bool,
    pub solve_for_radiation: bool,

    // --- Downsampling ---
    pub allow_downsample: bool,
    pub max_nested_depth: usize,

    // --- Term search ---
    pub max_iterations: usize,
    pub parallel_term_search: bool,
    pub preferred_drag_terms: Option<Vec<f64>>,
    pub preferred_radiation_terms: Option<Vec<f64>>,

    // --- Seeding / fits ---
    pub gibbs_separation_minutes: f64,
    pub fit: FitSettings,
    pub term_search: TermSearchSettings,
}

impl OdConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> OdConfigBuilder {
        OdConfigBuilder::new()
    }

    /// Default configuration for an element type; extended sets also solve for the
    /// radiation term.
    pub fn for_element_type(element_type: ElementType) -> Self {
        let fit = FitSettings::for_element_type(element_type);
        OdConfig {
            element_type,
            object_id: "99999".into(),
            solve_for_drag: true,
            solve_for_radiation: element_type == ElementType::Extended,
            allow_downsample: true,
            max_nested_depth: 1,
            max_iterations: 20,
            parallel_term_search: false,
            preferred_drag_terms: None,
            preferred_radiation_terms: None,
            gibbs_separation_minutes: 15.0,
            fit,
            term_search: TermSearchSettings {
                parallel: false,
                fit: fit.two_stage(false),
            },
        }
    }

    /// Terms solved for.
    pub fn fitted_terms(&self) -> FittedTerms {
        FittedTerms {
            bstar: self.solve_for_drag,
            agom: self.solve_for_radiation,
        }
    }

    /// Term-search settings with the parallel flag applied.
    pub fn term_search_settings(&self) -> TermSearchSettings {
        TermSearchSettings {
            parallel: self.parallel_term_search,
            ..self.term_search
        }
    }
}

impl Default for OdConfig {
    fn default() -> Self {
        OdConfig::for_element_type(ElementType::Standard)
    }
}

#[derive(Debug, Clone)]
pub struct OdConfigBuilder {
    config: OdConfig,
}

impl Default for OdConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OdConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: OdConfig::default(),
        }
    }

    // --- Model ---

    /// Also resets `solve_for_radiation` and both fit settings to the defaults of the type;
    /// call it before the setters that override them.
    pub fn element_type(mut self, t: ElementType) -> Self {
        let defaults = OdConfig::for_element_type(t);
        self.config.element_type = t;
        self.config.solve_for_radiation = defaults.solve_for_radiation;
        self.config.fit = defaults.fit;
        self.config.term_search = defaults.term_search;
        self
    }
    pub fn object_id(mut self, id: &str) -> Self {
        self.config.object_id = id.into();
        self
    }
    pub fn solve_for_drag(mut self, v: bool) -> Self {
        self.config.solve_for_drag = v;
        self
    }
    pub fn solve_for_radiation(mut self, v: bool) -> Self {
        self.config.solve_for_radiation = v;
        self
    }

    // --- Downsampling ---
    pub fn allow_downsample(mut self, v: bool) -> Self {
        self.config.allow_downsample = v;
        self
    }
    pub fn max_nested_depth(mut self, v: usize) -> Self {
        self.config.max_nested_depth = v;
        self
    }

    // --- Term search ---
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.config.max_iterations = v;
        self
    }
    pub fn parallel_term_search(mut self, v: bool) -> Self {
        self.config.parallel_term_search = v;
        self
    }
    pub fn preferred_drag_terms(mut self, v: Vec<f64>) -> Self {
        self.config.preferred_drag_terms = Some(v);
        self
    }
    pub fn preferred_radiation_terms(mut self, v: Vec<f64>) -> Self {
        self.config.preferred_radiation_terms = Some(v);
        self
    }

    // --- Seeding / fits ---
    pub fn gibbs_separation_minutes(mut self, v: f64) -> Self {
        self.config.gibbs_separation_minutes = v;
        self
    }
    pub fn fit_settings(mut self, v: FitSettings) -> Self {
        self.config.fit = v;
        self
    }
    pub fn term_search_settings(mut self, v: TermSearchSettings) -> Self {
        self.config.term_search = v;
        self
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    fn check_fit(name: &str, fit: &FitSettings) -> Result<(), TleFitError> {
        for lm in [&fit.stage1, &fit.stage2] {
            if lm.max_evaluations == 0 || lm.max_iterations == 0 {
                return Err(TleFitError::InvalidOdParameter(format!(
                    "{name}: evaluation and iteration budgets must be >= 1"
                )));
            }
            if !Self::gt0(lm.parameter_relative_tolerance) || !Self::ge0(lm.cost_relative_tolerance)
            {
                return Err(TleFitError::InvalidOdParameter(format!(
                    "{name}: tolerances must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Finalize the builder and produce an [`OdConfig`].
    ///
    /// Validation rules
    /// -----------------
    /// * `max_iterations >= 1`.
    /// * `gibbs_separation_minutes >= 0.0`.
    /// * `solve_for_radiation` requires [`ElementType::Extended`].
    /// * preferred grids must pass [`terms_are_valid`] (distinct endpoints, finite values).
    /// * every fit stage needs a budget of at least one evaluation and iteration and a
    ///   positive parameter tolerance.
    ///
    /// Notes
    /// -----------------
    /// * `max_nested_depth = 0` disables nested runs like `allow_downsample(false)` does.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(OdConfig)` if all values are valid.
    /// * `Err(TleFitError::InvalidOdParameter)` naming the first rule that fails.
    pub fn build(self) -> Result<OdConfig, TleFitError> {
        let c = &self.config;

        if c.max_iterations == 0 {
            return Err(TleFitError::InvalidOdParameter(
                "max_iterations must be >= 1".into(),
            ));
        }
        if !Self::ge0(c.gibbs_separation_minutes) {
            return Err(TleFitError::InvalidOdParameter(
                "gibbs_separation_minutes must be non-negative".into(),
            ));
        }
        if c.solve_for_radiation && c.element_type != ElementType::Extended {
            return Err(TleFitError::InvalidOdParameter(
                "the radiation term requires extended element sets".into(),
            ));
        }
        for (name, grid) in [
            ("preferred_drag_terms", &c.preferred_drag_terms),
            ("preferred_radiation_terms", &c.preferred_radiation_terms),
        ] {
            if let Some(grid) = grid {
                if !terms_are_valid(grid) {
                    return Err(TleFitError::InvalidOdParameter(format!(
                        "{name} is degenerate"
                    )));
                }
            }
        }
        Self::check_fit("fit", &c.fit)?;
        Self::check_fit("term_search.fit", &c.term_search.fit)?;

        Ok(self.config)
    }
}

impl fmt::Display for OdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 44;
            writeln!(f, "Orbit Determination Parameters")?;
            writeln!(f, "------------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Model]")?;
            line!("element_type        = {:?}", self.element_type, "Propagator model")?;
            line!("object_id           = {}", self.object_id, "Id of a seeded set")?;
            line!("solve_for_drag      = {}", self.solve_for_drag, "Search bstar")?;
            line!(
                "solve_for_radiation = {}",
                self.solve_for_radiation,
                "Search agom"
            )?;

            writeln!(f, "\n[Downsampling]")?;
            line!(
                "allow_downsample    = {}",
                self.allow_downsample,
                "Nested fits on long tracks"
            )?;
            line!(
                "max_nested_depth    = {}",
                self.max_nested_depth,
                "Nesting cap"
            )?;

            writeln!(f, "\n[Term search]")?;
            line!(
                "max_iterations      = {}",
                self.max_iterations,
                "Grid refinement rounds"
            )?;
            line!(
                "parallel            = {}",
                self.parallel_term_search,
                "Fit grid values in parallel"
            )?;
            line!(
                "preferred_drag      = {:?}",
                self.preferred_drag_terms.as_ref().map(Vec::len),
                "Initial drag grid size"
            )?;
            line!(
                "preferred_radiation = {:?}",
                self.preferred_radiation_terms.as_ref().map(Vec::len),
                "Initial radiation grid size"
            )?;

            writeln!(f, "\n[Seeding / fits]")?;
            line!(
                "gibbs_separation    = {:.1} min",
                self.gibbs_separation_minutes,
                "Gibbs sample spacing"
            )?;
            line!(
                "stage1 budget       = {}",
                self.fit.stage1.max_evaluations,
                "Terms fixed"
            )?;
            line!(
                "stage2 budget       = {}",
                self.fit.stage2.max_evaluations,
                "Terms free"
            )?;
            Ok(())
        } else {
            write!(
                f,
                "OdConfig(type={:?}, drag={}, radiation={}, downsample={}, iters={})",
                self.element_type,
                self.solve_for_drag,
                self.solve_for_radiation,
                self.allow_downsample,
                self.max_iterations
            )
        }
    }
}

#[cfg(test)]
mod test_od_config {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = OdConfig::default();
        assert_eq!(c.max_iterations, 20);
        assert_eq!(c.gibbs_separation_minutes, 15.0);
        assert!(c.solve_for_drag && !c.solve_for_radiation);
        assert_eq!(c.fit.stage1.max_evaluations, 4000);
        assert!(!c.term_search.fit.two_stage);

        let x = OdConfig::for_element_type(ElementType::Extended);
        assert!(x.solve_for_radiation);
        assert_eq!(x.fit.stage1.max_evaluations, 1000);
    }

    #[test]
    fn test_builder_validation() {
        assert!(OdConfig::builder().max_iterations(0).build().is_err());
        assert!(OdConfig::builder()
            .gibbs_separation_minutes(f64::NAN)
            .build()
            .is_err());
        assert!(OdConfig::builder().solve_for_radiation(true).build().is_err());
        assert!(OdConfig::builder()
            .preferred_drag_terms(vec![1e-4, 1e-4])
            .build()
            .is_err());

        let c = OdConfig::builder()
            .element_type(ElementType::Extended)
            .preferred_radiation_terms(vec![0.1, 0.01, 0.0])
            .parallel_term_search(true)
            .build()
            .unwrap();
        assert!(c.term_search_settings().parallel);
        assert_eq!(c.fitted_terms(), FittedTerms { bstar: true, agom: true });
    }

    #[test]
    fn test_display() {
        let s = format!("{:#}", OdConfig::default());
        assert!(s.contains("max_iterations      = 20"));
        assert!(format!("{}", OdConfig::default()).starts_with("OdConfig("));
    }
}
