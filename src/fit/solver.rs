//! Per-spectrum solver loop.
//!
//! Each sample goes `INIT → SOLVING → {CONVERGED, FAILED}`. A failed first
//! attempt is retried once from a fresh guess built on the sample's own data
//! and scales, with a larger budget. A sample failing twice is recorded with
//! NaN results and the batch carries on; only configuration and consistency
//! errors abort a batch.

use ndarray::{Array1, ArrayView1};

use crate::bounds::{clip_to_bounds, Bounds};
use crate::catalog::LineCatalog;
use crate::constraints::{compile, CompiledLines, ConstraintSet, QuantityKind, WavelengthWindow};
use crate::error::{Result, SpectraFitError};
use crate::fit::config::FitConfig;
use crate::fit::extract::Extractor;
use crate::fit::result::{BatchResult, Diagnostics, SampleFit, SampleStatus};
use crate::index::ParameterIndex;
use crate::initial::{amplitude_seed_factors, initial_guess};
use crate::lm::{BoundedLevenbergMarquardt, LmConfig, LmResult};
use crate::model::{LineTable, SpectralModel};
use crate::scaling::Scales;
use crate::spectra::Spectra;

/// Everything derived once per fit configuration, shared by all samples.
#[derive(Debug, Clone)]
pub struct SpectralFitter {
    compiled: CompiledLines,
    index: ParameterIndex,
    table: LineTable,
    masses: Vec<f64>,
    bounds: Vec<Bounds>,
    amplitude_factors: Vec<f64>,
    config: FitConfig,
}

impl SpectralFitter {
    /// Compile the constraints and build the index, bounds and seeds.
    ///
    /// # Errors
    ///
    /// * `Configuration` for an invalid configuration or constraint set
    /// * `Consistency` if the index layout does not add up
    pub fn new(
        catalog: &LineCatalog,
        window: WavelengthWindow,
        constraints: &ConstraintSet,
        config: FitConfig,
    ) -> Result<Self> {
        config.validate()?;
        let compiled = compile(catalog, window, constraints)?;
        Self::from_compiled(compiled, config)
    }

    pub fn from_compiled(compiled: CompiledLines, config: FitConfig) -> Result<Self> {
        config.validate()?;
        let index = ParameterIndex::from_compiled(&compiled)?;
        let table = LineTable::from_compiled(&compiled);
        let masses = compiled.lines().iter().map(|line| line.mass).collect();
        let bounds = config.bounds.build(&index)?;
        let amplitude_factors = amplitude_seed_factors(&compiled, &index, &config.amplitude_seeds)?;
        Ok(Self {
            compiled,
            index,
            table,
            masses,
            bounds,
            amplitude_factors,
            config,
        })
    }

    pub fn compiled(&self) -> &CompiledLines {
        &self.compiled
    }

    pub fn index(&self) -> &ParameterIndex {
        &self.index
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    fn extractor(&self) -> Extractor<'_> {
        Extractor::new(
            &self.index,
            &self.table,
            &self.masses,
            self.config.temperature_factor,
        )
    }

    /// Fit every sample of `spectra`.
    ///
    /// Chained mode runs a sequential fold seeded by the last converged
    /// solution; independent mode may run on the rayon pool.
    pub fn fit(&self, spectra: &Spectra) -> Result<BatchResult> {
        let n = spectra.n_samples();
        let scales = match self.config.scales {
            Some(fixed) => vec![fixed; n],
            None => Scales::for_batch(spectra, self.config.chain),
        };
        tracing::info!(
            samples = n,
            lines = self.index.line_count(),
            free_variables = self.index.size(),
            chain = self.config.chain,
            "starting batch fit"
        );

        let samples = if self.config.chain {
            self.fit_chained(spectra, &scales)?
        } else {
            self.fit_independent(spectra, &scales)?
        };

        let result = BatchResult::new(
            self.compiled.lines().to_vec(),
            self.compiled.descriptor(QuantityKind::Width).groups().to_vec(),
            self.compiled.descriptor(QuantityKind::Shift).groups().to_vec(),
            samples,
        );
        let summary = result.summary();
        if summary.failed.is_empty() {
            tracing::info!(samples = summary.samples, "batch fit complete");
        } else {
            tracing::warn!(
                samples = summary.samples,
                converged = summary.converged,
                failed = ?summary.failed,
                "batch fit complete with failed samples"
            );
        }
        Ok(result)
    }

    fn fit_chained(&self, spectra: &Spectra, scales: &[Scales]) -> Result<Vec<SampleFit>> {
        let axis = spectra.wavelength();
        let initial = (Vec::with_capacity(spectra.n_samples()), None::<(Array1<f64>, Scales)>);
        let (fits, _) = (0..spectra.n_samples()).try_fold(initial, |(mut fits, seed), i| {
            let warm = seed
                .as_ref()
                .map(|(x, from)| from.rescale(x, &scales[i], &self.index));
            let fit = self.fit_sample(i, axis, spectra.sample(i), scales[i], warm)?;
            let seed = if fit.is_converged() {
                Some((fit.solution.clone(), fit.scales))
            } else {
                seed
            };
            fits.push(fit);
            Ok::<_, SpectraFitError>((fits, seed))
        })?;
        Ok(fits)
    }

    fn fit_independent(&self, spectra: &Spectra, scales: &[Scales]) -> Result<Vec<SampleFit>> {
        let solve = |i: usize| {
            self.fit_sample(i, spectra.wavelength(), spectra.sample(i), scales[i], None)
        };

        #[cfg(feature = "parallel")]
        {
            if self.config.parallel {
                use rayon::prelude::*;
                return (0..spectra.n_samples()).into_par_iter().map(solve).collect();
            }
        }

        (0..spectra.n_samples()).map(solve).collect()
    }

    /// Solve one sample, retrying once from its own data.
    ///
    /// Only fatal errors are returned; anything else ends in a failed sample.
    pub fn fit_sample(
        &self,
        sample_index: usize,
        axis: &Array1<f64>,
        sample: ArrayView1<'_, f64>,
        scales: Scales,
        warm: Option<Array1<f64>>,
    ) -> Result<SampleFit> {
        let reason = match self.attempt(axis, sample, scales, warm, &self.config.solver) {
            Ok(result) if result.success => {
                return self.converged(sample_index, axis, sample, scales, result, 1);
            }
            Err(err) if err.is_fatal() => return Err(err),
            Ok(result) => result.message,
            Err(err) => err.to_string(),
        };

        tracing::warn!(sample = sample_index, reason = %reason, "retrying sample from a fresh guess");
        let own_scales = self
            .config
            .scales
            .unwrap_or_else(|| Scales::from_sample(axis, sample));
        let budget = self
            .config
            .solver
            .scaled_budget(self.config.retry_iteration_factor, self.index.size());

        match self.attempt(axis, sample, own_scales, None, &budget) {
            Ok(result) if result.success => {
                self.converged(sample_index, axis, sample, own_scales, result, 2)
            }
            Err(err) if err.is_fatal() => Err(err),
            Ok(result) => Ok(self.failed(sample_index, own_scales, Some(&result), result.message.clone())),
            Err(err) => Ok(self.failed(sample_index, own_scales, None, err.to_string())),
        }
    }

    fn model<'a>(
        &'a self,
        axis: &'a Array1<f64>,
        sample: ArrayView1<'a, f64>,
        scales: Scales,
    ) -> Result<SpectralModel<'a>> {
        Ok(SpectralModel::new(&self.index, &self.table, axis, sample, scales)?
            .with_jacobian_mode(self.config.jacobian))
    }

    fn attempt(
        &self,
        axis: &Array1<f64>,
        sample: ArrayView1<'_, f64>,
        scales: Scales,
        seed: Option<Array1<f64>>,
        solver: &LmConfig,
    ) -> Result<LmResult> {
        scales.validate()?;
        let model = self.model(axis, sample.view(), scales)?;
        let mut x0 = match seed {
            Some(x) => x,
            None => initial_guess(
                &self.index,
                self.table.wavelengths(),
                axis,
                sample,
                &scales,
                &self.config.guess,
                &self.amplitude_factors,
            ),
        };
        clip_to_bounds(&mut x0, &self.bounds);
        BoundedLevenbergMarquardt::with_config(solver.clone()).minimize(&model, x0, &self.bounds)
    }

    fn converged(
        &self,
        sample_index: usize,
        axis: &Array1<f64>,
        sample: ArrayView1<'_, f64>,
        scales: Scales,
        result: LmResult,
        attempts: usize,
    ) -> Result<SampleFit> {
        let model = self.model(axis, sample.view(), scales)?;
        let detail = if self.config.store_model || self.config.store_detail {
            Some(model.detail(&result.params)?)
        } else {
            None
        };
        let fitted = detail
            .as_ref()
            .filter(|_| self.config.store_model)
            .map(|d| d.sum_axis(ndarray::Axis(1)));

        tracing::debug!(
            sample = sample_index,
            attempts,
            cost = result.cost,
            iterations = result.iterations,
            func_evals = result.func_evals,
            termination = result.status.code(),
            "sample converged"
        );

        Ok(SampleFit {
            status: SampleStatus::Converged,
            scales,
            quantities: self.extractor().extract(&result.params, &scales),
            diagnostics: Diagnostics {
                cost: result.cost,
                iterations: result.iterations,
                func_evals: result.func_evals,
                jac_evals: result.jac_evals,
                termination: result.status.code(),
                message: result.message,
                attempts,
            },
            model: fitted,
            detail: detail.filter(|_| self.config.store_detail),
            solution: result.params,
        })
    }

    fn failed(
        &self,
        sample_index: usize,
        scales: Scales,
        result: Option<&LmResult>,
        message: String,
    ) -> SampleFit {
        tracing::warn!(sample = sample_index, reason = %message, "sample failed after retry");
        SampleFit {
            status: SampleStatus::Failed,
            scales,
            solution: Array1::from_elem(self.index.size(), f64::NAN),
            quantities: self.extractor().failed(),
            diagnostics: Diagnostics {
                cost: result.map_or(f64::NAN, |r| r.cost),
                iterations: result.map_or(0, |r| r.iterations),
                func_evals: result.map_or(0, |r| r.func_evals),
                jac_evals: result.map_or(0, |r| r.jac_evals),
                termination: result.map_or(-1, |r| r.status.code()),
                message,
                attempts: 2,
            },
            model: None,
            detail: None,
        }
    }
}

/// Fit a batch of spectra in one call.
///
/// Without a window, the lines inside the wavelength axis are used.
pub fn fit(
    catalog: &LineCatalog,
    spectra: &Spectra,
    window: Option<WavelengthWindow>,
    constraints: &ConstraintSet,
    config: FitConfig,
) -> Result<BatchResult> {
    let window = window.unwrap_or_else(|| {
        let axis = spectra.wavelength();
        WavelengthWindow::new(axis[0], axis[axis.len() - 1])
    });
    SpectralFitter::new(catalog, window, constraints, config)?.fit(spectra)
}
