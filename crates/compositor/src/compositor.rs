//! Weighted fan-out/fan-in compositing of all sources.

use std::sync::mpsc;
use std::time::Instant;

use tracing::{debug, info, warn};

use cloudmap_common::{CloudmapError, OutputGrid, Raster, Result};

use crate::diagnostics::Diagnostics;
use crate::projector::{CompositeJob, Projected, SourceProjector};

/// Running `weighted_sum` / `weight_sum` accumulators of one run.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    weighted_sum: Raster,
    weight_sum: Raster,
    contributions: usize,
}

impl CompositeResult {
    pub fn new(grid: OutputGrid) -> Self {
        Self {
            weighted_sum: Raster::zeros(grid.width, grid.height),
            weight_sum: Raster::zeros(grid.width, grid.height),
            contributions: 0,
        }
    }

    /// Add one projected source.
    pub fn accumulate(&mut self, satellite: &str, projected: &Projected) -> Result<()> {
        if !projected.image.same_shape(&self.weighted_sum)
            || !projected.weight.same_shape(&self.weight_sum)
        {
            return Err(CloudmapError::projection(
                satellite,
                format!(
                    "projected rasters {:?}/{:?} do not match output grid {:?}",
                    projected.image.dimensions(),
                    projected.weight.dimensions(),
                    self.weight_sum.dimensions()
                ),
            ));
        }

        let sums = self.weighted_sum.data_mut().iter_mut().zip(self.weight_sum.data_mut());
        let inputs = projected.image.data().iter().zip(projected.weight.data());
        for ((ws, w_sum), (&v, &w)) in sums.zip(inputs) {
            *ws += v * w;
            *w_sum += w;
        }
        self.contributions += 1;
        Ok(())
    }

    pub fn contributions(&self) -> usize {
        self.contributions
    }

    pub fn weight_sum(&self) -> &Raster {
        &self.weight_sum
    }

    /// Divide the weighted sum by the weight sum, cell by cell.
    ///
    /// A non-positive weight sum anywhere is a fatal inconsistency.
    pub fn normalize(&self) -> Result<Raster> {
        let width = self.weight_sum.width();
        let mut output = self.weighted_sum.clone();

        for (i, (out, &w)) in output
            .data_mut()
            .iter_mut()
            .zip(self.weight_sum.data())
            .enumerate()
        {
            if !(w > 0.0) {
                return Err(CloudmapError::CompositeInconsistency {
                    row: i / width,
                    col: i % width,
                    weight: w,
                });
            }
            *out /= w;
        }
        Ok(output)
    }
}

/// Output of a compositing run.
#[derive(Debug, Clone)]
pub struct Composite {
    pub raster: Raster,
    pub weight_sum: Raster,
}

/// Runs the projector over every job and blends the results.
pub struct Compositor {
    grid: OutputGrid,
    workers: usize,
    diagnostics: Option<Diagnostics>,
}

impl Compositor {
    /// `workers == 1` runs sequentially on the calling thread.
    pub fn new(grid: OutputGrid, workers: usize) -> Self {
        Self {
            grid,
            workers: workers.max(1),
            diagnostics: None,
        }
    }

    /// Save intermediate rasters while compositing.
    pub fn with_diagnostics(mut self, diagnostics: Option<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Project every job and return the normalized composite.
    ///
    /// Any job failure aborts the run; no partial composite is returned.
    pub fn run<P: SourceProjector>(&self, jobs: &[CompositeJob], projector: &P) -> Result<Composite> {
        if jobs.is_empty() {
            return Err(CloudmapError::config("nothing to composite"));
        }

        let start = Instant::now();
        let mut result = CompositeResult::new(self.grid);

        if self.workers == 1 || jobs.len() == 1 {
            for (index, job) in jobs.iter().enumerate() {
                let projected = projector.project(job)?;
                self.fold(&mut result, index, job, &projected)?;
            }
        } else {
            self.run_parallel(jobs, projector, &mut result)?;
        }

        let raster = result.normalize()?;
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.save_summary(&result.weight_sum, &raster);
        }

        info!(
            sources = result.contributions(),
            workers = self.workers,
            width = self.grid.width,
            height = self.grid.height,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Composite complete"
        );

        Ok(Composite {
            raster,
            weight_sum: result.weight_sum,
        })
    }

    /// Fan jobs out to a bounded pool; fold results on this thread as
    /// they arrive.
    fn run_parallel<P: SourceProjector>(
        &self,
        jobs: &[CompositeJob],
        projector: &P,
        result: &mut CompositeResult,
    ) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.min(jobs.len()))
            .thread_name(|i| format!("cloudmap-project-{}", i))
            .build()
            .map_err(|e| CloudmapError::config(format!("failed to build worker pool: {}", e)))?;

        let (tx, rx) = mpsc::channel::<(usize, Result<Projected>)>();
        let mut first_error: Option<CloudmapError> = None;

        pool.in_place_scope(|scope| {
            for (index, job) in jobs.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let _ = tx.send((index, projector.project(job)));
                });
            }
            drop(tx);

            for (index, outcome) in rx.iter() {
                let job = &jobs[index];
                if first_error.is_some() {
                    continue;
                }
                let folded = outcome.and_then(|projected| self.fold(result, index, job, &projected));
                if let Err(e) = folded {
                    warn!(satellite = %job.source.name, error = %e, "Source failed, aborting composite");
                    first_error = Some(e);
                }
            }
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fold(
        &self,
        result: &mut CompositeResult,
        index: usize,
        job: &CompositeJob,
        projected: &Projected,
    ) -> Result<()> {
        debug!(satellite = %job.source.name, index, "Accumulating projected source");
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.save_source(index + 1, projected);
        }
        result.accumulate(&job.source.name, projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::weight_raster;
    use std::collections::HashMap;
    use test_utils::{assert_slices_approx_eq, column_gradient_raster, constant_raster, dundee_source};

    /// Returns fixed per-source image rasters with real trust weights.
    struct FixedProjector {
        grid: OutputGrid,
        images: HashMap<String, Raster>,
        fail: Option<String>,
    }

    impl FixedProjector {
        fn new(grid: OutputGrid) -> Self {
            Self {
                grid,
                images: HashMap::new(),
                fail: None,
            }
        }

        fn with(mut self, name: &str, image: Raster) -> Self {
            self.images.insert(name.to_string(), image);
            self
        }
    }

    impl SourceProjector for FixedProjector {
        fn project(&self, job: &CompositeJob) -> Result<Projected> {
            if self.fail.as_deref() == Some(job.source.name.as_str()) {
                return Err(CloudmapError::projection(&job.source.name, "boom"));
            }
            let image = self.images[&job.source.name].clone();
            let weight = weight_raster(&job.source, self.grid, 55.0);
            Ok(Projected { image, weight })
        }
    }

    fn jobs(specs: &[(&str, f64)]) -> Vec<CompositeJob> {
        specs
            .iter()
            .map(|&(name, lon)| CompositeJob::new(dundee_source(name, lon), "unused"))
            .collect()
    }

    fn three_source_setup(grid: OutputGrid) -> (Vec<CompositeJob>, FixedProjector) {
        let jobs = jobs(&[("WEST", -90.0), ("MID", 0.0), ("EAST", 90.0)]);
        let mut shifted = column_gradient_raster(grid);
        shifted.map_in_place(|v| 255.0 - v);
        let projector = FixedProjector::new(grid)
            .with("WEST", column_gradient_raster(grid))
            .with("MID", constant_raster(grid, 120.0))
            .with("EAST", shifted);
        (jobs, projector)
    }

    #[test]
    fn test_constant_inputs_give_constant_output() {
        let grid = OutputGrid::new(361, 5).unwrap();
        let jobs = jobs(&[("WEST", -90.0), ("MID", 0.0), ("EAST", 90.0)]);
        let projector = FixedProjector::new(grid)
            .with("WEST", constant_raster(grid, 200.0))
            .with("MID", constant_raster(grid, 200.0))
            .with("EAST", constant_raster(grid, 200.0));

        let composite = Compositor::new(grid, 1).run(&jobs, &projector).unwrap();
        assert!(composite.raster.data().iter().all(|&v| (v - 200.0).abs() < 1e-3));
    }

    #[test]
    fn test_blend_at_45_degrees_leans_towards_nearer_source() {
        let grid = OutputGrid::new(361, 3).unwrap();
        let jobs = jobs(&[("WEST", -90.0), ("MID", 0.0), ("EAST", 90.0)]);
        let projector = FixedProjector::new(grid)
            .with("WEST", constant_raster(grid, 50.0))
            .with("MID", constant_raster(grid, 100.0))
            .with("EAST", constant_raster(grid, 200.0));

        let composite = Compositor::new(grid, 1).run(&jobs, &projector).unwrap();

        // First column east of 45 degrees
        let col = grid
            .column_longitudes()
            .iter()
            .position(|&lon| lon > 45.0)
            .unwrap();
        let value = composite.raster.get(1, col);
        assert!(value > 100.0 && value < 200.0, "value = {}", value);
        assert!(value > 150.0, "expected weighting towards the 90 degree source, got {}", value);
    }

    #[test]
    fn test_order_invariance() {
        let grid = OutputGrid::new(180, 8).unwrap();
        let (jobs, projector) = three_source_setup(grid);
        let compositor = Compositor::new(grid, 1);

        let forward = compositor.run(&jobs, &projector).unwrap();
        let mut reversed_jobs = jobs.clone();
        reversed_jobs.reverse();
        let reversed = compositor.run(&reversed_jobs, &projector).unwrap();
        let rotated_jobs: Vec<_> = jobs[1..].iter().chain(&jobs[..1]).cloned().collect();
        let rotated = compositor.run(&rotated_jobs, &projector).unwrap();

        assert_slices_approx_eq!(forward.raster.data(), reversed.raster.data(), 1e-3);
        assert_slices_approx_eq!(forward.raster.data(), rotated.raster.data(), 1e-3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let grid = OutputGrid::new(180, 8).unwrap();
        let (jobs, projector) = three_source_setup(grid);

        let sequential = Compositor::new(grid, 1).run(&jobs, &projector).unwrap();
        for workers in [2, 3, 8] {
            let parallel = Compositor::new(grid, workers).run(&jobs, &projector).unwrap();
            assert_slices_approx_eq!(sequential.raster.data(), parallel.raster.data(), 1e-3);
            assert_slices_approx_eq!(sequential.weight_sum.data(), parallel.weight_sum.data(), 1e-6);
        }
    }

    #[test]
    fn test_failure_aborts_run() {
        let grid = OutputGrid::new(36, 4).unwrap();
        let (jobs, mut projector) = three_source_setup(grid);
        projector.fail = Some("MID".to_string());

        for workers in [1, 3] {
            let err = Compositor::new(grid, workers).run(&jobs, &projector).unwrap_err();
            assert_eq!(err.satellite(), Some("MID"));
        }
    }

    #[test]
    fn test_non_positive_weight_is_inconsistency() {
        let grid = OutputGrid::new(4, 2).unwrap();
        let mut result = CompositeResult::new(grid);
        let mut weight = Raster::filled(4, 2, 1.0);
        weight.set(1, 2, 0.0);
        result
            .accumulate("X", &Projected { image: Raster::filled(4, 2, 10.0), weight })
            .unwrap();

        let err = result.normalize().unwrap_err();
        assert!(matches!(err, CloudmapError::CompositeInconsistency { row: 1, col: 2, .. }));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut result = CompositeResult::new(OutputGrid::new(4, 2).unwrap());
        let projected = Projected {
            image: Raster::zeros(3, 2),
            weight: Raster::zeros(3, 2),
        };
        assert!(result.accumulate("X", &projected).is_err());
    }
}
