//! End-to-end compositing from cached image files.

use compositor::{CompositeJob, Compositor, Diagnostics, ProjectionOptions, Projector};
use cloudmap_common::OutputGrid;
use test_utils::{assert_slices_approx_eq, dundee_satellites, encode_png, temp_test_dir};

fn write_jobs(dir: &std::path::Path) -> Vec<CompositeJob> {
    dundee_satellites()
        .into_iter()
        .enumerate()
        .map(|(i, source)| {
            let path = dir.join(format!("{}.png", source.name));
            std::fs::write(&path, encode_png(96, 96, 40 + 40 * i as u8)).unwrap();
            CompositeJob::new(source, path)
        })
        .collect()
}

#[test]
fn test_five_satellites_cover_the_globe() {
    let dir = temp_test_dir();
    let jobs = write_jobs(dir.path());
    let grid = OutputGrid::new(256, 128).unwrap();
    let projector = Projector::new(ProjectionOptions::new(grid));

    let composite = Compositor::new(grid, 1).run(&jobs, &projector).unwrap();

    // Every column has a healthy total weight from neighbouring kernels
    let min_weight = composite.weight_sum.row(64).iter().cloned().fold(f32::INFINITY, f32::min);
    assert!(min_weight > 0.05, "min weight {}", min_weight);

    // Under MSG3 (third source, value 120) the composite is MSG3's value
    let col = 128;
    let value = composite.raster.get(64, col);
    assert!((value - 120.0).abs() < 0.5, "value under MSG3 = {}", value);
}

#[test]
fn test_parallel_run_matches_sequential_with_real_projector() {
    let dir = temp_test_dir();
    let jobs = write_jobs(dir.path());
    let grid = OutputGrid::new(180, 90).unwrap();
    let projector = Projector::new(ProjectionOptions::new(grid));

    let sequential = Compositor::new(grid, 1).run(&jobs, &projector).unwrap();
    let parallel = Compositor::new(grid, 4).run(&jobs, &projector).unwrap();

    assert_slices_approx_eq!(sequential.raster.data(), parallel.raster.data(), 1e-3);
}

#[test]
fn test_diagnostics_written_for_each_source() {
    let dir = temp_test_dir();
    let jobs = write_jobs(dir.path());
    let grid = OutputGrid::new(72, 36).unwrap();
    let projector = Projector::new(ProjectionOptions::new(grid));
    let debug_dir = dir.path().join("debug");

    Compositor::new(grid, 2)
        .with_diagnostics(Some(Diagnostics::new(&debug_dir)))
        .run(&jobs, &projector)
        .unwrap();

    for n in 1..=jobs.len() {
        assert!(debug_dir.join(format!("image_{}.jpeg", n)).exists());
        assert!(debug_dir.join(format!("weight_{}.jpeg", n)).exists());
    }
    assert!(debug_dir.join("weight_sum.jpeg").exists());
    assert!(debug_dir.join("composite.jpeg").exists());
}
