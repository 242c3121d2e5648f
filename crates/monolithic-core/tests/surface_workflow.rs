//! End-to-end tests: synthetic surface → form removal → statistics → PSD.

use monolithic_core::{
    meshgrid, psd_1d, psd_2d, remove_polynomials, remove_surface, rmse, Axis, DisplayUnits,
    Grid, SurfaceSummary, WindowKind,
};

const PIXEL: f64 = 5e-6;

/// A tilted flat with a single sinusoidal ripple of 40 µm period.
fn tilted_ripple(n: usize) -> (Grid, Grid, Grid) {
    let axis: Vec<f64> = (0..n).map(|i| i as f64 * PIXEL).collect();
    let (x, y) = meshgrid(&axis, &axis);
    let period = 40e-6;
    let z = x
        .zip_map(&y, |xi, yi| {
            3e-5 * xi - 1e-5 * yi + 2e-9 * (2.0 * std::f64::consts::PI * xi / period).sin()
        })
        .unwrap();
    (x, y, z)
}

#[test]
fn test_tilt_removal_leaves_ripple() {
    let (x, y, z) = tilted_ripple(64);
    let fit = remove_surface(&x, &y, &z).unwrap();
    let rms = rmse(fit.residual.as_slice()).unwrap();
    // a sine of amplitude A has RMS A / sqrt(2)
    let expected = 2e-9 / 2f64.sqrt();
    assert!((rms - expected).abs() < 0.05 * expected, "rms = {rms}");
}

#[test]
fn test_polynomial_removal_mean_is_zero() {
    let (x, y, mut z) = tilted_ripple(32);
    *z.get_mut(5, 7).unwrap() = f64::NAN;
    *z.get_mut(20, 1).unwrap() = f64::NAN;
    let fit = remove_polynomials(&x, &y, &z, 1).unwrap();
    let finite: Vec<f64> = fit.residual.iter().copied().filter(|v| v.is_finite()).collect();
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    assert!(mean.abs() <= 1e-15);
    assert_eq!(finite.len(), 32 * 32 - 2);
}

#[test]
fn test_psd_peaks_at_ripple_frequency() {
    let (x, y, z) = tilted_ripple(64);
    let residual = remove_surface(&x, &y, &z).unwrap().residual;
    let psd = psd_1d(&residual, PIXEL, Axis::X, WindowKind::Welch).unwrap();

    let (peak, _) = psd
        .c
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, 0.0), |(bi, bv), (i, v)| if *v > bv { (i, *v) } else { (bi, bv) });
    // 64 samples of 5 µm span 320 µm, so a 40 µm period lands on bin 8
    assert_eq!(peak, 8);
    assert!((psd.q[peak] - 1.0 / 40e-6).abs() < 1.0);
}

#[test]
fn test_psd_2d_of_cropped_region() {
    let (x, y, z) = tilted_ripple(48);
    let residual = remove_surface(&x, &y, &z).unwrap().residual;
    let crop = residual.subgrid(8..40, 8..40).unwrap();
    let psd = psd_2d(&crop, PIXEL, WindowKind::Hann).unwrap();
    assert_eq!(psd.c_2d.shape(), (32, 32));
    assert!(psd.mean_square() > 0.0);
}

#[test]
fn test_summary_of_residual() {
    let (x, y, z) = tilted_ripple(32);
    let fit = remove_surface(&x, &y, &z).unwrap();
    let summary =
        SurfaceSummary::new("Residual", &x, &y, &fit.residual, DisplayUnits::default()).unwrap();
    let text = summary.to_string();
    assert!(text.starts_with("Residual: PV = "));
    assert!(text.ends_with(" nm"));
    assert!(summary.stats.pv > 3.0 && summary.stats.pv < 5.0);
}
