use approx::assert_relative_eq;
use ndarray::{Array1, Array2, array, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use shmt::multitaper::weights::solve_minimum_variance;
use shmt::transform::{cross_power, power};
use shmt::{
    CondonShortley, CovarianceMode, HarmonicConvention, MultitaperError, Normalization,
    QuadratureCache, ShCoeffs, SolverOptions, SolverOutputs, TaperBank, multitaper_cross_spectrum,
    multitaper_spectrum, optimal_taper_weights, spherical_cap_tapers, taper_covariance,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_coeffs(lmax: usize, seed: u64) -> ShCoeffs {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut coeffs = ShCoeffs::zeros(lmax);
    for l in 0..=lmax {
        let amplitude = 1.0 / (1.0 + l as f64);
        for m in 0..=l {
            coeffs.set(0, l, m, amplitude * normal.sample(&mut rng));
            if m > 0 {
                coeffs.set(1, l, m, amplitude * normal.sample(&mut rng));
            }
        }
    }
    coeffs
}

fn cap_bank(theta0: f64, lmax: usize) -> TaperBank {
    spherical_cap_tapers(theta0, lmax).unwrap().bank().unwrap()
}

#[test]
fn optimal_variance_is_bounded_by_equal_weighting() {
    init_logging();
    let bank = cap_bank(45.0, 4);
    let sff = Array1::from_iter((0..20).map(|l| (-(l as f64) / 6.0).exp()));
    let mut cache = QuadratureCache::new();
    let solution = optimal_taper_weights(
        &bank,
        6,
        12,
        sff.view(),
        &SolverOptions::default(),
        &HarmonicConvention::default(),
        &mut cache,
    )
    .unwrap();

    let weights = solution.weight_opt.as_ref().unwrap();
    for k in 1..=6 {
        assert!(solution.var_opt[k - 1] <= solution.var_unit[k - 1] * (1.0 + 1e-10));
        assert_relative_eq!(weights.column(k - 1).sum(), 1.0, epsilon = 1e-10);
    }
    assert_eq!(solution.unweighted_covar.as_ref().unwrap().dim(), (6, 6));
}

#[test]
fn proportional_identity_covariance_gives_equal_weights() {
    let f = Array2::<f64>::eye(4) * 3.0;
    let solution = solve_minimum_variance(f.view(), 4, SolverOutputs::all(), 1e-12).unwrap();
    for k in 1..=4 {
        assert_relative_eq!(solution.var_opt[k - 1], solution.var_unit[k - 1], max_relative = 1e-14);
        for &w in solution.weights_for(k).unwrap().iter() {
            assert_relative_eq!(w, 1.0 / k as f64, epsilon = 1e-14);
        }
    }
}

#[test]
fn diagonal_mode_matches_full_mode_on_its_own_diagonal() {
    init_logging();
    let bank = cap_bank(60.0, 3);
    let sff = Array1::from_elem(14, 1.0);
    let convention = HarmonicConvention::default();
    let mut cache = QuadratureCache::new();

    let full = taper_covariance(&bank, 4, 10, sff.view(), CovarianceMode::Full, &convention, &mut cache)
        .unwrap();
    let options = SolverOptions {
        mode: CovarianceMode::DiagonalOnly,
        ..SolverOptions::default()
    };
    let diagonal =
        optimal_taper_weights(&bank, 4, 10, sff.view(), &options, &convention, &mut cache).unwrap();

    let covar = diagonal.unweighted_covar.as_ref().unwrap();
    let mut expected = Array2::<f64>::zeros((4, 4));
    for i in 0..4 {
        expected[[i, i]] = full[[i, i]];
        for j in 0..4 {
            if i != j {
                assert_eq!(covar[[i, j]], 0.0);
            }
        }
    }
    let reference = solve_minimum_variance(expected.view(), 4, SolverOutputs::all(), 1e-12).unwrap();
    for k in 0..4 {
        assert_relative_eq!(diagonal.var_opt[k], reference.var_opt[k], max_relative = 1e-12);
        assert_relative_eq!(diagonal.var_unit[k], reference.var_unit[k], max_relative = 1e-12);
    }
}

#[test]
fn single_constant_taper_reproduces_unwindowed_cross_power() {
    init_logging();
    let f = random_coeffs(12, 11);
    let g = random_coeffs(10, 12);
    for (normalization, constant) in [
        (Normalization::Geodesy, 1.0),
        (Normalization::Orthonormal, (4.0 * std::f64::consts::PI).sqrt()),
        (Normalization::Schmidt, 1.0),
    ] {
        let convention = HarmonicConvention::new(normalization, CondonShortley::Include);
        let bank = TaperBank::from_packed(array![[constant]].view(), 0).unwrap();
        let mut cache = QuadratureCache::new();

        let cross = multitaper_cross_spectrum(&f, &g, &bank, 1, None, &convention, &mut cache).unwrap();
        let expected = cross_power(&f, &g, 10).unwrap();
        assert_eq!(cross.estimate.len(), 11);
        for (a, b) in cross.estimate.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10, max_relative = 1e-9);
        }
        assert!(cross.standard_error.is_none());

        let auto = multitaper_spectrum(&f, &bank, 1, None, &convention, &mut cache).unwrap();
        let expected = power(&f, 12).unwrap();
        for (a, b) in auto.estimate.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10, max_relative = 1e-9);
        }
    }
}

#[test]
fn uniform_weights_reproduce_the_unweighted_estimate() {
    init_logging();
    let f = random_coeffs(14, 21);
    let g = random_coeffs(14, 22);
    let bank = cap_bank(50.0, 4);
    let convention = HarmonicConvention::default();
    let mut cache = QuadratureCache::new();
    let k = 5;

    let unweighted = multitaper_cross_spectrum(&f, &g, &bank, k, None, &convention, &mut cache).unwrap();
    let uniform = Array1::from_elem(k, 1.0 / k as f64);
    let weighted =
        multitaper_cross_spectrum(&f, &g, &bank, k, Some(uniform.view()), &convention, &mut cache)
            .unwrap();

    assert_eq!(unweighted.lmax(), 10);
    let (se_a, se_b) = (
        unweighted.standard_error.as_ref().unwrap(),
        weighted.standard_error.as_ref().unwrap(),
    );
    for l in 0..=10 {
        assert_relative_eq!(unweighted.estimate[l], weighted.estimate[l], epsilon = 1e-13, max_relative = 1e-11);
        assert_relative_eq!(se_a[l], se_b[l], epsilon = 1e-13, max_relative = 1e-9);
    }
    assert_eq!(cache.rebuilds(), 1);
}

#[test]
fn single_taper_estimates_have_no_standard_error() {
    let f = random_coeffs(8, 31);
    let bank = cap_bank(30.0, 3);
    let convention = HarmonicConvention::default();
    let mut cache = QuadratureCache::new();
    let unweighted = multitaper_spectrum(&f, &bank, 1, None, &convention, &mut cache).unwrap();
    let weighted =
        multitaper_spectrum(&f, &bank, 1, Some(array![1.0, 0.0].view()), &convention, &mut cache)
            .unwrap();
    assert!(unweighted.standard_error.is_none());
    assert!(weighted.standard_error.is_none());
    assert_eq!(unweighted.estimate, weighted.estimate);
}

#[test]
fn optimal_weights_feed_the_estimator() {
    init_logging();
    let bank = cap_bank(40.0, 4);
    let f = random_coeffs(16, 41);
    let sff = power(&f, 16).unwrap();
    let convention = HarmonicConvention::default();
    let mut cache = QuadratureCache::new();

    let solution =
        optimal_taper_weights(&bank, 4, 8, sff.slice(s![..13]), &SolverOptions::default(), &convention, &mut cache)
            .unwrap();
    let weights = solution.weights_for(4).unwrap();
    let estimate = multitaper_spectrum(&f, &bank, 4, Some(weights), &convention, &mut cache).unwrap();
    assert_eq!(estimate.lmax(), 12);
    assert!(estimate.estimate.iter().all(|value| value.is_finite()));
}

#[test]
fn bandwidth_violations_are_reported() {
    let f = random_coeffs(4, 51);
    let bank = cap_bank(30.0, 4);
    let mut cache = QuadratureCache::new();
    assert!(matches!(
        multitaper_spectrum(&f, &bank, 1, None, &HarmonicConvention::default(), &mut cache),
        Err(MultitaperError::InvalidBandwidth { taper_lmax: 4, signal_lmax: 4 })
    ));
}

#[test]
fn flat_spectrum_end_to_end() {
    init_logging();
    let (degree, taper_lmax, kmax) = (20, 5, 10);
    let caps = spherical_cap_tapers(90.0, taper_lmax).unwrap();
    let bank = caps.bank().unwrap();
    let sff = Array1::from_elem(degree + taper_lmax + 1, 1.0);
    let mut cache = QuadratureCache::new();
    let solution = optimal_taper_weights(
        &bank,
        kmax,
        degree,
        sff.view(),
        &SolverOptions::default(),
        &HarmonicConvention::default(),
        &mut cache,
    )
    .unwrap();

    assert_eq!(solution.kmax(), kmax);
    // Every added taper carries fresh information on a flat spectrum.
    for k in 2..=kmax {
        assert!(
            solution.var_opt[k - 1] < 0.99 * solution.var_opt[k - 2],
            "var_opt did not drop at k = {k}: {} vs {}",
            solution.var_opt[k - 1],
            solution.var_opt[k - 2]
        );
    }
    assert!(solution.var_opt[kmax - 1] < 0.25 * solution.var_opt[0]);

    let mut largest_departure: f64 = 0.0;
    for k in 1..=kmax {
        let (opt, unit) = (solution.var_opt[k - 1], solution.var_unit[k - 1]);
        assert!(opt <= unit * (1.0 + 1e-10));
        // Near-equal taper variances leave little to gain over equal weights.
        assert!(unit <= 1.05 * opt, "k = {k}: unit {unit} vs optimal {opt}");

        let weights = solution.weights_for(k).unwrap();
        assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-10);
        let uniform = 1.0 / k as f64;
        let departure = weights.iter().map(|w| (w - uniform).abs()).fold(0.0, f64::max) * k as f64;
        assert!(departure <= 0.5, "k = {k}: weights depart from 1/k by {departure}");
        largest_departure = largest_departure.max(departure);

        let effective = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();
        assert!(effective >= 0.9 * k as f64, "k = {k}: effective taper count {effective}");
    }
    assert_eq!(solution.weights_for(1).unwrap()[0], 1.0);
    assert!(largest_departure > 0.05, "optimal weights stayed uniform");
}
