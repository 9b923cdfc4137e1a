// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

const EQT: f64 = 1.0e-15;

#[test]
fn sign_eqt_bands() {
    assert_eq!(sign_eqt(3.0, EQT), 1);
    assert_eq!(sign_eqt(-3.0, EQT), -1);
    assert_eq!(sign_eqt(1.0e-16, EQT), 0);
    assert_eq!(sign_eqt(-1.0e-16, EQT), 0);
}

#[test]
fn quadratic_two_roots() {
    // (x - 6)(x - 2) = x^2 - 8x + 12
    let r = solve_quadratic(1.0, -8.0, 12.0, EQT);
    assert_eq!(r.nroots, 2);
    assert_abs_diff_eq!(r.x1, 6.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r.x2, 2.0, epsilon = 1e-12);
}

#[test]
fn quadratic_double_root() {
    let r = solve_quadratic(1.0, -4.0, 4.0, EQT);
    assert_eq!(r.nroots, 1);
    assert_abs_diff_eq!(r.x1, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r.x2, 2.0, epsilon = 1e-12);
}

#[test]
fn quadratic_no_real_roots() {
    let r = solve_quadratic(1.0, 0.0, 1.0, EQT);
    assert_eq!(r.nroots, 0);
}

#[test]
fn quadratic_linear_fallback() {
    let r = solve_quadratic(0.0, 2.0, -6.0, EQT);
    assert_eq!(r.nroots, 1);
    assert_abs_diff_eq!(r.x1, 3.0, epsilon = 1e-12);
}

#[test]
fn quadratic_symmetric_roots_with_zero_b() {
    let r = solve_quadratic(1.0, 0.0, -9.0, EQT);
    assert_eq!(r.nroots, 2);
    assert_abs_diff_eq!(r.x1, 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r.x2, -3.0, epsilon = 1e-12);
}

#[test]
fn fitpoint_modes() {
    assert_abs_diff_eq!(
        fitpoint(1.5, 1.0, 10.0, 2.0, 20.0, AxisMode::Lin, AxisMode::Lin),
        15.0,
        epsilon = 1e-12
    );
    // lin-log interpolation is the geometric mean at the midpoint
    assert_abs_diff_eq!(
        fitpoint(1.5, 1.0, 4.0, 2.0, 16.0, AxisMode::Lin, AxisMode::Log),
        8.0,
        epsilon = 1e-12
    );
}

#[test]
fn nearest_picks_closest_and_clamps() {
    let v = [1.0, 2.0, 4.0, 8.0];
    assert_eq!(nearest(2.9, &v), 1);
    assert_eq!(nearest(3.1, &v), 2);
    assert_eq!(nearest(-5.0, &v), 0);
    assert_eq!(nearest(100.0, &v), 3);
    // tie resolves low
    assert_eq!(nearest(3.0, &v), 1);
}

#[test]
fn nearest_exh_argmin() {
    let v = [5.0, -1.0, 2.0, -0.5];
    assert_eq!(nearest_exh(0.0, |i| v[i], v.len()), 3);
}

#[test]
fn gaussian_value() {
    assert_abs_diff_eq!(
        gaussian(2.0, 4.0, 3.0),
        0.10648266850745075,
        epsilon = 1e-15
    );
}

#[test]
fn planckian_properties() {
    assert_eq!(planckian(3.0, 0.0), 0.0);
    assert_eq!(planckian(3.0, -1.0), 0.0);
    assert!(planckian(3.0, 1.0) > 0.0);
    // hv^3 / (exp(hv/T) - 1) at hv = T = 1
    assert_abs_diff_eq!(
        planckian(1.0, 1.0),
        crate::constants::PLANCK_F / (std::f64::consts::E - 1.0),
        epsilon = 1e-9
    );
}

#[test]
fn syngrids_lin_lin() {
    let xin = [2.0, 7.0, 9.0];
    let yin = [3.0, 8.0, 6.0];
    let xout = [1.0, 2.0, 3.0, 7.0, 8.0, 8.9, 9.0, 10.0];
    let yout = syngrids(&xin, &yin, AxisMode::Lin, AxisMode::Lin, &xout);
    let expected = [3.0, 3.0, 4.0, 8.0, 7.0, 6.1, 6.0, 6.0];
    for (a, e) in yout.iter().zip(expected) {
        assert_abs_diff_eq!(*a, e, epsilon = 1e-12);
    }
}

#[test]
fn syngrids_empty_input_is_zero() {
    let xout = [1.0, 2.0, 3.0];
    let yout = syngrids(&[], &[], AxisMode::Lin, AxisMode::Lin, &xout);
    assert!(yout.iter().all(|&y| y == 0.0));
}

#[test]
fn convolution_size_mismatch() {
    let e = convolution(0.0, &[0.0; 6], &[0.0; 5], &[0.0; 8], 8).unwrap_err();
    assert_eq!(e.nxin, 6);
    assert_eq!(e.nyin, 5);
    assert_eq!(e.nxout, 8);
    assert_eq!(e.nyout, 8);
}

#[test]
fn convolution_zero_fwhm_resamples_log() {
    let xin = [2.0, 7.0, 9.0];
    let yin = [3.0, 8.0, 6.0];
    let xout = [8.0];
    let yout = convolution(0.0, &xin, &yin, &xout, 1).unwrap();
    // lin-log midpoint between (7, 8) and (9, 6)
    assert_abs_diff_eq!(yout[0], 8.0 * (6.0f64 / 8.0).sqrt(), epsilon = 1e-9);
}

#[test]
fn convolution_preserves_flat_spectrum() {
    let x: Vec<f64> = (0..51).map(|i| i as f64 * 0.2).collect();
    let y = vec![1.0; 51];
    let out = convolution(1.0, &x, &y, &x, 51).unwrap();
    for v in out {
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-9);
    }
}

#[test]
fn integrate_trapezoid_interval() {
    let x = [0.0, 1.0, 2.0, 3.0];
    let y = [0.0, 2.0, 4.0, 6.0]; // y = 2x
    assert_abs_diff_eq!(integrate_trapezoid(0.0, 3.0, &x, &y), 9.0, epsilon = 1e-12);
    assert_abs_diff_eq!(integrate_trapezoid(3.0, 0.0, &x, &y), -9.0, epsilon = 1e-12);
    assert_eq!(integrate_trapezoid(1.0, 1.0, &x, &y), 0.0);
}

#[test]
fn indexing_round_trip() {
    let dim = [2usize, 3, 4];
    let n: usize = dim.iter().product();
    for j in 0..n {
        let indx = one_to_many(&dim, j).unwrap();
        assert_eq!(many_to_one(&dim, &indx).unwrap(), j);
    }
}

#[test]
fn many_to_one_most_significant_first() {
    let dim = [2usize, 3, 4];
    assert_eq!(many_to_one(&dim, &[1, 2, 3]).unwrap(), 23);
    assert_eq!(many_to_one(&dim, &[0, 0, 1]).unwrap(), 1);
}

#[test]
fn many_to_one_errors() {
    let dim = [2usize, 3];
    assert_eq!(
        many_to_one(&dim, &[0, 0, 0]).unwrap_err(),
        IndexingError::RangeMismatch { ndim: 2, nindx: 3 }
    );
    assert_eq!(
        many_to_one(&dim, &[0, 3]).unwrap_err(),
        IndexingError::OutOfRange
    );
}

#[test]
fn two_to_one_round_trip() {
    let dim = [3usize, 1, 4];
    let total: usize = dim.iter().sum();
    for j in 0..total {
        let p = one_to_two(&dim, j).unwrap();
        assert_eq!(two_to_one(&dim, p).unwrap(), j);
    }
    assert!(one_to_two(&dim, total).is_err());
    assert!(matches!(
        two_to_one(&dim, (3, 0)).unwrap_err(),
        IndexingError::AxisOutOfRange { .. }
    ));
}

#[test]
fn ne_charge_neut_weighted_sum() {
    let fp = [0.25, 0.75];
    let zb = [4.0, 8.0];
    assert_abs_diff_eq!(ne_charge_neut(2.0, &fp, &zb), 14.0, epsilon = 1e-12);
}
