// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use indoc::indoc;

use super::*;

fn xyw_objective() -> Objective {
    Objective::new(
        "xyw",
        2.0,
        false,
        AxisMode::Lin,
        AxisMode::Lin,
        Some(vec![1.0, 2.0]),
        vec![4.0, 6.0],
        Some(vec![1.0, 5.0]),
    )
}

#[test]
fn chi2_and_fitness() {
    let obj = xyw_objective();
    // (2-4)^2 * 1 + (1-6)^2 * 5 = 4 + 125
    let a = [2.0, 1.0];
    assert_abs_diff_eq!(obj.get_chi2(&a).unwrap(), 129.0, epsilon = 1e-12);
    assert_abs_diff_eq!(obj.get_fitness(&a).unwrap(), -129.0, epsilon = 1e-12);
}

#[test]
fn fabs_metric_without_weights() {
    let obj = Objective::new(
        "yonly",
        1.0,
        false,
        AxisMode::Lin,
        AxisMode::Lin,
        None,
        vec![4.0, 6.0],
        None,
    );
    let a = [2.0, 9.0];
    assert_abs_diff_eq!(obj.get_fabs(&a).unwrap(), 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(obj.get_fitness(&a).unwrap(), -5.0, epsilon = 1e-12);
}

#[test]
fn size_mismatch_carries_both_sizes() {
    let obj = xyw_objective();
    match obj.get_chi2(&[1.0, 2.0, 3.0]) {
        Err(GoalError::RangeMismatch { size1, size2 }) => {
            assert_eq!(size1, 3);
            assert_eq!(size2, 2);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn resamples_onto_objective_abscissas() {
    let mut obj = xyw_objective();
    // detector grid finer than the objective's x: exact match after
    // linear interpolation means fitness 0
    let hv = [0.5, 1.0, 1.5, 2.0, 2.5];
    let ya = ArrDbl::from_vec(vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    let fit = obj.fit_eval(&hv, &ya).unwrap();
    assert_abs_diff_eq!(fit, 0.0, epsilon = 1e-12);
}

#[test]
fn xless_objective_recovers_from_length_mismatch() {
    let mut obj = Objective::new(
        "yonly",
        1.0,
        false,
        AxisMode::Lin,
        AxisMode::Lin,
        None,
        vec![1.0, 2.0, 3.0],
        None,
    );
    // six samples of the same linear ramp collapse onto three
    let hv = [0.0; 6];
    let ya = ArrDbl::from_vec(vec![1.0, 1.4, 1.8, 2.2, 2.6, 3.0]);
    let fit = obj.fit_eval(&hv, &ya).unwrap();
    assert_abs_diff_eq!(fit, 0.0, epsilon = 1e-12);
}

#[test]
fn rescale_chi2_closed_form() {
    let mut obj = Objective::new(
        "scaled",
        1.0,
        true,
        AxisMode::Lin,
        AxisMode::Lin,
        Some(vec![1.0, 2.0]),
        vec![4.0, 8.0],
        Some(vec![1.0, 1.0]),
    );
    // candidate is exactly half the target: s = 2 and a perfect fit
    let hv = [1.0, 2.0];
    let ya = ArrDbl::from_vec(vec![2.0, 4.0]);
    let fit = obj.fit_eval(&hv, &ya).unwrap();
    assert_abs_diff_eq!(fit, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(obj.last_scale, 2.0, epsilon = 1e-12);
}

#[test]
fn rescale_never_negative() {
    let mut obj = Objective::new(
        "anti",
        1.0,
        true,
        AxisMode::Lin,
        AxisMode::Lin,
        Some(vec![1.0, 2.0]),
        vec![-4.0, -8.0],
        Some(vec![1.0, 1.0]),
    );
    let hv = [1.0, 2.0];
    let ya = ArrDbl::from_vec(vec![2.0, 4.0]);
    obj.fit_eval(&hv, &ya).unwrap();
    assert_eq!(obj.last_scale, 0.0);
}

#[test]
fn objective_best_case_strict_improvement() {
    let mut obj = Objective::new(
        "peel",
        1.0,
        false,
        AxisMode::Lin,
        AxisMode::Lin,
        None,
        vec![5.0, 5.0],
        None,
    );
    let hv = [1.0, 2.0];
    obj.update_best(&hv, &ArrDbl::from_vec(vec![1.0, 1.0]), 0).unwrap();
    assert_eq!(obj.best_case(), 0);
    obj.update_best(&hv, &ArrDbl::from_vec(vec![5.0, 4.0]), 1).unwrap();
    assert_eq!(obj.best_case(), 1);
    // equal fitness does not displace the incumbent
    obj.update_best(&hv, &ArrDbl::from_vec(vec![4.0, 5.0]), 2).unwrap();
    assert_eq!(obj.best_case(), 1);
}

#[test]
fn goal_aggregate_best_case() {
    let mut goal = Goal::new(vec![
        Objective::new(
            "a",
            1.0,
            false,
            AxisMode::Lin,
            AxisMode::Lin,
            None,
            vec![1.0, 1.0],
            None,
        ),
        Objective::new(
            "b",
            3.0,
            false,
            AxisMode::Lin,
            AxisMode::Lin,
            None,
            vec![2.0, 2.0],
            None,
        ),
    ]);
    let hv = [1.0, 2.0];

    // case 0: mediocre everywhere
    goal.fit_eval("a", &hv, &ArrDbl::from_vec(vec![0.0, 0.0])).unwrap();
    goal.fit_eval("b", &hv, &ArrDbl::from_vec(vec![0.0, 0.0])).unwrap();
    goal.update_best(0);

    // case 1: perfect on the heavier objective
    goal.fit_eval("a", &hv, &ArrDbl::from_vec(vec![0.0, 0.0])).unwrap();
    goal.fit_eval("b", &hv, &ArrDbl::from_vec(vec![2.0, 2.0])).unwrap();
    goal.update_best(1);

    assert_eq!(goal.best_case(), 1);
    assert!(goal.best_fitness() > -14.0);
    // spectra without objectives are ignored
    goal.fit_eval("nonexistent", &hv, &ArrDbl::new(2)).unwrap();
    assert_eq!(goal.best_scale("nonexistent"), 1.0);
}

#[test]
fn goal_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("list.txt"),
        indoc! {"
            Objectives 1
            spot 2.5 true true false lin log
        "},
    )
    .unwrap();
    std::fs::write(
        dir.path().join("spot.txt"),
        indoc! {"
            npts 3
            1.0  10.0  1.0
            2.0  20.0  0.5
            3.0  30.0  0.25
        "},
    )
    .unwrap();
    let goal = Goal::load(dir.path()).unwrap();
    assert!(goal.analysis());
    assert_eq!(goal.len(), 1);
    let obj = goal.objective(0).unwrap();
    assert_eq!(obj.name(), "spot");
    assert_eq!(obj.len(), 3);
    assert_abs_diff_eq!(obj.weight(), 2.5, epsilon = 1e-12);
    assert!(!obj.rescale());
}
