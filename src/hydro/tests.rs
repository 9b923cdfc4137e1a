// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use indoc::indoc;

use super::*;

fn write_common(dir: &Path) {
    fs::write(dir.join("bounding_sphere.txt"), "0.5 0.5 0.5 100.0\n").unwrap();
}

fn mesh_text() -> &'static str {
    concat!(
        "Nodes 2\n",
        "0  0.5 0.5 0.5  0.0 0.0 0.0\n",
        "1  0.0 0.0 0.0  0.0 0.0 0.0\n",
        "Zones 2\n",
        "Zone 0 1\n",
        "Sphere\n0 0\n0\n100.0 0.0 -1\nneighbors 1\n1 0\n",
        "Zone 1 1\n",
        "Sphere\n1 0\n0\n1.0 0.0 1\nneighbors 1\n0 0\n",
    )
}

fn state_record(te: f64) -> String {
    format!("te {te}\ntr {te}\nnp 1.0e20\nnmat 1\nmaterial fraction\nd 1.0\n")
}

#[test]
fn forward_time_window_and_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    write_common(dir.path());
    fs::write(
        dir.path().join("times.txt"),
        indoc! {"
            ntimes 3
            0  1.0e-9  1.0e-9
            1  2.0e-9  1.0e-9
            2  5.0e-9  3.0e-9
        "},
    )
    .unwrap();
    for it in 0..3 {
        fs::write(dir.path().join(format!("mesh_{it}.txt")), mesh_text()).unwrap();
        fs::write(
            dir.path().join(format!("time_{it}.txt")),
            format!(
                "Zone 0\nte 0 tr 0 np 0 nmat 0 material fraction\nZone 1\n{}",
                state_record(100.0 + it as f64)
            ),
        )
        .unwrap();
    }

    // only the first two steps fall inside [0, 3 ns]
    let h = Hydro::new(false, dir.path(), Symmetry::None, 0.0, 3.0e-9).unwrap();
    assert_eq!(h.nintervals(), 2);
    assert_eq!(h.time_index_at(1), 1);
    assert_abs_diff_eq!(h.time_at(1).unwrap(), 2.0e-9, epsilon = 1e-20);
    assert_abs_diff_eq!(h.dt_at(0).unwrap(), 1.0e-9, epsilon = 1e-20);
    assert_abs_diff_eq!(h.sphere_radius(), 100.0, epsilon = 1e-12);

    let mut grid = Grid::new();
    let mut mesh = Mesh::new();
    h.load_at(1, &mut grid, &mut mesh).unwrap();
    assert_eq!(mesh.len(), 2);
    assert_abs_diff_eq!(mesh.zone(1).unwrap().te, 101.0, epsilon = 1e-12);
}

#[test]
fn empty_window_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_common(dir.path());
    fs::write(
        dir.path().join("times.txt"),
        "ntimes 1\n0  1.0e-9  1.0e-9\n",
    )
    .unwrap();
    assert!(matches!(
        Hydro::new(false, dir.path(), Symmetry::None, 5.0e-9, 9.0e-9),
        Err(HydroError::EmptyTimeWindow { .. })
    ));
}

fn write_analysis_dir(dir: &Path, cases_zone1: &[f64]) {
    write_common(dir);
    fs::write(dir.join("times.txt"), "ntimes 1\n0  0.0  1.0\n").unwrap();
    fs::write(dir.join("mesh_0.txt"), mesh_text()).unwrap();
    let mut states = String::from("Zones 2\nZone 0\nncases 1\n");
    states.push_str("te 0 tr 0 np 0 nmat 0 material fraction\n");
    states.push_str(&format!("Zone 1\nncases {}\n", cases_zone1.len()));
    for &te in cases_zone1 {
        states.push_str(&state_record(te));
    }
    fs::write(dir.join("states.txt"), states).unwrap();
}

#[test]
fn product_enumeration_sets_every_zone() {
    let dir = tempfile::tempdir().unwrap();
    write_analysis_dir(dir.path(), &[100.0, 120.0, 140.0, 160.0]);

    let h = Hydro::new(true, dir.path(), Symmetry::None, 0.0, 0.0).unwrap();
    assert_eq!(h.ndim(), &[1, 4]);
    // cartesian product over (1, 4)
    assert_eq!(h.nintervals(), 4);

    let mut grid = Grid::new();
    let mut mesh = Mesh::new();
    h.load_at(2, &mut grid, &mut mesh).unwrap();
    assert_abs_diff_eq!(mesh.zone(1).unwrap().te, 140.0, epsilon = 1e-12);
    h.load_at(0, &mut grid, &mut mesh).unwrap();
    assert_abs_diff_eq!(mesh.zone(1).unwrap().te, 100.0, epsilon = 1e-12);
}

#[test]
fn summation_enumeration_touches_one_zone() {
    let dir = tempfile::tempdir().unwrap();
    write_analysis_dir(dir.path(), &[100.0, 120.0]);

    let mut h = Hydro::new(true, dir.path(), Symmetry::Spherical, 0.0, 0.0).unwrap();
    // telescoping sum over (1, 2)
    assert_eq!(h.nintervals(), 3);

    let mut grid = Grid::new();
    let mut mesh = Mesh::new();
    // index 2 = axis 1, candidate 1
    h.load_at(2, &mut grid, &mut mesh).unwrap();
    assert_abs_diff_eq!(mesh.zone(1).unwrap().te, 120.0, epsilon = 1e-12);
    // index 0 = axis 0 (the bounding zone); zone 1 keeps its state
    h.load_at(0, &mut grid, &mut mesh).unwrap();
    assert_abs_diff_eq!(mesh.zone(1).unwrap().te, 120.0, epsilon = 1e-12);

    h.set_symmetry(Symmetry::None);
    assert_eq!(h.nintervals(), 2);
}
