// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared test fixtures: a miniature opacity database on disk and a
//! one-cube mesh inside a bounding sphere.

use std::fs;
use std::path::Path;

use indoc::indoc;

use crate::dbase::{Database, Table};
use crate::geometry::{Grid, Mesh, Node, Polygon, Sphere, Vector3d, Zone};

pub(crate) fn write_grid_file(dir: &Path, name: &str, entries: &[&str]) {
    let mut text = String::from(indoc! {"
        Number of bits:
        0

        Number of grid points:
    "});
    text.push_str(&format!("{}\n\nGrid points:\n", entries.len()));
    for (i, e) in entries.iter().enumerate() {
        text.push_str(&format!("{i}  {e}\n"));
    }
    fs::write(dir.join(name), text).unwrap();
}

/// te/tr grids {100, 200} eV, ne grid {1, 5} x 10^20, hv {1, 2, 3, 4} eV.
pub(crate) fn small_database(top: &Path) -> Database {
    let grids = top.join("grids");
    fs::create_dir_all(&grids).unwrap();
    write_grid_file(&grids, "te_grid.txt", &["100.0", "200.0"]);
    write_grid_file(&grids, "tr_grid.txt", &["100.0", "200.0"]);
    write_grid_file(&grids, "ne_man_grid.txt", &["1.0", "5.0"]);
    fs::write(
        grids.join("ne_exp_grid.txt"),
        indoc! {"
            Number of bits:
            0

            Number of grid points:
            1

            Grid points:
            0  20
        "},
    )
    .unwrap();
    write_grid_file(&grids, "hv_grid.txt", &["1.0", "2.0", "3.0", "4.0"]);
    Database::new("none", top).unwrap()
}

/// Tabulate one material at one (te, tr, ne) point: `em` as given,
/// absorption at half and scattering at a quarter of it, unit zbar.
pub(crate) fn write_material(top: &Path, m: &str, froot: &str, zbar: f64, em: &[f64]) {
    let eos = top.join("eos").join(m);
    let spectra = top.join("spectra").join(m);
    fs::create_dir_all(&eos).unwrap();
    fs::create_dir_all(&spectra).unwrap();
    fs::write(
        eos.join(format!("{m}{froot}zb.txt")),
        format!("zbar {zbar}\n"),
    )
    .unwrap();
    let body =
        |v: &[f64]| v.iter().map(|x| format!("{x:e}\n")).collect::<String>();
    fs::write(spectra.join(format!("{m}{froot}em.txt")), body(em)).unwrap();
    let ab: Vec<f64> = em.iter().map(|x| x * 0.5).collect();
    fs::write(spectra.join(format!("{m}{froot}ab.txt")), body(&ab)).unwrap();
    let sc: Vec<f64> = em.iter().map(|x| x * 0.25).collect();
    fs::write(spectra.join(format!("{m}{froot}sc.txt")), body(&sc)).unwrap();
}

/// Database plus the material `d` (on disk `d_`) tabulated at every
/// (te, tr, ne) grid point with em = (1, 2, 3, 4) per bin.
pub(crate) fn database_with_material(top: &Path) -> (Database, Table) {
    let d = small_database(top);
    let mut tbl = Table::default();
    tbl.insert("d", "d_");
    for te in ["100.0", "200.0"] {
        for tr in ["100.0", "200.0"] {
            for ne in ["1.0e20", "5.0e20"] {
                write_material(
                    top,
                    "d_",
                    &format!("_te{te}ev_tr{tr}ev_ne{ne}pcc_"),
                    1.0,
                    &[1.0, 2.0, 3.0, 4.0],
                );
            }
        }
    }
    (d, tbl)
}

/// A unit cube (zone 1) inside a radius-100 bounding sphere (zone 0).
/// Zone 0 is bounded by the sphere (face 0) and mirror images of the
/// cube's six faces (faces 1..=6); neighbor links tie the mirrors to the
/// cube faces and back. With `with_material` the cube holds pure `d` at
/// 100 eV and np = 1e20.
pub(crate) fn cube_in_sphere(with_material: bool) -> (Grid, Mesh) {
    let mut g = Grid::new();
    let corners = [
        (0.0, 0.0, 0.0),
        (1.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (1.0, 0.0, 1.0),
        (1.0, 1.0, 1.0),
        (0.0, 1.0, 1.0),
    ];
    for (i, &(x, y, z)) in corners.iter().enumerate() {
        g.add_node(Node::new(i, Vector3d::new(x, y, z), Vector3d::default()));
    }
    g.add_node(Node::new(
        8,
        Vector3d::new(0.5, 0.5, 0.5),
        Vector3d::default(),
    ));

    let loops: [[usize; 4]; 6] = [
        [0, 4, 7, 3], // x = 0
        [1, 2, 6, 5], // x = 1
        [0, 1, 5, 4], // y = 0
        [3, 7, 6, 2], // y = 1
        [0, 3, 2, 1], // z = 0
        [4, 5, 6, 7], // z = 1
    ];

    let mut bounding = Zone::new(0);
    let mut sphere = Sphere::new(0, 0);
    sphere.add_node(8);
    sphere.r = 100.0;
    sphere.n = -1;
    sphere.add_neighbor(1, 0);
    bounding.add_face(Box::new(sphere));
    for (i, lp) in loops.iter().enumerate() {
        let mut f = Polygon::new(0, (i + 1) as i16);
        for &n in lp {
            f.add_node(n);
        }
        f.add_neighbor(1, i as i16);
        bounding.add_face(Box::new(f));
    }

    let mut cube = Zone::new(1);
    for (i, lp) in loops.iter().enumerate() {
        let mut f = Polygon::new(1, i as i16);
        for &n in lp {
            f.add_node(n);
        }
        f.add_neighbor(0, (i + 1) as i16);
        cube.add_face(Box::new(f));
    }
    if with_material {
        cube.te = 100.0;
        cube.tr = 100.0;
        cube.np = 1.0e20;
        cube.mat = vec!["d".to_string()];
        cube.fp = vec![1.0];
    }

    let mut m = Mesh::new();
    m.push_zone(bounding);
    m.push_zone(cube);
    (g, m)
}
