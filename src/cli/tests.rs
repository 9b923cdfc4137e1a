// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use indoc::indoc;

use super::*;

fn options_text(goal: &str, with_window: bool) -> String {
    let mut s = format!(
        indoc! {"
            Top_path: /data/run42/
            Goal: {}
            Output: out/
            Material_table_path: tables/
            Material_table_file_name: materials.txt
            Hydro: hydro/
            TOPS_command: none
            Database: dbase/
            Diagnostics: diag/
        "},
        goal
    );
    if with_window {
        s.push_str("tmin_tmax: 0.0 1.0e-8\n");
    }
    s
}

#[test]
fn forward_options_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("festr.opt");
    std::fs::write(&path, options_text("none", true)).unwrap();
    let o = Options::load(&path).unwrap();
    assert!(!o.analysis());
    assert_eq!(o.top_path, PathBuf::from("/data/run42/"));
    assert_eq!(o.out_path, PathBuf::from("/data/run42/out/"));
    assert_eq!(o.hydro_path, PathBuf::from("/data/run42/hydro/"));
    assert_eq!(o.table_fname, "materials.txt");
    assert_eq!(o.tops_cmnd, "none");
    assert_eq!(o.tmax, 1.0e-8);
}

#[test]
fn analysis_options_skip_time_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("festr.opt");
    std::fs::write(&path, options_text("goal/", false)).unwrap();
    let o = Options::load(&path).unwrap();
    assert!(o.analysis());
    assert_eq!(o.goal_path, Some(PathBuf::from("/data/run42/goal/")));
}

#[test]
fn forward_options_require_time_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("festr.opt");
    std::fs::write(&path, options_text("none", false)).unwrap();
    assert!(matches!(
        Options::load(&path),
        Err(OptionsError::MissingTimeWindow)
    ));
}

#[test]
fn missing_key_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("festr.opt");
    std::fs::write(&path, "Top_path: /x/\nOutput: out/\n").unwrap();
    assert!(matches!(
        Options::load(&path),
        Err(OptionsError::Io(IoError::WordNotFound { .. }))
    ));
}

#[test]
fn args_parse_defaults() {
    let args = FestrArgs::try_parse_from(["festr", "festr.opt"]).unwrap();
    assert_eq!(args.options_file, PathBuf::from("festr.opt"));
    assert_eq!(args.ranks, None);
    assert!(!args.no_progress_bars);
    assert_eq!(args.verbosity, 0);

    let args =
        FestrArgs::try_parse_from(["festr", "-vv", "--ranks", "4", "festr.opt"]).unwrap();
    assert_eq!(args.verbosity, 2);
    assert_eq!(args.ranks, Some(4));
}
