// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! FESTR driver, usage: `festr <options_file>`.

use clap::Parser;
use log::info;

use festr::{run, setup_logger, FestrArgs};

fn main() {
    let args = FestrArgs::parse();
    if let Err(e) = setup_logger(args.verbosity) {
        eprintln!("failed to initialize the logger: {e}");
        std::process::exit(1);
    }

    info!(
        "FESTR: Finite-Element Spectral Transfer of Radiation, version {}",
        env!("CARGO_PKG_VERSION")
    );

    match run(&args) {
        Ok(()) => {}
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
}
