// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command line and options-file handling, plus logger setup.

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::thread;

use clap::Parser;
use log::{debug, info};
use thiserror::Error;

use crate::dbase::{Database, Table};
use crate::diagnostics::Diagnostics;
use crate::error::FestrError;
use crate::goal::Goal;
use crate::hydro::Hydro;
use crate::io::{IoError, TokenReader};

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("tmin_tmax is required for a forward (postprocessing) run")]
    MissingTimeWindow,

    #[error(transparent)]
    Io(#[from] IoError),
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Synthetic spectra and spectroscopic analysis of radiating plasmas")]
pub struct FestrArgs {
    /// Path to the line-keyed options file driving this run.
    #[clap(parse(from_os_str))]
    pub options_file: PathBuf,

    /// Total rank count for pixel distribution (1 master + workers).
    /// Defaults to the available hardware parallelism.
    #[clap(long, help_heading = "PARALLELISM")]
    pub ranks: Option<usize>,

    /// Don't draw progress bars.
    #[clap(long, help_heading = "USER INTERFACE")]
    pub no_progress_bars: bool,

    /// The verbosity of the program. The default is to print high-level
    /// information.
    #[clap(short, long, parse(from_occurrences), help_heading = "USER INTERFACE")]
    pub verbosity: u64,
}

/// The recognized keys of the options file, in their required order.
#[derive(Debug)]
pub struct Options {
    pub top_path: PathBuf,
    /// `none` disables analysis and runs forward postprocessing.
    pub goal_path: Option<PathBuf>,
    pub out_path: PathBuf,
    pub table_path: PathBuf,
    pub table_fname: String,
    pub hydro_path: PathBuf,
    pub tops_cmnd: String,
    pub dbase_path: PathBuf,
    pub diag_path: PathBuf,
    /// Forward-mode time window \[s\].
    pub tmin: f64,
    pub tmax: f64,
}

impl Options {
    pub fn load(path: &PathBuf) -> Result<Self, OptionsError> {
        let mut r = TokenReader::open(path)?;

        r.find_word("Top_path:")?;
        let top_path = PathBuf::from(r.next::<String>("top path")?);

        r.find_word("Goal:")?;
        let goal: String = r.next("goal path")?;
        let goal_path = (goal != "none").then(|| top_path.join(&goal));
        let analysis = goal_path.is_some();

        r.find_word("Output:")?;
        let out_path = top_path.join(r.next::<String>("output path")?);

        r.find_word("Material_table_path:")?;
        let table_path = top_path.join(r.next::<String>("material table path")?);
        r.find_word("Material_table_file_name:")?;
        let table_fname: String = r.next("material table file name")?;

        r.find_word("Hydro:")?;
        let hydro_path = top_path.join(r.next::<String>("hydro path")?);

        r.find_word("TOPS_command:")?;
        let tops_cmnd: String = r.next("TOPS command")?;

        r.find_word("Database:")?;
        let dbase_path = top_path.join(r.next::<String>("database path")?);

        r.find_word("Diagnostics:")?;
        let diag_path = top_path.join(r.next::<String>("diagnostics path")?);

        // the time range only limits forward postprocessing
        let (tmin, tmax) = if analysis {
            (0.0, 0.0)
        } else {
            if r.find_word("tmin_tmax:").is_err() {
                return Err(OptionsError::MissingTimeWindow);
            }
            (r.next("tmin")?, r.next("tmax")?)
        };

        Ok(Self {
            top_path,
            goal_path,
            out_path,
            table_path,
            table_fname,
            hydro_path,
            tops_cmnd,
            dbase_path,
            diag_path,
            tmin,
            tmax,
        })
    }

    pub fn analysis(&self) -> bool {
        self.goal_path.is_some()
    }
}

/// Initialize the global logger from `-v` occurrences.
pub fn setup_logger(verbosity: u64) -> Result<(), fern::InitError> {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let colors = fern::colors::ColoredLevelConfig::new()
        .info(fern::colors::Color::Green)
        .debug(fern::colors::Color::Cyan)
        .warn(fern::colors::Color::Yellow)
        .error(fern::colors::Color::Red);
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

/// Everything after argument parsing: load the inputs, then run whichever
/// mode the goal selects.
pub fn run(args: &FestrArgs) -> Result<(), FestrError> {
    debug!("{:#?}", args);
    let options = Options::load(&args.options_file)?;
    debug!("{:#?}", options);

    info!("Top path: {}", options.top_path.display());

    let mut gol = match &options.goal_path {
        Some(path) => {
            info!("Goal path: {}", path.display());
            Goal::load(path)?
        }
        None => {
            info!("Goal: none (forward postprocessing)");
            Goal::forward()
        }
    };

    info!("Output data path: {}", options.out_path.display());
    let tbl = Table::load(options.table_path.join(&options.table_fname))?;
    info!("Material table: {} entries", tbl.len());

    info!("Loading database from {}", options.dbase_path.display());
    let d = Database::new(&options.tops_cmnd, &options.dbase_path)?;
    info!(
        "Database grids: {} te, {} tr, {} ne, {} hv points",
        d.nte(),
        d.ntr(),
        d.nne(),
        d.nhv()
    );

    let nranks = args.ranks.unwrap_or_else(|| {
        thread::available_parallelism().map_or(1, |n| n.get())
    });
    let draw_progress =
        !args.no_progress_bars && atty::is(atty::Stream::Stdout) && args.verbosity == 0;

    info!("Loading diagnostics from {}", options.diag_path.display());
    let mut diag = Diagnostics::new(
        &options.diag_path,
        &options.hydro_path,
        &options.out_path,
        &d,
        nranks,
        draw_progress,
    )?;

    // the hydro index scheme depends on the (single) detector's symmetry
    let symmetry = diag.det[0].symmetry();
    info!("Loading hydro from {}", options.hydro_path.display());
    let mut h = Hydro::new(
        options.analysis(),
        &options.hydro_path,
        symmetry,
        options.tmin,
        options.tmax,
    )?;
    info!(
        "{} {}",
        h.nintervals(),
        if options.analysis() {
            "cases to search"
        } else {
            "time steps to process"
        }
    );

    diag.execute(&d, &tbl, &mut h, &mut gol)?;
    info!("end");
    Ok(())
}
