//! Reference path executable entry point.
//!
//! Loads a track centre line from a CSV file, builds the reference path with the parameters in
//! `params/refpath_exec.toml`, and writes the result into the session directory:
//!
//!     - `ref_path.csv`: one row per path point
//!     - `ref_path_summary.json`: overall figures of the path
//!     - `track_bounds.json`: the track edges, if intermediates are enabled
//!
//! # Usage
//!
//! ```text
//! refpath_exec <centre_line.csv>
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info};
use std::env;

// Internal
use refpath_lib::{params::ExecParams, ref_path::ReferencePath, ReferencePathBuilder};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new("refpath_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Reference Path Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: ExecParams =
        util::params::load("refpath_exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");
    debug!("{:#?}", params);

    // ---- LOAD CENTRE LINE ----

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected exactly one argument, the path to the centre line CSV file"
        ));
    }

    info!("Loading centre line from \"{}\"", &args[1]);

    let centre_line =
        track_if::io::load_centre_line(&args[1]).wrap_err("Failed to load the centre line")?;

    info!("Loaded {} centre line points", centre_line.points_m.len());

    // ---- BUILD REFERENCE PATH ----

    let ref_path = ReferencePathBuilder::new(
        centre_line.points_m,
        centre_line.widths,
        params.boundary,
    )
    .with_params(params.ref_path)
    .build()
    .wrap_err("Failed to build the reference path")?;

    let summary = ref_path.summary();
    info!(
        "Path length {:.3} m, lap time {:.3} s, speed {:.2}..{:.2} m/s",
        summary.total_length_m,
        summary.total_time_s,
        summary.min_velocity_ms,
        summary.max_velocity_ms
    );

    // ---- SAVE OUTPUTS ----

    let csv_path = session.session_root.join("ref_path.csv");
    write_csv(&ref_path, &csv_path).wrap_err("Failed to write the reference path")?;
    info!("Reference path written to {:?}", csv_path);

    session.save("ref_path_summary.json", summary);

    if let Some(bounds) = ref_path.intermediates() {
        session.save("track_bounds.json", bounds.clone());
    }

    session.exit();

    info!("End of execution");

    Ok(())
}

/// Write one CSV row per path point.
fn write_csv(ref_path: &ReferencePath, path: &std::path::Path) -> Result<(), Report> {
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("Cannot create {:?}", path))?;

    for record in ref_path.records() {
        writer.serialize(record)?;
    }

    writer.flush()?;

    Ok(())
}
