//! Entry point for the nc2tif application.
//! Handles CLI parsing, cube loading, band selection with interactive
//! recovery, temporal resampling, optional masking and the parallel export.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::process;

use nc2tif::cli::Args;
use nc2tif::cube::{Band, RasterCube};
use nc2tif::errors::{Nc2TifError, Result};
use nc2tif::export::{run_export, ExportConfig};
use nc2tif::mask::MaskGeometry;
use nc2tif::resample::resample_mean;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    println!();

    // Check the input before touching anything else; no partial work on a bad path
    if !args.netcdf.exists() {
        eprintln!("The file {} does not exist", args.netcdf.display());
        process::exit(1);
    }

    let cube = RasterCube::open(&args.netcdf, args.chunk_size)?;
    println!("Successfully opened netCDF file: {}", cube.path().display());

    let band = select_band(&cube, args.band)?;

    println!(
        "Resampling '{}' to {} buckets...",
        band.name, args.time_resolution
    );
    let series = resample_mean(&cube, &band, &args.time_resolution)?;

    let mask = match &args.shp {
        Some(path) => {
            println!("Loading and simplifying shapefile...\n");
            Some(MaskGeometry::from_shapefile(path, &series.grid)?)
        }
        None => None,
    };

    let config = ExportConfig {
        out_dir: args.out_dir,
        num_workers: args.num_workers.max(1),
    };
    run_export(&series, mask.as_ref(), &config)?;

    println!("\nDone\n");
    Ok(())
}

/// Resolves the requested band, reprompting interactively on a miss: the
/// available variable names are listed and a corrected name is read from
/// stdin until one resolves. The loader is not restarted between attempts.
fn select_band(cube: &RasterCube, mut name: String) -> Result<Band> {
    loop {
        match cube.band(&name) {
            Ok(band) => return Ok(band),
            Err(Nc2TifError::BandNotFound { band, available }) => {
                println!("The band name does not exist. The following bands were found:");
                for variable in &available {
                    println!("\t{}", variable);
                }
                print!("Band name: ");
                io::stdout().flush()?;

                let mut line = String::new();
                if io::stdin().lock().read_line(&mut line)? == 0 {
                    // stdin closed: nothing left to recover with
                    return Err(Nc2TifError::BandNotFound { band, available });
                }
                name = line.trim().to_string();
            }
            Err(other) => return Err(other),
        }
    }
}
