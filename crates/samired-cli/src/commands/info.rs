use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use samired_core::frame::RawFrame;
use samired_core::io::fits::FitsReader;
use samired_core::reduce::wcs::Wcs;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = FitsReader::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    println!("File:        {}", args.file.display());
    println!("Extensions:  {}", reader.hdu_count());
    for i in 0..reader.hdu_count() {
        match reader.shape(i)? {
            Some((rows, cols)) => println!("  [{i}]       {cols}x{rows}"),
            None => println!("  [{i}]       no data"),
        }
    }

    match RawFrame::inspect(&args.file) {
        Ok(frame) => {
            println!("Instrument:  {}", frame.instrument);
            println!("Obstype:     {}", frame.obstype);
            println!("Binning:     {}", frame.binning.label());
            println!("Filters:     {}", frame.filters);
            println!("Filter 1:    {}", frame.filter1);
            println!("Filter 2:    {}", frame.filter2);
        }
        Err(e) => println!("Frame:       not reducible ({e})"),
    }

    let primary = reader.header(0)?;
    match Wcs::from_header(primary) {
        Ok(wcs) => {
            let (cols, rows) = reader
                .shape(0)?
                .map(|(r, c)| (c as f64, r as f64))
                .unwrap_or((2.0 * wcs.crpix.0, 2.0 * wcs.crpix.1));
            let (ra, dec) = wcs.pixel_to_sky(cols / 2.0, rows / 2.0);
            println!("WCS centre:  RA {ra:.6} deg, Dec {dec:.6} deg");
            println!("Plate scale: {:.4} arcsec/px", wcs.pixel_scale_arcsec());
        }
        Err(_) => println!("WCS:         none"),
    }

    Ok(())
}
