use std::path::{Path, PathBuf};

use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;

use crate::error::{ReductionError, Result};
use crate::io::header::Header;

/// Writes FITS files with 32-bit float images through cfitsio.
///
/// The first HDU written becomes the primary HDU; every later one is written
/// as an `IMAGE` extension.
pub struct FitsWriter {
    path: PathBuf,
    fptr: Option<FitsFile>,
}

impl FitsWriter {
    /// Prepare the output file. Fails with `OutputExists` unless `overwrite`.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self> {
        if path.exists() {
            if !overwrite {
                return Err(ReductionError::OutputExists(path.to_path_buf()));
            }
            // cfitsio refuses to create over an existing file.
            std::fs::remove_file(path)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            fptr: None,
        })
    }

    pub fn write_hdu(&mut self, header: &Header, data: Option<&Array2<f32>>) -> Result<()> {
        let dimensions = data.map_or_else(Vec::new, |a| vec![a.nrows(), a.ncols()]);
        let description = ImageDescription {
            data_type: ImageType::Float,
            dimensions: &dimensions,
        };
        let fail = |e: fitsio::errors::Error| ReductionError::write(&self.path, e);

        let (mut fptr, hdu, header) = match self.fptr.take() {
            None => {
                let mut fptr = FitsFile::create(&self.path)
                    .with_custom_primary(&description)
                    .open()
                    .map_err(fail)?;
                let hdu = fptr.primary_hdu().map_err(fail)?;
                (fptr, hdu, header.clone())
            }
            Some(mut fptr) => {
                let extname = header.opt_str("EXTNAME")?.unwrap_or("IMAGE").to_string();
                let hdu = fptr.create_image(extname, &description).map_err(fail)?;
                // cfitsio has already written EXTNAME.
                let mut header = header.clone();
                header.remove("EXTNAME");
                (fptr, hdu, header)
            }
        };

        let written = header.write_current(&mut fptr).and_then(|()| match data {
            Some(arr) => {
                let pixels: Vec<f32> = arr.iter().copied().collect();
                hdu.write_image(&mut fptr, pixels.as_slice())
            }
            None => Ok(()),
        });
        self.fptr = Some(fptr);
        written.map_err(fail)
    }

    /// Close the file, creating an empty primary HDU if nothing was written.
    pub fn finalize(self) -> Result<()> {
        if self.fptr.is_none() {
            FitsFile::create(&self.path)
                .open()
                .map_err(|e| ReductionError::write(&self.path, e))?;
        }
        Ok(())
    }
}

/// Write a single-HDU file holding one image.
pub fn write_image(path: &Path, header: &Header, data: &Array2<f32>, overwrite: bool) -> Result<()> {
    let mut writer = FitsWriter::create(path, overwrite)?;
    writer.write_hdu(header, Some(data))?;
    writer.finalize()
}
