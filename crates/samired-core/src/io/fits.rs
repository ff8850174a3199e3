use std::path::{Path, PathBuf};

use fitsio::hdu::HduInfo;
use fitsio::FitsFile;
use ndarray::Array2;

use crate::error::{ReductionError, Result};
use crate::io::header::Header;

/// One header-data unit: a header and an optional 2-D image.
#[derive(Clone, Debug)]
pub struct Hdu {
    pub header: Header,
    pub data: Option<Array2<f32>>,
}

impl Hdu {
    pub fn new(header: Header, data: Array2<f32>) -> Self {
        Self {
            header,
            data: Some(data),
        }
    }

    pub fn header_only(header: Header) -> Self {
        Self { header, data: None }
    }
}

/// FITS file opened through cfitsio.
///
/// Every HDU header is read on open; pixel data is read on demand, as f32
/// with BSCALE/BZERO applied by cfitsio.
pub struct FitsReader {
    fptr: FitsFile,
    path: PathBuf,
    headers: Vec<Header>,
    shapes: Vec<Option<(usize, usize)>>,
}

impl std::fmt::Debug for FitsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitsReader")
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("shapes", &self.shapes)
            .finish_non_exhaustive()
    }
}

impl FitsReader {
    pub fn open(path: &Path) -> Result<Self> {
        let fail = |e: fitsio::errors::Error| ReductionError::read(path, e.to_string());
        let mut fptr = FitsFile::open(path).map_err(fail)?;

        let count = fptr.iter().count();
        let mut headers = Vec::with_capacity(count);
        let mut shapes = Vec::with_capacity(count);
        for index in 0..count {
            let hdu = fptr.hdu(index).map_err(fail)?;
            let shape = match &hdu.info {
                HduInfo::ImageInfo { shape, .. } => image_shape(shape)
                    .map_err(|reason| ReductionError::read(path, format!("HDU {index}: {reason}")))?,
                HduInfo::TableInfo { .. } | HduInfo::AnyInfo => None,
            };
            headers.push(Header::read_current(&mut fptr).map_err(fail)?);
            shapes.push(shape);
        }
        if headers.is_empty() {
            return Err(ReductionError::read(path, "no HDU found"));
        }

        Ok(Self {
            fptr,
            path: path.to_path_buf(),
            headers,
            shapes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hdu_count(&self) -> usize {
        self.headers.len()
    }

    pub fn header(&self, index: usize) -> Result<&Header> {
        self.check(index)?;
        Ok(&self.headers[index])
    }

    /// Shape `(rows, cols)` of an HDU's image, if it carries one.
    pub fn shape(&self, index: usize) -> Result<Option<(usize, usize)>> {
        self.check(index)?;
        Ok(self.shapes[index])
    }

    pub fn read_data(&mut self, index: usize) -> Result<Option<Array2<f32>>> {
        let Some((rows, cols)) = self.shape(index)? else {
            return Ok(None);
        };
        let fail = |e: fitsio::errors::Error| ReductionError::read(&self.path, e.to_string());
        let hdu = self.fptr.hdu(index).map_err(fail)?;
        let pixels: Vec<f32> = hdu.read_image(&mut self.fptr).map_err(fail)?;
        Array2::from_shape_vec((rows, cols), pixels)
            .map(Some)
            .map_err(|e| ReductionError::read(&self.path, e.to_string()))
    }

    pub fn read_hdu(&mut self, index: usize) -> Result<Hdu> {
        let data = self.read_data(index)?;
        Ok(Hdu {
            header: self.header(index)?.clone(),
            data,
        })
    }

    pub fn read_all(&mut self) -> Result<Vec<Hdu>> {
        (0..self.hdu_count()).map(|i| self.read_hdu(i)).collect()
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.headers.len() {
            Ok(())
        } else {
            Err(ReductionError::read(
                &self.path,
                format!("HDU {index} out of range (total: {})", self.headers.len()),
            ))
        }
    }
}

/// cfitsio reports image axes slowest first: `[NAXIS2, NAXIS1]`.
fn image_shape(shape: &[usize]) -> std::result::Result<Option<(usize, usize)>, String> {
    let shape = match shape {
        [] => None,
        [cols] => Some((1, *cols)),
        [outer @ .., rows, cols] if outer.iter().all(|&n| n == 1) => Some((*rows, *cols)),
        _ => return Err(format!("only 2-D images are supported, got {} axes", shape.len())),
    };
    Ok(shape.filter(|(rows, cols)| rows * cols > 0))
}

/// Open a file and read every HDU.
pub fn read_fits(path: &Path) -> Result<Vec<Hdu>> {
    FitsReader::open(path)?.read_all()
}

/// Read the primary image and header of a single-extension product
/// (master frames, reduced frames).
pub fn read_image(path: &Path) -> Result<(Header, Array2<f32>)> {
    let mut reader = FitsReader::open(path)?;
    let data = reader
        .read_data(0)?
        .ok_or_else(|| ReductionError::read(path, "primary HDU has no image"))?;
    let header = reader.header(0)?.clone();
    Ok((header, data))
}
