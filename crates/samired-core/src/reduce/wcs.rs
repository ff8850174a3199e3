//! Approximate tangent-plane WCS built from the telescope pointing.

use tracing::{debug, info, warn};

use crate::consts::DEFAULT_EQUINOX;
use crate::error::{ReductionError, Result};
use crate::frame::{Binning, ObsType};
use crate::io::header::{Header, Value};

use super::Reduced;

/// Linear gnomonic WCS.
///
/// Pixel coordinates follow the FITS convention: 1-based, `x` along columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference pixel (CRPIX1, CRPIX2).
    pub crpix: (f64, f64),
    /// Reference sky position in degrees (CRVAL1 = RA, CRVAL2 = Dec).
    pub crval: (f64, f64),
    /// `[[CD1_1, CD1_2], [CD2_1, CD2_2]]` in degrees per pixel.
    pub cd: [[f64; 2]; 2],
    pub ctype: (String, String),
}

impl Wcs {
    /// Pointing at `crval` with `scale` degrees per pixel, rotated by
    /// `theta` degrees.
    pub fn from_pointing(crpix: (f64, f64), crval: (f64, f64), scale: f64, theta: f64) -> Self {
        let (sin_t, cos_t) = theta.to_radians().sin_cos();
        Self {
            crpix,
            crval,
            cd: [[scale * cos_t, scale * sin_t], [-scale * sin_t, scale * cos_t]],
            ctype: ("RA---TAN".to_string(), "DEC--TAN".to_string()),
        }
    }

    /// Read the WCS keywords back from a header. A missing CD matrix falls
    /// back to a diagonal built from `CDELTn`.
    pub fn from_header(header: &Header) -> Result<Self> {
        let crpix = (header.get_f64("CRPIX1")?, header.get_f64("CRPIX2")?);
        let crval = (header.get_f64("CRVAL1")?, header.get_f64("CRVAL2")?);
        let cd = match header.opt_f64("CD1_1")? {
            Some(cd11) => [
                [cd11, header.opt_f64("CD1_2")?.unwrap_or(0.0)],
                [
                    header.opt_f64("CD2_1")?.unwrap_or(0.0),
                    header.opt_f64("CD2_2")?.unwrap_or(0.0),
                ],
            ],
            None => [
                [header.get_f64("CDELT1")?, 0.0],
                [0.0, header.get_f64("CDELT2")?],
            ],
        };
        let ctype = (
            header.get_str("CTYPE1")?.trim().to_string(),
            header.get_str("CTYPE2")?.trim().to_string(),
        );
        Ok(Self {
            crpix,
            crval,
            cd,
            ctype,
        })
    }

    /// Pixel to (RA, Dec) in degrees, RA normalised to `[0, 360)`.
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.crpix.0;
        let dy = y - self.crpix.1;
        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();

        let ra0 = self.crval.0.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;

        let ra = (ra0 + xi.atan2(denom)).to_degrees().rem_euclid(360.0);
        let dec = (sin_dec0 + eta * cos_dec0).atan2(xi.hypot(denom));
        (ra, dec.to_degrees())
    }

    /// (RA, Dec) in degrees to pixel.
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> (f64, f64) {
        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (ra - self.crval.0).to_radians().sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;
        (self.crpix.0 + dx, self.crpix.1 + dy)
    }

    /// Mean plate scale in arcseconds per pixel.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let sx = self.cd[0][0].hypot(self.cd[1][0]);
        let sy = self.cd[0][1].hypot(self.cd[1][1]);
        (sx + sy) / 2.0 * 3600.0
    }

    fn write_to(&self, header: &mut Header, cdelt: (f64, f64)) {
        header.set("WCSAXES", 2i64);
        header.set("CRPIX1", self.crpix.0);
        header.set("CRPIX2", self.crpix.1);
        header.set("CDELT1", cdelt.0);
        header.set("CDELT2", cdelt.1);
        header.set("CUNIT1", "deg");
        header.set("CUNIT2", "deg");
        header.set("CTYPE1", self.ctype.0.as_str());
        header.set("CTYPE2", self.ctype.1.as_str());
        header.set("CRVAL1", self.crval.0);
        header.set("CRVAL2", self.crval.1);
        header.set("CD1_1", self.cd[0][0]);
        header.set("CD1_2", self.cd[0][1]);
        header.set("CD2_1", self.cd[1][0]);
        header.set("CD2_2", self.cd[1][1]);
    }
}

/// Attach a tangent-plane WCS to an OBJECT frame.
///
/// `EQUINOX` and `EPOCH` default to 2000 on every frame. Without a plate
/// scale or binning the header is left without a WCS.
pub fn create_wcs(mut frame: Reduced) -> Result<Reduced> {
    let header = &mut frame.header;
    header.set_default("EQUINOX", DEFAULT_EQUINOX);
    header.set_default("EPOCH", DEFAULT_EQUINOX);

    let scale_x = header.opt_f64("PIXSCAL1")?;
    let scale_y = header.opt_f64("PIXSCAL2")?;
    if let (Some(sx), Some(sy)) = (scale_x, scale_y) {
        if sx != sy {
            warn!(pixscal1 = sx, pixscal2 = sy, "Pixel scales for X and Y do not match");
        }
    }

    let is_object = header
        .opt_str("OBSTYPE")?
        .is_some_and(|t| ObsType::parse(t) == ObsType::Object);
    if !is_object {
        return Ok(frame);
    }

    let Some(plate_scale) = scale_x else {
        info!("PIXSCAL1 missing, WCS not created");
        return Ok(frame);
    };
    let binning = match header.opt_str("CCDSUM")? {
        Some(ccdsum) => Binning::parse(ccdsum)?,
        None => {
            info!("CCDSUM missing, WCS not created");
            return Ok(frame);
        }
    };

    let (ra, dec) = pointing(header)?;
    let p = plate_scale / 3600.0;
    let theta = header.opt_f64("DECPANGL")?.unwrap_or(0.0);
    let (rows, cols) = frame.data.dim();

    let wcs = Wcs::from_pointing(
        (cols as f64 / 2.0, rows as f64 / 2.0),
        (ra, dec),
        p * binning.x as f64,
        theta,
    );
    debug!(ra, dec, theta, "Writing WCS");
    wcs.write_to(
        &mut frame.header,
        (p * binning.x as f64, p * binning.y as f64),
    );
    Ok(frame)
}

/// Pointing in degrees from `RA`/`DEC`, falling back to `TELRA`/`TELDEC`.
fn pointing(header: &Header) -> Result<(f64, f64)> {
    let parse = |ra_key: &str, dec_key: &str| -> Option<(f64, f64)> {
        let ra = header.get(ra_key).and_then(|v| parse_angle(v, 15.0))?;
        let dec = header.get(dec_key).and_then(|v| parse_angle(v, 1.0))?;
        Some((ra, dec))
    };
    if let Some(coords) = parse("RA", "DEC") {
        return Ok(coords);
    }
    warn!("\"RA\" and \"DEC\" missing. Using \"TELRA\" and \"TELDEC\" instead.");
    parse("TELRA", "TELDEC").ok_or_else(|| ReductionError::MissingKeyword("RA/DEC".into()))
}

/// Angle from a header value, multiplied by `unit` to give degrees.
fn parse_angle(value: &Value, unit: f64) -> Option<f64> {
    match value {
        Value::Str(text) => parse_sexagesimal(text).map(|v| v * unit),
        other => other.as_f64().map(|v| v * unit),
    }
}

/// Parse `"[+-]dd:mm:ss.s"`, `"dd mm ss"` or a plain decimal number.
pub fn parse_sexagesimal(text: &str) -> Option<f64> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let parts: Vec<&str> = body
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut value = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let v: f64 = part.parse().ok()?;
        if !v.is_finite() || v < 0.0 || (i > 0 && v >= 60.0) {
            return None;
        }
        value += v / 60f64.powi(i as i32);
    }
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sexagesimal_forms() {
        assert_abs_diff_eq!(parse_sexagesimal("12:30:00").unwrap(), 12.5);
        assert_abs_diff_eq!(parse_sexagesimal("-05 30 00").unwrap(), -5.5);
        assert_abs_diff_eq!(parse_sexagesimal("+10:06").unwrap(), 10.1, epsilon = 1e-12);
        assert_abs_diff_eq!(parse_sexagesimal("3.25").unwrap(), 3.25);
        assert!(parse_sexagesimal("12:75:00").is_none());
        assert!(parse_sexagesimal("abc").is_none());
        assert!(parse_sexagesimal("").is_none());
    }

    #[test]
    fn reference_pixel_maps_to_crval() {
        let wcs = Wcs::from_pointing((512.0, 512.0), (150.0, -30.0), 1e-4, 12.0);
        let (ra, dec) = wcs.pixel_to_sky(512.0, 512.0);
        assert_abs_diff_eq!(ra, 150.0, epsilon = 1e-9);
        assert_abs_diff_eq!(dec, -30.0, epsilon = 1e-9);
    }

    #[test]
    fn pixel_sky_inverse() {
        let wcs = Wcs::from_pointing((100.0, 80.0), (359.99, 45.0), 2e-4, -33.0);
        let (ra, dec) = wcs.pixel_to_sky(10.0, 170.0);
        let (x, y) = wcs.sky_to_pixel(ra, dec);
        assert_abs_diff_eq!(x, 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 170.0, epsilon = 1e-6);
        assert_abs_diff_eq!(wcs.pixel_scale_arcsec(), 0.72, epsilon = 1e-9);
    }
}
