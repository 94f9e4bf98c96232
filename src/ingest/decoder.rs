/// GRIB record decoding.
///
/// `GribDecoder` is the seam between fetched bytes and the domain model.
/// The production implementation shells out to NCEP's `wgrib2`, which
/// prints the grid dimensions with `-nxny` and dumps every cell as
/// `lon,lat,value` with `-csv`. Parsing that text is pure and tested here;
/// running the binary is not.
///
/// wgrib2 writes grid points west to east along each row, rows south to
/// north. The resulting field keeps that order: row 0 is the southernmost.

use std::path::PathBuf;
use std::process::Command;

use std::io::Write;
use tempfile::NamedTempFile;

use crate::model::{AlerterError, GriddedField};

/// wgrib2 prints missing values as 9.999e20.
const WGRIB2_UNDEFINED: f64 = 9.999e20;

/// Decodes one GRIB record into a gridded field in raw units.
pub trait GribDecoder: Send + Sync {
    fn decode(&self, record: &[u8]) -> Result<GriddedField, AlerterError>;
}

/// Decoder backed by the `wgrib2` command-line tool.
#[derive(Debug, Clone)]
pub struct Wgrib2Decoder {
    binary: PathBuf,
}

impl Wgrib2Decoder {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self { binary: binary.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String, AlerterError> {
        let output = Command::new(&self.binary).args(args).output().map_err(|e| {
            AlerterError::Decode(format!("failed to run {}: {}", self.binary.display(), e))
        })?;

        if !output.status.success() {
            return Err(AlerterError::Decode(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for Wgrib2Decoder {
    fn default() -> Self {
        Self::new("wgrib2")
    }
}

impl GribDecoder for Wgrib2Decoder {
    fn decode(&self, record: &[u8]) -> Result<GriddedField, AlerterError> {
        let io_err = |e: std::io::Error| AlerterError::Decode(format!("temporary file: {}", e));

        let mut input = NamedTempFile::new().map_err(io_err)?;
        input.write_all(record).map_err(io_err)?;
        input.flush().map_err(io_err)?;
        let csv_out = NamedTempFile::new().map_err(io_err)?;

        let input_path = input.path().to_string_lossy().into_owned();
        let csv_path = csv_out.path().to_string_lossy().into_owned();

        let dims = self.run(&[&input_path, "-d", "1", "-nxny", "-csv", &csv_path])?;
        let (nx, ny) = parse_nxny(&dims)?;

        let text = std::fs::read_to_string(csv_out.path()).map_err(io_err)?;
        parse_csv(&text, nx, ny)
    }
}

/// Parses the `(nx x ny)` dimensions from `-nxny` output such as
/// `1:0:(1799 x 1059)`.
pub fn parse_nxny(stdout: &str) -> Result<(usize, usize), AlerterError> {
    let bad = || AlerterError::Decode(format!("unrecognised wgrib2 -nxny output: {:?}", stdout.trim()));

    let open = stdout.find('(').ok_or_else(bad)?;
    let close = stdout[open..].find(')').ok_or_else(bad)? + open;
    let (nx, ny) = stdout[open + 1..close].split_once('x').ok_or_else(bad)?;

    let nx = nx.trim().parse::<usize>().map_err(|_| bad())?;
    let ny = ny.trim().parse::<usize>().map_err(|_| bad())?;
    Ok((nx, ny))
}

/// Parses `-csv` output into an `ny` x `nx` field.
///
/// Each line is `"start","valid","VAR","level",lon,lat,value`. Longitudes
/// above 180 are shifted into [-180, 180). Undefined values become NaN.
pub fn parse_csv(text: &str, nx: usize, ny: usize) -> Result<GriddedField, AlerterError> {
    nx.checked_mul(ny)
        .ok_or_else(|| AlerterError::Decode(format!("grid dimensions overflow: {} x {}", nx, ny)))?;
    let mut values = Vec::new();
    let mut lats = Vec::new();
    let mut lons = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.rsplitn(4, ',').collect();
        if fields.len() < 4 {
            return Err(AlerterError::Decode(format!(
                "line {}: expected lon,lat,value columns: {:?}",
                line_no + 1,
                line
            )));
        }
        // rsplitn yields the columns last-first.
        let number = |s: &str| {
            s.trim().parse::<f64>().map_err(|_| {
                AlerterError::Decode(format!("line {}: not a number: {:?}", line_no + 1, s))
            })
        };
        let value = number(fields[0])?;
        let lat = number(fields[1])?;
        let mut lon = number(fields[2])?;
        if lon >= 180.0 {
            lon -= 360.0;
        }

        values.push(if value >= WGRIB2_UNDEFINED { f64::NAN } else { value });
        lats.push(lat);
        lons.push(lon);
    }

    GriddedField::new(ny, nx, values, lats, lons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::{CSV_3X2, NXNY_3X2};

    #[test]
    fn test_parse_nxny() {
        assert_eq!(parse_nxny(NXNY_3X2).unwrap(), (3, 2));
        assert_eq!(parse_nxny("1:0:(1799 x 1059)").unwrap(), (1799, 1059));
    }

    #[test]
    fn test_parse_nxny_rejects_garbage() {
        assert!(matches!(parse_nxny("segmentation fault"), Err(AlerterError::Decode(_))));
        assert!(parse_nxny("1:0:(abc x 4)").is_err());
    }

    #[test]
    fn test_parse_csv_shape_and_order() {
        let field = parse_csv(CSV_3X2, 3, 2).unwrap();
        assert_eq!(field.shape(), (2, 3));
        assert_eq!(field.cell(0), Some((40.6, -89.6, 0.0)));
        assert_eq!(field.cell(2), Some((40.6, -89.54, 2.25)));
        assert_eq!(field.cell(5), Some((40.63, -89.54, 12.7)));
    }

    #[test]
    fn test_parse_csv_undefined_is_nan() {
        let field = parse_csv(CSV_3X2, 3, 2).unwrap();
        assert!(field.values()[4].is_nan());
    }

    #[test]
    fn test_parse_csv_wraps_longitude() {
        let text = "\"a\",\"b\",\"APCP\",\"surface\",270.4,40.6,1\n";
        let field = parse_csv(text, 1, 1).unwrap();
        assert!((field.lons()[0] - -89.6).abs() < 1e-9);
    }

    #[test]
    fn test_parse_csv_count_mismatch_is_decode_error() {
        assert!(matches!(parse_csv(CSV_3X2, 3, 3), Err(AlerterError::Decode(_))));
    }

    #[test]
    fn test_parse_csv_overflowing_dimensions_is_decode_error() {
        let result = parse_csv("", usize::MAX, 3);
        assert!(matches!(result, Err(AlerterError::Decode(ref m)) if m.contains("overflow")), "got {:?}", result);
    }

    #[test]
    fn test_parse_csv_bad_number() {
        let text = "\"a\",\"b\",\"APCP\",\"surface\",-89.6,40.6,oops\n";
        assert!(matches!(parse_csv(text, 1, 1), Err(AlerterError::Decode(_))));
    }

    #[test]
    fn test_missing_binary_is_decode_error() {
        let decoder = Wgrib2Decoder::new("/nonexistent/wgrib2");
        let result = decoder.decode(b"GRIB");
        assert!(matches!(result, Err(AlerterError::Decode(ref m)) if m.contains("failed to run")));
    }
}
