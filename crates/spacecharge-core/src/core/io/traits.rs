use super::site_data::{SiteData, SiteRecord};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Interface for site-data file formats.
///
/// Implementors only parse rows; clipping to a grid range and the derivation of Laplacian
/// limits are shared by every format through [`SiteDataFile::load`].
pub trait SiteDataFile {
    /// The error type for parsing and I/O.
    type Error: Error + From<io::Error> + From<super::site_data::InputError>;

    /// Reads every row from a buffered reader, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if a row is malformed or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<SiteRecord>, Self::Error>;

    /// Reads every row from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<SiteRecord>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Reads a file and clips it to `[x_min, x_max]`.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails, positions are not strictly increasing, or too few
    /// rows fall inside the range.
    fn load<P: AsRef<Path>>(path: P, x_min: f64, x_max: f64) -> Result<SiteData, Self::Error> {
        let records = Self::read_from_path(path)?;
        Ok(SiteData::new(records, x_min, x_max)?)
    }
}
