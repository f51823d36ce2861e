use super::site_data::{InputError, SiteRecord};
use super::traits::SiteDataFile;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::BufRead;
use tracing::debug;

/// Comma-separated site data.
///
/// Each row reads `site_label, site_valence, x, defect_label, energy[, defect_label, energy]...`.
/// There is no header; fields are trimmed, lines starting with `#` are comments, and rows
/// may host different numbers of defects.
pub struct DelimitedSiteFile;

impl DelimitedSiteFile {
    const FIXED_COLUMNS: usize = 3;

    fn parse_row(row: &StringRecord) -> Result<SiteRecord, InputError> {
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let malformed = |reason: String| InputError::MalformedRow { line, reason };

        if row.len() < Self::FIXED_COLUMNS {
            return Err(malformed(format!(
                "expected at least {} columns, found {}",
                Self::FIXED_COLUMNS,
                row.len()
            )));
        }
        if (row.len() - Self::FIXED_COLUMNS) % 2 != 0 {
            return Err(malformed(
                "defect columns must come in (label, energy) pairs".to_string(),
            ));
        }

        let number = |index: usize, name: &str| -> Result<f64, InputError> {
            let field = &row[index];
            let value: f64 = field
                .parse()
                .map_err(|_| malformed(format!("invalid {name} '{field}'")))?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(malformed(format!("{name} must be finite, found '{field}'")))
            }
        };

        let label = row[0].to_string();
        if label.is_empty() {
            return Err(malformed("empty site label".to_string()));
        }
        let valence = number(1, "valence")?;
        let x = number(2, "position")?;

        let energies = (Self::FIXED_COLUMNS..row.len())
            .step_by(2)
            .map(|i| {
                let defect = row[i].to_string();
                if defect.is_empty() {
                    return Err(malformed("empty defect label".to_string()));
                }
                Ok((defect, number(i + 1, "segregation energy")?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SiteRecord::new(label, valence, x, energies))
    }
}

impl SiteDataFile for DelimitedSiteFile {
    type Error = InputError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<SiteRecord>, Self::Error> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut records = Vec::new();
        for row in csv_reader.records() {
            records.push(Self::parse_row(&row?)?);
        }
        debug!(rows = records.len(), "Read site data rows.");
        Ok(records)
    }
}
