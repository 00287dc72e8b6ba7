//! Import of the sample metadata workbook sent along with the samples.
//!
//! The two agencies use different layouts. Each layout picks its own columns
//! and turns a row into the same [`SampleFields`]; everything after that is
//! layout-independent.

use std::path::Path;

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::config::Agency;
use crate::error::{BiosysError, Result};
use crate::identifier::{canonical_folder, date_text, is_missing, normalize_id, passthrough};
use crate::sample::{Sample, SampleFields};

const EA_COLUMNS: [&str; 10] = [
    "Region",
    "Area",
    "BIOSYS site ID",
    "Water body",
    "Site/Station Name",
    "Sample Id",
    "Barcode received",
    "PRN",
    "Folder",
    "Sample Date",
];

const SEPA_COLUMNS: [&str; 4] = ["Region", "S_SAMPLING_PT_DESC", "SAMPLE_NUMBER", "SAMPLED_DATE"];

static EMPTY_CELL: DataType = DataType::Empty;

/// Text of a cell unless it is empty or NaN
fn present(cell: &DataType) -> Option<String> {
    if is_missing(cell) {
        None
    } else {
        Some(cell.to_string().trim().to_string())
    }
}

impl Agency {
    /// Header names this layout needs, in the order `sample_fields` expects them
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Agency::EA => &EA_COLUMNS,
            Agency::SEPA => &SEPA_COLUMNS,
        }
    }

    /// Maps the selected cells of one row onto the common sample fields.
    /// `cells` holds one cell per entry of [`Agency::columns`].
    pub fn sample_fields(&self, cells: &[&DataType]) -> SampleFields {
        match self {
            Agency::EA => SampleFields {
                region: present(cells[0]),
                area: present(cells[1]),
                site_id: normalize_id(cells[2]),
                site_name: present(cells[4]),
                sample_id: normalize_id(cells[5]),
                barcode: passthrough(cells[6]),
                prn: passthrough(cells[7]),
                folder: canonical_folder(cells[8]),
                sample_date: date_text(cells[9]),
            },
            Agency::SEPA => {
                // the SEPA sample number is the only identifier there is
                let sepa_num = canonical_folder(cells[2]);
                SampleFields {
                    region: present(cells[0]),
                    area: Some(String::from("area")),
                    site_id: Some(String::from("1")),
                    site_name: present(cells[1]),
                    sample_id: sepa_num.clone(),
                    barcode: sepa_num.clone(),
                    prn: sepa_num.clone(),
                    folder: sepa_num,
                    sample_date: date_text(cells[3]),
                }
            }
        }
    }
}

/// Creates one sample per row of a metadata sheet.
///
/// The first row must contain every column the agency layout needs; other
/// columns are ignored. Completely empty rows are skipped.
pub fn register_from_metadata(sheet: &Range<DataType>, agency: Agency) -> Result<Vec<Sample>> {
    let header_row: Vec<String> = match sheet.rows().next() {
        Some(row) => row.iter().map(|d| d.to_string().trim().to_string()).collect(),
        None => return Err(BiosysError::IncompatibleFormat(String::from("metadata sheet is empty"))),
    };

    let cols = agency
        .columns()
        .iter()
        .map(|name| {
            header_row.iter().position(|c| c == name).ok_or_else(|| {
                BiosysError::IncompatibleFormat(format!(
                    "could not find required column '{}' for {} metadata",
                    name, agency
                ))
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut samples = Vec::new();
    for row in sheet.rows().skip(1) {
        if row.iter().all(is_missing) {
            continue;
        }
        let cells: Vec<&DataType> = cols.iter().map(|&c| row.get(c).unwrap_or(&EMPTY_CELL)).collect();
        samples.push(Sample::new(agency.sample_fields(&cells)));
    }

    info!("Imported {} samples from {} metadata", samples.len(), agency);
    Ok(samples)
}

/// Reads the first sheet of a metadata workbook
pub fn read_metadata(xlsx: &Path, agency: Agency) -> Result<Vec<Sample>> {
    info!("Metadata input file: {}", xlsx.display());
    let mut wb: Xlsx<_> = open_workbook(xlsx)?;
    let sheetname = wb
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| BiosysError::IncompatibleFormat(String::from("metadata workbook has no sheets")))?;
    let sheet = wb
        .worksheet_range(&sheetname)
        .ok_or_else(|| BiosysError::IncompatibleFormat(format!("cannot open sheet {}", sheetname)))??;
    register_from_metadata(&sheet, agency)
}
