//! Writes the result workbooks and reports.

use std::convert::TryInto;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use xlsxwriter::{Workbook, Worksheet};

use crate::config::Settings;
use crate::error::{BiosysError, Result};
use crate::otu::OtuTable;
use crate::partition::{
    community_table, region_sheet, sample_info_rows, samples_without_region, similarity_rows,
    InfoCell, RegionSheet, SAMPLE_INFO_HEADER, SIMILARITY_HEADER,
};
use crate::registry::Registry;
use crate::sample::Sample;

const SAMPLE_INFO_SHEET: &str = "Sample batch information";
const SIMILARITY_SHEET: &str = "BUB_coefficient";
const COMMUNITY_SHEET: &str = "comunity_analysis";

fn cell(row: usize, col: usize) -> Result<(u32, u16)> {
    let r: u32 = row
        .try_into()
        .map_err(|_| BiosysError::IncompatibleFormat(format!("row {} does not fit into a worksheet", row)))?;
    let c: u16 = col
        .try_into()
        .map_err(|_| BiosysError::IncompatibleFormat(format!("column {} does not fit into a worksheet", col)))?;
    Ok((r, c))
}

fn write_str(sheet: &mut Worksheet, row: usize, col: usize, text: &str) -> Result<()> {
    let (r, c) = cell(row, col)?;
    sheet.write_string(r, c, text, None)?;
    Ok(())
}

fn write_num(sheet: &mut Worksheet, row: usize, col: usize, n: f64) -> Result<()> {
    let (r, c) = cell(row, col)?;
    sheet.write_number(r, c, n, None)?;
    Ok(())
}

fn workbook(path: &Path) -> Result<Workbook> {
    let name = path
        .to_str()
        .ok_or_else(|| BiosysError::IncompatibleFormat(format!("unusable output path {}", path.display())))?;
    Ok(Workbook::new(name))
}

/// Writes an OTU table with its index column, optionally with extra labelled
/// rows between the column header and the counts
fn write_table(sheet: &mut Worksheet, table: &OtuTable, extra_rows: &[(&str, &[String])]) -> Result<()> {
    write_str(sheet, 0, 0, &table.index_header)?;
    for (col, sample) in table.samples.iter().enumerate() {
        write_str(sheet, 0, col + 1, sample)?;
    }

    let mut row = 1;
    for (label, values) in extra_rows {
        write_str(sheet, row, 0, label)?;
        for (col, value) in values.iter().enumerate() {
            write_str(sheet, row, col + 1, value)?;
        }
        row += 1;
    }

    for otu in &table.rows {
        write_str(sheet, row, 0, &otu.taxon)?;
        for (col, count) in otu.counts.iter().enumerate() {
            write_num(sheet, row, col + 1, *count as f64)?;
        }
        row += 1;
    }
    Ok(())
}

fn write_region(wb: &Workbook, region: &RegionSheet) -> Result<()> {
    let mut sheet = wb.add_worksheet(Some(region.region.as_str()))?;
    match &region.biosys_headers {
        Some(h) => write_table(
            &mut sheet,
            &region.table,
            &[("siteid", h.site_ids.as_slice()), ("sampleid", h.sample_ids.as_slice())],
        ),
        None => write_table(&mut sheet, &region.table, &[]),
    }
}

fn write_sample_info(wb: &Workbook, samples: &[Sample]) -> Result<()> {
    let mut sheet = wb.add_worksheet(Some(SAMPLE_INFO_SHEET))?;
    for (col, title) in SAMPLE_INFO_HEADER.iter().enumerate() {
        write_str(&mut sheet, 0, col, title)?;
    }
    for (row, line) in sample_info_rows(samples).iter().enumerate() {
        for (col, value) in line.iter().enumerate() {
            match value {
                InfoCell::Text(text) => write_str(&mut sheet, row + 1, col, text)?,
                InfoCell::Number(n) => write_num(&mut sheet, row + 1, col, *n)?,
            }
        }
    }
    Ok(())
}

fn write_similarity(wb: &Workbook, samples: &[Sample]) -> Result<()> {
    let mut sheet = wb.add_worksheet(Some(SIMILARITY_SHEET))?;
    for (col, title) in SIMILARITY_HEADER.iter().enumerate() {
        write_str(&mut sheet, 0, col, title)?;
    }
    for (idx, line) in similarity_rows(samples).iter().enumerate() {
        let row = idx + 1;
        write_str(&mut sheet, row, 0, &line.folder)?;
        write_str(&mut sheet, row, 1, &line.most_similar)?;
        write_num(&mut sheet, row, 2, line.score)?;
        write_str(&mut sheet, row, 3, &line.plate)?;
    }
    Ok(())
}

/// Writes the main workbook: similarity results (if computed), the sample
/// information sheet and one sheet per region.
///
/// A region that cannot be written is reported and skipped.
pub fn write_output(path: &Path, registry: &Registry, with_similarity: bool) -> Result<()> {
    let wb = workbook(path)?;

    if with_similarity {
        write_similarity(&wb, &registry.samples)?;
    }
    write_sample_info(&wb, &registry.samples)?;

    for region in registry.regions() {
        info!("Exporting region {}", region);
        if let Some(sheet) = region_sheet(&region, &registry.samples, &registry.settings) {
            if let Err(e) = write_region(&wb, &sheet) {
                error!("Could not export region {}: {}", region, e);
            }
        }
    }

    wb.close()?;
    info!("Results written to {}", path.display());
    Ok(())
}

/// Writes the samples × taxa table used for community analysis
pub fn write_community(path: &Path, samples: &[Sample], settings: &Settings) -> Result<()> {
    info!("Exporting all otus for community analysis");
    let table = community_table(samples, settings);
    let wb = workbook(path)?;
    {
        let mut sheet = wb.add_worksheet(Some(COMMUNITY_SHEET))?;
        write_table(&mut sheet, &table, &[])?;
    }
    wb.close()?;
    Ok(())
}

/// Lists samples whose metadata had no region. Returns the number of samples listed.
pub fn write_no_region_report(path: &Path, samples: &[Sample]) -> Result<usize> {
    let orphans = samples_without_region(samples);
    if orphans.is_empty() {
        return Ok(0);
    }

    let mut report = String::from("Region for the below samples is no_value\n");
    report += "Folder_id\tCounts\tSample_id\tSite_id\tPRN\n";
    for s in &orphans {
        report += &format!("{}\t{}\t{}\t{}\t{}\n", s.folder, s.count(), s.sample_id, s.site_id, s.prn);
    }
    File::create(path)?.write_all(report.as_bytes())?;
    warn!("{} samples have no region, see {}", orphans.len(), path.display());
    Ok(orphans.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleFields;
    use calamine::{open_workbook, DataType, Reader, Xlsx};

    #[test]
    fn no_region_report() -> Result<()> {
        let samples = vec![
            Sample::new(SampleFields {
                folder: Some(String::from("77")),
                ..Default::default()
            }),
            Sample::new(SampleFields {
                folder: Some(String::from("78")),
                region: Some(String::from("Thames")),
                ..Default::default()
            }),
        ];
        let path = std::env::temp_dir().join(format!("biosys-noregion-{}.text", std::process::id()));
        assert_eq!(write_no_region_report(&path, &samples)?, 1);
        let text = std::fs::read_to_string(&path)?;
        std::fs::remove_file(&path)?;

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "77\t0\tF77\tno_value\tno_value");
        Ok(())
    }

    #[test]
    fn nothing_to_report() -> Result<()> {
        let path = std::env::temp_dir().join("biosys-never-written.text");
        assert_eq!(write_no_region_report(&path, &[])?, 0);
        assert!(!path.exists());
        Ok(())
    }

    fn passing(folder: &str, region: &str) -> Result<Sample> {
        let mut s = Sample::new(SampleFields {
            folder: Some(folder.to_string()),
            ..Default::default()
        });
        s.region = region.to_string();
        let table = OtuTable::from_tsv(format!("PrefTaxon\t{}\nEC\t3500\nIE\t20\n", folder).as_bytes())?;
        s.assign_abundance(table, Some("Run_1.tsv"), &Settings::default());
        Ok(s)
    }

    #[test]
    fn unwritable_regions_are_skipped() -> Result<()> {
        let registry = Registry::new(
            vec![passing("11", "Thames")?, passing("12", "North/East")?],
            Settings::default(),
        );
        let path = std::env::temp_dir().join(format!("biosys-output-{}.xlsx", std::process::id()));
        write_output(&path, &registry, false)?;
        assert!(path.exists());

        let names = {
            let wb: Xlsx<_> = open_workbook(&path)?;
            wb.sheet_names().to_vec()
        };
        std::fs::remove_file(&path)?;
        assert_eq!(names, vec![SAMPLE_INFO_SHEET, "Thames"]);
        Ok(())
    }

    #[test]
    fn counts_are_numbers() -> Result<()> {
        let registry = Registry::new(vec![passing("11", "Thames")?], Settings::default());
        let path = std::env::temp_dir().join(format!("biosys-counts-{}.xlsx", std::process::id()));
        write_output(&path, &registry, false)?;

        let info = {
            let mut wb: Xlsx<_> = open_workbook(&path)?;
            wb.worksheet_range(SAMPLE_INFO_SHEET)
                .ok_or_else(|| BiosysError::Logic(String::from("sample information sheet missing")))??
        };
        std::fs::remove_file(&path)?;
        assert_eq!(info.get_value((1, 10)), Some(&DataType::Float(3520.0)));
        assert_eq!(info.get_value((1, 12)), Some(&DataType::String(String::from("11"))));
        Ok(())
    }

    #[test]
    fn cells_fit_worksheet() {
        assert_eq!(cell(3, 4).unwrap(), (3, 4));
        assert!(cell(0, 70_000).is_err());
    }
}
