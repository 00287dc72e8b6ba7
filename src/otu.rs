//! OTU abundance tables: parsing of the per-run TSV exports, per-sample
//! slices and the merge into wide per-region tables.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{BiosysError, Result};
use crate::identifier::normalize_header;

/// Name of the taxon column in every OTU table
pub const TAXON_HEADER: &str = "PrefTaxon";

/// Pipelines append bookkeeping rows to OTU tables whose taxon label carries this marker
const BATCH_MARKER: &str = "batch_num";

/// One taxon and its count in every sample column of the table
#[derive(Debug, Clone, PartialEq)]
pub struct OtuRow {
    pub taxon: String,
    pub counts: Vec<u64>,
}

/// A taxon × sample count matrix. The taxon column is kept apart from the
/// count columns so it never takes part in sums or filters.
#[derive(Debug, Clone, PartialEq)]
pub struct OtuTable {
    /// Label of the index column, `PrefTaxon` for regular tables
    pub index_header: String,
    /// Labels of the count columns
    pub samples: Vec<String>,
    pub rows: Vec<OtuRow>,
}

fn parse_count(field: &str, line_no: usize) -> Result<u64> {
    let field = field.trim();
    if let Ok(n) = field.parse::<u64>() {
        return Ok(n);
    }
    match field.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        _ => Err(BiosysError::IncompatibleFormat(format!(
            "line {}: '{}' is not a read count",
            line_no, field
        ))),
    }
}

impl OtuTable {
    pub fn empty() -> Self {
        OtuTable {
            index_header: TAXON_HEADER.to_string(),
            samples: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// A table without any sample column
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Parses a tab-separated OTU table: a taxon column followed by one count
    /// column per sample. Sample headers are normalised, see [`normalize_header`].
    pub fn from_tsv<R: BufRead>(r: R) -> Result<Self> {
        let mut lines = r.lines();
        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(BiosysError::IncompatibleFormat(String::from("OTU table is empty"))),
        };

        let mut columns = header.trim_end_matches(&['\r', '\n'][..]).split('\t');
        let index_header = columns.next().unwrap_or("").trim().to_string();
        let samples: Vec<String> = columns.map(normalize_header).collect();
        if samples.is_empty() {
            return Err(BiosysError::IncompatibleFormat(String::from(
                "OTU table needs a taxon column and at least one sample column",
            )));
        }

        let mut rows = Vec::new();
        for (idx, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 2;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != samples.len() + 1 {
                return Err(BiosysError::IncompatibleFormat(format!(
                    "line {}: expected {} columns, got {}",
                    line_no,
                    samples.len() + 1,
                    fields.len()
                )));
            }
            let counts = fields[1..]
                .iter()
                .map(|f| parse_count(f, line_no))
                .collect::<Result<Vec<u64>>>()?;
            rows.push(OtuRow {
                taxon: fields[0].trim().to_string(),
                counts,
            });
        }

        Ok(OtuTable {
            index_header,
            samples,
            rows,
        })
    }

    pub fn read_tsv(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        Self::from_tsv(BufReader::new(f))
    }

    fn position(&self, sample: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == sample)
    }

    /// Two-column slice (taxon, count) for one sample, detached from this table
    pub fn slice(&self, sample: &str) -> Option<OtuTable> {
        let idx = self.position(sample)?;
        Some(OtuTable {
            index_header: self.index_header.clone(),
            samples: vec![self.samples[idx].clone()],
            rows: self
                .rows
                .iter()
                .map(|r| OtuRow {
                    taxon: r.taxon.clone(),
                    counts: vec![r.counts[idx]],
                })
                .collect(),
        })
    }

    /// Sum of a sample column, bookkeeping rows excluded
    pub fn total(&self, sample: &str) -> Option<u64> {
        let idx = self.position(sample)?;
        Some(
            self.rows
                .iter()
                .filter(|r| !r.taxon.contains(BATCH_MARKER))
                .map(|r| r.counts[idx])
                .sum(),
        )
    }

    /// Renames the sample column of a single-sample slice
    pub fn relabel(&mut self, label: &str) {
        if let [only] = self.samples.as_mut_slice() {
            *only = label.to_string();
        }
    }

    /// Inner join on the taxon column. Rows keep the order of `self`; taxa
    /// missing on either side are dropped.
    pub fn inner_join(&self, other: &OtuTable) -> OtuTable {
        let mut lookup: HashMap<&str, Vec<&OtuRow>> = HashMap::new();
        for row in &other.rows {
            lookup.entry(row.taxon.as_str()).or_default().push(row);
        }

        let mut rows = Vec::new();
        for left in &self.rows {
            if let Some(matches) = lookup.get(left.taxon.as_str()) {
                for right in matches {
                    let mut counts = left.counts.clone();
                    counts.extend_from_slice(&right.counts);
                    rows.push(OtuRow {
                        taxon: left.taxon.clone(),
                        counts,
                    });
                }
            }
        }

        let mut samples = self.samples.clone();
        samples.extend(other.samples.iter().cloned());
        OtuTable {
            index_header: self.index_header.clone(),
            samples,
            rows,
        }
    }

    pub(crate) fn without_marker_rows(&self) -> OtuTable {
        OtuTable {
            index_header: self.index_header.clone(),
            samples: self.samples.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| !r.taxon.contains(BATCH_MARKER))
                .cloned()
                .collect(),
        }
    }

    /// Removes taxa with a zero count in every sample column
    pub fn drop_zero_rows(&mut self) {
        self.rows.retain(|r| r.counts.iter().any(|&c| c != 0));
    }

    /// Samples × taxa view of the table, used for community analysis
    pub fn transpose(&self) -> OtuTable {
        let rows = self
            .samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| OtuRow {
                taxon: sample.clone(),
                counts: self.rows.iter().map(|r| r.counts[idx]).collect(),
            })
            .collect();
        OtuTable {
            index_header: String::new(),
            samples: self.rows.iter().map(|r| r.taxon.clone()).collect(),
            rows,
        }
    }
}

/// Joins per-sample slices into one wide table.
///
/// Bookkeeping rows are removed before joining. All-zero taxa are dropped only
/// once every slice has been joined, since a taxon absent from the first
/// samples may still be present in later ones.
pub fn merge_tables<'a, I>(tables: I) -> OtuTable
where
    I: IntoIterator<Item = &'a OtuTable>,
{
    let merged = tables
        .into_iter()
        .map(OtuTable::without_marker_rows)
        .fold(None, |acc: Option<OtuTable>, table| match acc {
            None => Some(table),
            Some(acc) => Some(acc.inner_join(&table)),
        });

    match merged {
        Some(mut table) => {
            table.drop_zero_rows();
            table
        }
        None => {
            warn!("Nothing to merge, no OTU tables given");
            OtuTable::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(sample: &str, rows: &[(&str, u64)]) -> OtuTable {
        OtuTable {
            index_header: TAXON_HEADER.to_string(),
            samples: vec![sample.to_string()],
            rows: rows
                .iter()
                .map(|(t, c)| OtuRow {
                    taxon: t.to_string(),
                    counts: vec![*c],
                })
                .collect(),
        }
    }

    const TSV: &str = "PrefTaxon\t501234.S1\tB12.S3\t501235\n\
                       EC\t10\t0\t3\n\
                       IE\t0\t0\t0\n\
                       batch_num\t1\t1\t1\n\
                       AM\t2500\t4\t0\n";

    #[test]
    fn parse_tsv() -> Result<()> {
        let t = OtuTable::from_tsv(TSV.as_bytes())?;
        assert_eq!(t.index_header, "PrefTaxon");
        assert_eq!(t.samples, vec!["501234", "B12S3", "501235"]);
        assert_eq!(t.rows.len(), 4);
        assert_eq!(t.total("501234"), Some(2510));
        assert_eq!(t.total("missing"), None);
        Ok(())
    }

    #[test]
    fn ragged_tsv_is_incompatible() {
        let r = OtuTable::from_tsv("PrefTaxon\tA\tB\nEC\t1\n".as_bytes());
        assert!(matches!(r, Err(BiosysError::IncompatibleFormat(_))));
        let r = OtuTable::from_tsv("PrefTaxon\n".as_bytes());
        assert!(matches!(r, Err(BiosysError::IncompatibleFormat(_))));
        let r = OtuTable::from_tsv("PrefTaxon\tA\nEC\tmany\n".as_bytes());
        assert!(matches!(r, Err(BiosysError::IncompatibleFormat(_))));
    }

    #[test]
    fn slices_are_detached() -> Result<()> {
        let t = OtuTable::from_tsv(TSV.as_bytes())?;
        let mut s = t.slice("B12S3").unwrap();
        s.relabel("B12_Run_1");
        assert_eq!(s.samples, vec!["B12_Run_1"]);
        assert_eq!(s.rows[3].counts, vec![4]);
        assert_eq!(t.samples[1], "B12S3");
        Ok(())
    }

    #[test]
    fn merge_drops_zero_rows_after_full_join() {
        let a = slice("A", &[("EC", 5), ("IE", 0), ("AM", 0), ("batch_num", 1)]);
        let b = slice("B", &[("EC", 0), ("IE", 0), ("AM", 0)]);
        let c = slice("C", &[("EC", 0), ("IE", 0), ("AM", 7)]);
        let merged = merge_tables(vec![&a, &b, &c]);

        assert_eq!(merged.samples, vec!["A", "B", "C"]);
        let taxa: Vec<&str> = merged.rows.iter().map(|r| r.taxon.as_str()).collect();
        assert_eq!(taxa, vec!["EC", "AM"]);
        assert_eq!(merged.rows[1].counts, vec![0, 0, 7]);

        // never more rows than taxa that are non-zero somewhere
        assert!(merged.rows.len() <= 2);
    }

    #[test]
    fn inner_join_drops_unshared_taxa() {
        let a = slice("A", &[("EC", 1), ("IE", 2)]);
        let b = slice("B", &[("IE", 3), ("AM", 4)]);
        let j = a.inner_join(&b);
        assert_eq!(j.rows.len(), 1);
        assert_eq!(j.rows[0].counts, vec![2, 3]);
    }

    #[test]
    fn merge_nothing() {
        let merged = merge_tables(Vec::<&OtuTable>::new());
        assert!(merged.is_empty());
        assert!(merged.rows.is_empty());
    }

    #[test]
    fn transpose_swaps_axes() {
        let a = slice("A", &[("EC", 1), ("IE", 2)]);
        let b = slice("B", &[("EC", 3), ("IE", 4)]);
        let t = merge_tables(vec![&a, &b]).transpose();
        assert_eq!(t.samples, vec!["EC", "IE"]);
        assert_eq!(t.rows[1].taxon, "B");
        assert_eq!(t.rows[1].counts, vec![3, 4]);
    }
}
