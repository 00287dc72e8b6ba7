//! Grouping of samples into the tables that get exported: one OTU table per
//! region or control category, the sample information sheet, the similarity
//! sheet and the community analysis table.

use crate::config::Settings;
use crate::identifier::NO_VALUE;
use crate::otu::{merge_tables, OtuTable};
use crate::sample::{Sample, CONTROL_REGION};

/// Region of technical replicates, which are exported next to the samples they replicate
pub const TR_REGION: &str = "TR";

pub const SAMPLE_INFO_HEADER: [&str; 14] = [
    "SampleID",
    "SiteID",
    "Region",
    "Area",
    "PRN",
    "Site Name",
    "Sample Date",
    "Barcode",
    "Date of analysis",
    "BatchNum",
    "Sequence Counts",
    "Pass/Fail",
    "FolderNumber",
    "Notes",
];

pub const SIMILARITY_HEADER: [&str; 4] = ["FolderNumber", "Most Similar Sample", "BUB_Co", "Plate"];

/// Rows BIOSYS expects above the counts: site id and sample id of every column
#[derive(Debug, Clone, PartialEq)]
pub struct BiosysHeaders {
    pub site_ids: Vec<String>,
    pub sample_ids: Vec<String>,
}

/// Merged OTU table of one region, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSheet {
    pub region: String,
    pub table: OtuTable,
    pub biosys_headers: Option<BiosysHeaders>,
}

/// One cell of the sample information sheet
#[derive(Debug, Clone, PartialEq)]
pub enum InfoCell {
    Text(String),
    Number(f64),
}

impl From<String> for InfoCell {
    fn from(text: String) -> Self {
        InfoCell::Text(text)
    }
}

/// One line of the similarity sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityRow {
    pub folder: String,
    pub most_similar: String,
    pub score: f64,
    pub plate: String,
}

/// Folder number of the sample a technical replicate was taken from.
///
/// Replicate folders carry a two letter prefix; the original folder number
/// follows with six digits if it starts with 3 and seven if it starts with 4.
pub fn original_folder(tr_folder: &str) -> String {
    let digits: Vec<char> = tr_folder.chars().skip(2).collect();
    let len = match digits.first() {
        Some('3') => 6,
        Some('4') => 7,
        _ => return tr_folder.to_string(),
    };
    digits.into_iter().take(len).collect()
}

fn passing<'a>(samples: &'a [Sample], region: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
    samples.iter().filter(move |s| s.region == region && s.is_successful())
}

/// Samples whose metadata had no region
pub fn samples_without_region(samples: &[Sample]) -> Vec<&Sample> {
    samples.iter().filter(|s| s.region == NO_VALUE).collect()
}

/// Replicates and the samples they replicate, side by side
fn replicate_tables(samples: &[Sample]) -> Vec<&OtuTable> {
    let mut tables = Vec::new();
    for replicate in passing(samples, TR_REGION) {
        if let Some(t) = replicate.otu_table() {
            tables.push(t);
        }
        let original = original_folder(&replicate.folder);
        tables.extend(
            samples
                .iter()
                .filter(|s| s.folder == original && s.region != TR_REGION && s.count() > 1)
                .filter_map(|s| s.otu_table()),
        );
    }
    tables
}

fn biosys_headers(table: &OtuTable, contributors: &[&Sample]) -> BiosysHeaders {
    let mut site_ids = Vec::with_capacity(table.samples.len());
    let mut sample_ids = Vec::with_capacity(table.samples.len());
    for column in &table.samples {
        match contributors.iter().find(|s| &s.folder == column) {
            Some(s) => {
                site_ids.push(s.site_id.clone());
                sample_ids.push(s.sample_id.clone());
            }
            None => {
                site_ids.push(String::new());
                sample_ids.push(String::new());
            }
        }
    }
    BiosysHeaders { site_ids, sample_ids }
}

/// Builds the export table of one region from its passing samples.
///
/// Returns `None` for the no-region bucket, which is reported separately, and
/// for regions without a single passing sample.
pub fn region_sheet(region: &str, samples: &[Sample], settings: &Settings) -> Option<RegionSheet> {
    if region == NO_VALUE || region == CONTROL_REGION {
        return None;
    }

    let (table, biosys_headers) = if region == TR_REGION {
        (merge_tables(replicate_tables(samples)), None)
    } else if settings.is_control_region(region) {
        (merge_tables(passing(samples, region).filter_map(|s| s.otu_table())), None)
    } else {
        let contributors: Vec<&Sample> = passing(samples, region).filter(|s| s.otu_table().is_some()).collect();
        let table = merge_tables(contributors.iter().filter_map(|s| s.otu_table()));
        let headers = biosys_headers(&table, &contributors);
        (table, Some(headers))
    };

    if table.is_empty() {
        info!("Region {} had no passing samples", region);
        return None;
    }
    Some(RegionSheet {
        region: region.to_string(),
        table,
        biosys_headers,
    })
}

/// Samples × taxa table of every sample with reads in a kept region
pub fn community_table(samples: &[Sample], settings: &Settings) -> OtuTable {
    let keep = settings.community_regions();
    let tables = samples
        .iter()
        .filter(|s| s.count() >= 1 && keep.iter().any(|r| r == &s.region))
        .filter_map(|s| s.otu_table());
    merge_tables(tables).transpose()
}

/// Lines of the sample information sheet, in [`SAMPLE_INFO_HEADER`] order
pub fn sample_info_rows(samples: &[Sample]) -> Vec<Vec<InfoCell>> {
    samples
        .iter()
        .filter(|s| s.region != CONTROL_REGION)
        .map(|s| {
            vec![
                s.sample_id.clone().into(),
                s.site_id.clone().into(),
                s.region.clone().into(),
                s.area.clone().into(),
                s.prn.clone().into(),
                s.site_name.clone().into(),
                s.sample_date.clone().into(),
                s.barcode.clone().into(),
                s.analysis_date.to_string().into(),
                s.batch().to_string().into(),
                InfoCell::Number(s.count() as f64),
                s.pass_fail().to_string().into(),
                s.folder.clone().into(),
                s.notes_text().into(),
            ]
        })
        .collect()
}

/// Best plate neighbour of every passing sample
pub fn similarity_rows(samples: &[Sample]) -> Vec<SimilarityRow> {
    samples
        .iter()
        .filter(|s| s.is_successful())
        .map(|s| SimilarityRow {
            folder: s.folder.clone(),
            most_similar: s.most_similar_sample.clone().unwrap_or_default(),
            score: s.similarity_score,
            plate: s.plate.as_ref().map(|p| p.plate.clone()).unwrap_or_else(|| String::from(" ")),
        })
        .collect()
}
