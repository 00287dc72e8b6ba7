use std::fmt;

use chrono::NaiveDate;

use crate::config::Settings;
use crate::identifier::{letters_only, normalize_id_str, title_case, NO_VALUE};
use crate::otu::OtuTable;
use crate::plate::PlateLocation;

/// Minimum number of reads for a sample to be used
pub const PASS_THRESHOLD: u64 = 3000;

/// Region of samples that still need to go through the control classifier
pub const CONTROL_REGION: &str = "Control";

/// Written instead of an analysis date when the run is not in the run table
pub const RUN_NOT_SET: &str = "Run metadata has not been set";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassFail {
    Successful,
    Unsuccessful,
}

impl PassFail {
    pub fn from_count(count: u64) -> Self {
        if count >= PASS_THRESHOLD {
            PassFail::Successful
        } else {
            PassFail::Unsuccessful
        }
    }
}

impl fmt::Display for PassFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassFail::Successful => write!(f, "Successful"),
            PassFail::Unsuccessful => write!(f, "Unsuccessful"),
        }
    }
}

/// Date of the sequencing run a sample was analysed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisDate {
    /// No OTU table has been assigned yet
    Unset,
    /// The run is not in the run table
    Unknown,
    On(NaiveDate),
}

impl fmt::Display for AnalysisDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisDate::Unset => write!(f, "{}", NO_VALUE),
            AnalysisDate::Unknown => write!(f, "{}", RUN_NOT_SET),
            AnalysisDate::On(d) => write!(f, "{}", Settings::format_run_date(d)),
        }
    }
}

/// Normalised metadata of one sample, as produced by the metadata layouts.
/// `None` marks a value that was missing in the workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleFields {
    pub folder: Option<String>,
    pub sample_id: Option<String>,
    pub site_id: Option<String>,
    pub area: Option<String>,
    pub region: Option<String>,
    pub prn: Option<String>,
    pub site_name: Option<String>,
    pub sample_date: Option<String>,
    pub barcode: Option<String>,
}

/// A diatom sample: its metadata, its slice of an OTU table and everything
/// later stages learn about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub folder: String,
    pub sample_id: String,
    pub site_id: String,
    pub area: String,
    pub region: String,
    pub prn: String,
    pub site_name: String,
    pub sample_date: String,
    pub barcode: String,

    pub batch_num: Option<String>,
    pub analysis_date: AnalysisDate,
    count: u64,
    otu_table: Option<OtuTable>,

    pub plate: Option<PlateLocation>,

    pub similarity_score: f64,
    pub most_similar_sample: Option<String>,
    pub notes: Vec<String>,
}

fn or_sentinel(v: Option<String>) -> String {
    v.unwrap_or_else(|| NO_VALUE.to_string())
}

impl Sample {
    pub fn new(fields: SampleFields) -> Self {
        let folder = or_sentinel(fields.folder);
        let sample_id = fields
            .sample_id
            .and_then(|id| normalize_id_str(&id))
            .unwrap_or_else(|| format!("F{}", folder));

        let region = match fields.region {
            Some(r) => title_case(&r),
            None => {
                warn!("Sample {} has no region, check input metadata file", folder);
                NO_VALUE.to_string()
            }
        };

        Sample {
            sample_id,
            site_id: or_sentinel(fields.site_id.and_then(|id| normalize_id_str(&id))),
            area: or_sentinel(fields.area.map(|a| title_case(&a))),
            region,
            prn: or_sentinel(fields.prn),
            site_name: or_sentinel(fields.site_name.map(|s| letters_only(&s))),
            sample_date: or_sentinel(fields.sample_date),
            barcode: or_sentinel(fields.barcode),
            folder,
            batch_num: None,
            analysis_date: AnalysisDate::Unset,
            count: 0,
            otu_table: None,
            plate: None,
            similarity_score: 0.0,
            most_similar_sample: None,
            notes: Vec::new(),
        }
    }

    /// A sample found in an OTU table but not in the metadata. It is put in
    /// the control region until the control classifier has looked at it.
    pub fn unlisted(folder: &str) -> Self {
        Sample::new(SampleFields {
            folder: Some(folder.to_string()),
            region: Some(CONTROL_REGION.to_string()),
            ..Default::default()
        })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn pass_fail(&self) -> PassFail {
        PassFail::from_count(self.count)
    }

    pub fn is_successful(&self) -> bool {
        self.pass_fail() == PassFail::Successful
    }

    pub fn otu_table(&self) -> Option<&OtuTable> {
        self.otu_table.as_ref()
    }

    pub(crate) fn otu_table_mut(&mut self) -> Option<&mut OtuTable> {
        self.otu_table.as_mut()
    }

    pub fn batch(&self) -> &str {
        self.batch_num.as_deref().unwrap_or(NO_VALUE)
    }

    /// Stores the sample's slice of an OTU table and derives counts and run information.
    ///
    /// `run_id` is the name of the OTU table file; the part before the first
    /// `.` is the batch number used to look up the run date.
    pub fn assign_abundance(&mut self, otus: OtuTable, run_id: Option<&str>, settings: &Settings) {
        self.count = match otus.total(&self.folder) {
            Some(total) => total,
            None => {
                warn!("Seq count for {} has been set to 0", self.folder);
                0
            }
        };
        self.otu_table = Some(otus);

        match run_id.and_then(|r| r.split('.').next()).filter(|b| !b.is_empty()) {
            Some(batch) => {
                self.analysis_date = match settings.run_date(batch) {
                    Some(date) => AnalysisDate::On(date),
                    None => {
                        warn!("{} for sample: {} {}", RUN_NOT_SET, self.folder, batch);
                        AnalysisDate::Unknown
                    }
                };
                self.batch_num = Some(batch.to_string());
            }
            None => {
                self.batch_num = None;
                self.analysis_date = AnalysisDate::Unset;
            }
        }
    }

    pub fn place_on_plate(&mut self, location: PlateLocation) {
        self.plate = Some(location);
    }

    pub fn record_best_match(&mut self, score: f64, folder: &str) {
        self.similarity_score = score;
        self.most_similar_sample = Some(folder.to_string());
    }

    pub fn amend_note(&mut self, note: &str) {
        self.notes.push(note.to_string());
    }

    pub fn notes_text(&self) -> String {
        self.notes.join(",")
    }
}
