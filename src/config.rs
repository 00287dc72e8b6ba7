use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::arg_enum;
use serde::Deserialize;
use structopt::StructOpt;

use crate::error::{BiosysError, Result};

arg_enum! {
    /// Layout of the metadata workbook, depending on the agency that sent it
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Agency {
        EA,
        SEPA
    }
}

#[derive(StructOpt, Debug)]
#[structopt(name = "biosys", about = "Converts diatom OTU tables into BIOSYS upload sheets")]
pub struct Opt {
    /// Metadata workbook (.xlsx) describing the samples, relative to --input-dir
    #[structopt(default_value = "infoEA.xlsx", long, parse(from_os_str))]
    pub input_xl: PathBuf,

    /// Directory holding the metadata, the OTU tables (*.tsv) and the plate workbook
    #[structopt(default_value = "Data", long, parse(from_os_str))]
    pub input_dir: PathBuf,

    /// Agency layout of the metadata workbook
    #[structopt(possible_values = &Agency::variants(), default_value = "EA", case_insensitive = true, long)]
    pub area: Agency,

    /// Extraction plate workbook, relative to --input-dir
    #[structopt(default_value = "Plates.xlsx", long, parse(from_os_str))]
    pub plate_info: PathBuf,

    /// Perform Baroni-Urbani-Buser similarity checks between plate neighbours
    #[structopt(long)]
    pub similarity: bool,

    /// JSON file overriding run dates, control regions and the community keep list
    #[structopt(long, parse(from_os_str))]
    pub settings: Option<PathBuf>,

    /// Workbook receiving the per-region BIOSYS sheets
    #[structopt(default_value = "output.xlsx", long, parse(from_os_str))]
    pub output: PathBuf,

    /// Workbook receiving the community analysis table
    #[structopt(default_value = "otus_all.xlsx", long, parse(from_os_str))]
    pub community_output: PathBuf,

    /// Number of threads to use (default: all cores)
    #[structopt(default_value = "0", long, short)]
    pub threads: usize,
}

/// Lookup tables injected into the registry and the exporters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sequencing run name (e.g. `Run_3`) to the date the run was performed, `dd-mm-yy`
    #[serde(deserialize_with = "de_run_dates")]
    pub run_dates: HashMap<String, NaiveDate>,

    /// Regions that hold control samples rather than sampled sites
    pub control_regions: Vec<String>,

    /// Regions exported for community analysis. A single `all` keeps `all_regions`.
    pub community_keep: Vec<String>,

    /// Every known region, used when `community_keep` is `all`
    pub all_regions: Vec<String>,
}

const RUN_DATE_FORMAT: &str = "%d-%m-%y";

const DEFAULT_RUN_DATES: [(&str, &str); 17] = [
    ("Run_1", "25-01-19"),
    ("Run_2", "15-01-19"),
    ("Run_3", "18-01-19"),
    ("Run_4", "21-01-19"),
    ("Run_5", "18-01-19"),
    ("Run_6", "24-01-19"),
    ("Run_7", "28-01-19"),
    ("Run_8", "31-01-19"),
    ("Run_9", "04-02-19"),
    ("Run_10", "07-02-19"),
    ("Run_11", "12-02-19"),
    ("Run_12", "15-02-19"),
    ("Run_13", "23-02-19"),
    ("Run_14", "28-03-19"),
    ("Run_15", "19-04-19"),
    ("Run_16", "23-04-19"),
    ("Run_17", "17-05-19"),
];

fn to_strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn parse_run_date(run: &str, date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, RUN_DATE_FORMAT).map_err(|e| {
        BiosysError::IncompatibleFormat(format!("date '{}' of run {}: {}", date, run, e))
    })
}

fn de_run_dates<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = HashMap::<String, String>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(run, date)| {
            let parsed = parse_run_date(&run, &date).map_err(serde::de::Error::custom)?;
            Ok((run, parsed))
        })
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        let run_dates = DEFAULT_RUN_DATES
            .iter()
            .filter_map(|(run, date)| {
                NaiveDate::parse_from_str(date, RUN_DATE_FORMAT)
                    .ok()
                    .map(|d| (run.to_string(), d))
            })
            .collect();

        Settings {
            run_dates,
            control_regions: to_strings(&["Blanks", "Positives", "Gblocks", "NTCs", "Unknowns", "TR"]),
            community_keep: to_strings(&["all"]),
            all_regions: to_strings(&[
                "Anglian", "Midlands", "South West", "Southern", "North West", "North East",
                "Thames", "Unknowns", "Blanks", "Positives", "Gblocks", "NTCs", "TR",
                "Aberdeen", "Perth", "Eurocentrl", "Dingwall", "Dumfries", "Galashiels",
                "Bowlblank",
            ]),
        }
    }
}

impl Settings {
    /// Reads settings from a JSON file. Keys that are left out keep their defaults.
    pub fn from_json(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(f))?)
    }

    /// Date of a sequencing run, `None` if the run is unknown
    pub fn run_date(&self, run: &str) -> Option<NaiveDate> {
        self.run_dates.get(run).copied()
    }

    pub fn is_control_region(&self, region: &str) -> bool {
        self.control_regions.iter().any(|r| r == region)
    }

    /// Regions that go into the community analysis export
    pub fn community_regions(&self) -> &[String] {
        match self.community_keep.first() {
            Some(first) if first == "all" => &self.all_regions,
            _ => &self.community_keep,
        }
    }

    pub fn format_run_date(date: &NaiveDate) -> String {
        date.format(RUN_DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_options() {
        let opt = Opt::from_iter(&["biosys", "--input-xl", "infoSEPA.xlsx", "--plate-info", "plates/2019.xlsx"]);
        assert_eq!(opt.input_xl, PathBuf::from("infoSEPA.xlsx"));
        assert_eq!(opt.plate_info, PathBuf::from("plates/2019.xlsx"));
        assert_eq!(opt.input_dir, PathBuf::from("Data"));
    }

    #[test]
    fn default_run_table() {
        let s = Settings::default();
        assert_eq!(s.run_dates.len(), 17);
        let d = s.run_date("Run_14").unwrap();
        assert_eq!(Settings::format_run_date(&d), "28-03-19");
        assert!(s.run_date("Run_99").is_none());
    }

    #[test]
    fn keep_all_expands() {
        let mut s = Settings::default();
        assert!(s.community_regions().iter().any(|r| r == "Thames"));
        s.community_keep = vec![String::from("Perth")];
        assert_eq!(s.community_regions(), &[String::from("Perth")]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{"run_dates": {"Run_20": "01-06-19"}}"#).unwrap();
        assert_eq!(s.run_dates.len(), 1);
        assert!(s.run_date("Run_20").is_some());
        assert!(s.is_control_region("Blanks"));
        assert!(!s.is_control_region("Thames"));
    }

    #[test]
    fn bad_run_date_is_rejected() {
        let s: std::result::Result<Settings, _> =
            serde_json::from_str(r#"{"run_dates": {"Run_20": "June"}}"#);
        assert!(s.is_err());
    }
}
