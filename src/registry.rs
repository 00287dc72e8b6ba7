//! The set of samples of one run of the program, built from the metadata and
//! then enriched with OTU counts and plate positions.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Settings;
use crate::control::classify_control;
use crate::error::Result;
use crate::otu::OtuTable;
use crate::plate::{PlateLocation, PlateSheet};
use crate::sample::{Sample, PASS_THRESHOLD};

#[derive(Debug)]
pub struct Registry {
    pub samples: Vec<Sample>,
    pub settings: Settings,
}

/// OTU tables directly inside `dir`, sorted by file name
fn find_otu_tables(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|ext| ext.eq_ignore_ascii_case("tsv")).unwrap_or(false))
        .collect();
    paths.sort();
    paths
}

impl Registry {
    pub fn new(samples: Vec<Sample>, settings: Settings) -> Self {
        Registry { samples, settings }
    }

    /// Hands every column of an OTU table to the sample with the same folder.
    ///
    /// A sample that already passed with an earlier table keeps it. Columns no
    /// sample claims are controls (or samples missing from the metadata); they
    /// become new samples, are classified right away and their column is
    /// renamed to their sample id. Returns the number of new samples.
    pub fn absorb_otu_table(&mut self, otus: &OtuTable, run_id: &str) -> usize {
        // only samples known before this table may claim its columns
        let known = self.samples.len();
        let mut unclaimed = Vec::new();
        for header in &otus.samples {
            let mut claimed = false;
            for sample in self.samples[..known].iter_mut().filter(|s| &s.folder == header) {
                claimed = true;
                if sample.count() > PASS_THRESHOLD {
                    debug!("{} already passed with run {}, keeping it", header, sample.batch());
                    continue;
                }
                if let Some(slice) = otus.slice(header) {
                    sample.assign_abundance(slice, Some(run_id), &self.settings);
                }
            }
            if !claimed {
                unclaimed.push(header);
            }
        }

        let created = unclaimed.len();
        for header in unclaimed {
            let mut sample = Sample::unlisted(header);
            if let Some(slice) = otus.slice(header) {
                sample.assign_abundance(slice, Some(run_id), &self.settings);
            }
            classify_control(&mut sample);
            let label = sample.sample_id.clone();
            if let Some(table) = sample.otu_table_mut() {
                table.relabel(&label);
            }
            self.samples.push(sample);
        }
        created
    }

    /// Reads every `*.tsv` OTU table in `dir`. The file name is the run id.
    pub fn import_otu_tables(&mut self, dir: &Path) -> Result<usize> {
        let paths = find_otu_tables(dir);
        if paths.is_empty() {
            warn!("No OTU tables (*.tsv) found in {}", dir.display());
        }
        for path in &paths {
            let run_id = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let otus = OtuTable::read_tsv(path)?;
            let created = self.absorb_otu_table(&otus, &run_id);
            info!(
                "{}: {} sample columns, {} not in metadata",
                run_id,
                otus.samples.len(),
                created
            );
        }
        Ok(paths.len())
    }

    /// Attaches plate positions to samples by folder.
    ///
    /// A sample appearing on more than one plate keeps the first position and
    /// gets a note for every further plate.
    pub fn assign_plates(&mut self, plates: &[PlateSheet]) {
        let mut placed = 0;
        for plate in plates {
            for (well, folder) in &plate.wells {
                for sample in self.samples.iter_mut().filter(|s| &s.folder == folder) {
                    if sample.plate.is_some() {
                        sample.amend_note(&format!("Sample also found on {}", plate.name));
                    } else {
                        sample.place_on_plate(PlateLocation::new(&plate.name, *well));
                        placed += 1;
                    }
                }
            }
        }
        info!("{} of {} samples located on extraction plates", placed, self.samples.len());
    }

    /// Distinct regions in order of first appearance
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = Vec::new();
        for s in &self.samples {
            if !regions.contains(&s.region) {
                regions.push(s.region.clone());
            }
        }
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::Well;
    use crate::sample::SampleFields;
    use std::fs::File;
    use std::io::Write;

    fn listed(folder: &str, region: &str) -> Sample {
        Sample::new(SampleFields {
            folder: Some(folder.to_string()),
            region: Some(region.to_string()),
            ..Default::default()
        })
    }

    const RUN: &str = "PrefTaxon\t501.S1\t502.S2\tB7.S3\tX9.S4\n\
                       EC\t3000\t10\t1\t0\n\
                       IE\t5\t0\t0\t2\n";

    #[test]
    fn columns_find_their_samples() -> Result<()> {
        let mut reg = Registry::new(
            vec![listed("501", "thames"), listed("502", "anglian")],
            Settings::default(),
        );
        let otus = OtuTable::from_tsv(RUN.as_bytes())?;
        let created = reg.absorb_otu_table(&otus, "Run_2.tsv");

        assert_eq!(created, 2);
        assert_eq!(reg.samples.len(), 4);
        assert_eq!(reg.samples[0].count(), 3005);
        assert!(reg.samples[0].is_successful());
        assert_eq!(reg.samples[1].count(), 10);
        assert_eq!(reg.samples[0].batch(), "Run_2");

        let blank = &reg.samples[2];
        assert_eq!(blank.region, "Blanks");
        assert_eq!(blank.folder, "B7");
        assert_eq!(blank.sample_id, "B7_Run_2");
        assert_eq!(blank.otu_table().unwrap().samples, vec!["B7_Run_2"]);

        let unknown = &reg.samples[3];
        assert_eq!(unknown.region, "Unknowns");
        assert_eq!(unknown.sample_id, "FX9");

        assert_eq!(reg.regions(), vec!["Thames", "Anglian", "Blanks", "Unknowns"]);
        Ok(())
    }

    #[test]
    fn new_controls_do_not_claim_later_columns() -> Result<()> {
        let mut reg = Registry::new(Vec::new(), Settings::default());
        let otus = OtuTable::from_tsv("PrefTaxon\tB7.S1\tB7\nEC\t10\t4000\n".as_bytes())?;
        let created = reg.absorb_otu_table(&otus, "Run_2.tsv");

        assert_eq!(created, 2);
        assert_eq!(reg.samples.len(), 2);
        assert_eq!(reg.samples[0].count(), 10);
        assert_eq!(reg.samples[1].count(), 4000);
        for blank in &reg.samples {
            assert_eq!(blank.region, "Blanks");
            assert_eq!(blank.folder, "B7");
            assert_eq!(blank.otu_table().unwrap().samples, vec!["B7_Run_2"]);
        }
        Ok(())
    }

    #[test]
    fn passing_samples_keep_their_first_table() -> Result<()> {
        let mut reg = Registry::new(vec![listed("501", "thames")], Settings::default());
        reg.absorb_otu_table(&OtuTable::from_tsv("PrefTaxon\t501\nEC\t4000\n".as_bytes())?, "Run_1.tsv");
        reg.absorb_otu_table(&OtuTable::from_tsv("PrefTaxon\t501\nEC\t10\n".as_bytes())?, "Run_2.tsv");
        assert_eq!(reg.samples.len(), 1);
        assert_eq!(reg.samples[0].count(), 4000);
        assert_eq!(reg.samples[0].batch(), "Run_1");

        // a failed sample is replaced by its re-run
        let mut reg = Registry::new(vec![listed("501", "thames")], Settings::default());
        reg.absorb_otu_table(&OtuTable::from_tsv("PrefTaxon\t501\nEC\t10\n".as_bytes())?, "Run_1.tsv");
        reg.absorb_otu_table(&OtuTable::from_tsv("PrefTaxon\t501\nEC\t4000\n".as_bytes())?, "Run_2.tsv");
        assert_eq!(reg.samples[0].count(), 4000);
        assert_eq!(reg.samples[0].batch(), "Run_2");
        Ok(())
    }

    #[test]
    fn plates_and_duplicates() {
        let mut reg = Registry::new(vec![listed("501", "thames"), listed("502", "thames")], Settings::default());
        let plates = vec![
            PlateSheet {
                name: String::from("Plate 1"),
                wells: vec![(Well::new(0, 1).unwrap(), String::from("501"))],
            },
            PlateSheet {
                name: String::from("Plate 2"),
                wells: vec![(Well::new(4, 4).unwrap(), String::from("501"))],
            },
        ];
        reg.assign_plates(&plates);

        let loc = reg.samples[0].plate.as_ref().unwrap();
        assert_eq!(loc.plate, "Plate 1");
        assert_eq!(loc.neighbours.len(), 4);
        assert_eq!(reg.samples[0].notes_text(), "Sample also found on Plate 2");
        assert!(reg.samples[1].plate.is_none());
    }

    #[test]
    fn tables_from_directory() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("biosys-registry-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        File::create(dir.join("Run_2.tsv"))?.write_all(b"PrefTaxon\t501\nEC\t10\n")?;
        File::create(dir.join("Run_1.tsv"))?.write_all(b"PrefTaxon\t501\nEC\t4000\n")?;
        File::create(dir.join("notes.txt"))?.write_all(b"not a table")?;

        let mut reg = Registry::new(vec![listed("501", "thames")], Settings::default());
        let n = reg.import_otu_tables(&dir)?;
        std::fs::remove_dir_all(&dir)?;

        assert_eq!(n, 2);
        assert_eq!(reg.samples[0].batch(), "Run_1");
        assert_eq!(reg.samples[0].analysis_date.to_string(), "25-01-19");
        Ok(())
    }
}
