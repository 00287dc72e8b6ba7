//! Baroni-Urbani-Buser similarity between samples extracted on the same plate.
//!
//! A sample that looks much like its neighbour on the extraction plate may
//! have been contaminated by it. For every passing sample the most similar
//! neighbouring sample is recorded, and all coefficients computed on a plate
//! are summarised.

use rayon::prelude::*;

use crate::error::{BiosysError, Result};
use crate::otu::OtuTable;
use crate::sample::Sample;

/// Presence/absence tallies of two samples over their shared taxa
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Contingency {
    /// present in both
    pub a: usize,
    /// present only in the first sample
    pub b: usize,
    /// present only in the second sample
    pub c: usize,
    /// absent in both
    pub d: usize,
}

impl Contingency {
    /// Tallies a joined two-column table.
    pub fn from_pair(pair: &OtuTable) -> Result<Self> {
        if pair.samples.len() != 2 {
            return Err(BiosysError::IncompatibleFormat(format!(
                "similarity needs exactly two sample columns, got {}",
                pair.samples.len()
            )));
        }

        let mut tally = Contingency::default();
        for row in &pair.rows {
            match (presence(row.counts[0]), presence(row.counts[1])) {
                (1, 1) => tally.a += 1,
                (0, 0) => tally.d += 1,
                (1, 0) => tally.b += 1,
                (0, 1) => tally.c += 1,
                (x, y) => {
                    return Err(BiosysError::Logic(format!(
                        "taxon {} has non-binary presence {}/{}",
                        row.taxon, x, y
                    )))
                }
            }
        }
        Ok(tally)
    }

    /// `(sqrt(ad) + a) / (sqrt(ad) + a + b + c)`, 0 if there is nothing to compare
    pub fn bub(&self) -> f64 {
        let (a, b, c, d) = (self.a as f64, self.b as f64, self.c as f64, self.d as f64);
        let shared = (a * d).sqrt();
        let denominator = shared + a + b + c;
        if denominator == 0.0 {
            0.0
        } else {
            (shared + a) / denominator
        }
    }
}

/// Reads above one count as present
fn presence(count: u64) -> u64 {
    count.min(1)
}

/// BUB coefficient of two single-sample slices.
///
/// The slices are inner-joined on taxon, so a taxon missing from either table
/// does not count towards `b`, `c` or `d`. Batch marker rows are ignored.
pub fn pair_coefficient(left: &OtuTable, right: &OtuTable) -> Result<f64> {
    Contingency::from_pair(&left.without_marker_rows().inner_join(right)).map(|c| c.bub())
}

/// Mean and spread of every coefficient computed in a similarity pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimilaritySummary {
    pub coefficients: Vec<f64>,
}

impl SimilaritySummary {
    pub fn mean(&self) -> Option<f64> {
        if self.coefficients.is_empty() {
            return None;
        }
        Some(self.coefficients.iter().sum::<f64>() / self.coefficients.len() as f64)
    }

    /// Sample standard deviation, needs at least two coefficients
    pub fn stdev(&self) -> Option<f64> {
        let n = self.coefficients.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let var = self.coefficients.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(var.sqrt())
    }
}

/// Best neighbour of one sample and every coefficient computed for it
#[derive(Debug, Default)]
struct CentreResult {
    best: Option<(usize, f64)>,
    coefficients: Vec<f64>,
}

/// Compares one sample against every other passing sample on its plate.
///
/// Candidates are visited in registry order and only a strictly higher score
/// replaces the current best, so ties go to the first candidate in the
/// registry. Candidates outside the neighbourhood are scored but never chosen.
fn score_centre(samples: &[Sample], idx: usize) -> Result<CentreResult> {
    let mut result = CentreResult::default();
    let centre = &samples[idx];
    if !centre.is_successful() {
        return Ok(result);
    }
    let (location, table) = match (centre.plate.as_ref(), centre.otu_table()) {
        (Some(l), Some(t)) => (l, t),
        _ => return Ok(result),
    };

    let mut highest = 0.0;
    for (other_idx, other) in samples.iter().enumerate() {
        if other_idx == idx || !other.is_successful() {
            continue;
        }
        let other_location = match other.plate.as_ref() {
            Some(l) if location.same_plate(l) => l,
            _ => continue,
        };
        let other_table = match other.otu_table() {
            Some(t) => t,
            None => continue,
        };

        let similarity = pair_coefficient(table, other_table)?;
        result.coefficients.push(similarity);
        if location.is_adjacent(other_location) && similarity > highest {
            highest = similarity;
            result.best = Some((other_idx, similarity));
        }
    }
    Ok(result)
}

/// Finds the most similar plate neighbour of every passing sample.
///
/// Centres are scored in parallel, each reading the registry only; the
/// results are then written back in registry order, so the outcome does not
/// depend on the thread count.
pub fn perform_similarity_checks(samples: &mut [Sample]) -> Result<SimilaritySummary> {
    info!("Performing Baroni-Urbani-Buser coefficient similarity checks...");

    let results: Vec<CentreResult> = {
        let view: &[Sample] = samples;
        (0..view.len())
            .into_par_iter()
            .map(|idx| score_centre(view, idx))
            .collect::<Result<Vec<_>>>()?
    };

    let mut summary = SimilaritySummary::default();
    for (idx, result) in results.into_iter().enumerate() {
        if let Some((best_idx, score)) = result.best {
            let folder = samples[best_idx].folder.clone();
            debug!("{} is most similar to {} ({:.3})", samples[idx].folder, folder, score);
            samples[idx].record_best_match(score, &folder);
        }
        summary.coefficients.extend(result.coefficients);
    }

    match (summary.mean(), summary.stdev()) {
        (Some(mean), Some(stdev)) => {
            info!("Mean similarity of all samples: {}", mean);
            info!("Standard deviation of similarity of all samples: {}", stdev);
        }
        (Some(mean), None) => {
            warn!("Only one similarity computed ({}), no standard deviation", mean);
        }
        _ => warn!("No sample pairs to compare, similarity summary is empty"),
    }

    Ok(summary)
}
