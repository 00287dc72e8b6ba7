//! Classification of control samples by the prefix of their folder name.

use std::fmt;

use crate::sample::{Sample, CONTROL_REGION};

/// The kinds of control a folder name can encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Blank,
    NoTemplate,
    Positive,
    Gblock,
    TechnicalReplicate,
    Unknown,
}

impl ControlKind {
    /// Picks the control kind from the first letter of a folder name
    pub fn from_folder(folder: &str) -> Self {
        match folder.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('b') => ControlKind::Blank,
            Some('n') => ControlKind::NoTemplate,
            Some('p') => ControlKind::Positive,
            Some('g') => ControlKind::Gblock,
            Some('t') => ControlKind::TechnicalReplicate,
            _ => ControlKind::Unknown,
        }
    }

    /// Region name the control kind is exported under
    pub fn region(&self) -> &'static str {
        match self {
            ControlKind::Blank => "Blanks",
            ControlKind::NoTemplate => "NTCs",
            ControlKind::Positive => "Positives",
            ControlKind::Gblock => "Gblocks",
            ControlKind::TechnicalReplicate => "TR",
            ControlKind::Unknown => "Unknowns",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.region())
    }
}

/// Drops the sequencing suffix (`S<n>`) from a control folder name
fn strip_run_suffix(folder: &str) -> &str {
    match folder.rfind('S') {
        Some(pos) => &folder[..pos],
        None => folder,
    }
}

/// Moves a sample out of the control region into the region of its control kind.
///
/// Only samples in the control region are touched, and since the region
/// changes, a sample is classified at most once. Returns the kind it was
/// classified as.
pub fn classify_control(sample: &mut Sample) -> Option<ControlKind> {
    if sample.region != CONTROL_REGION {
        return None;
    }

    let folder = strip_run_suffix(&sample.folder).to_string();
    let kind = ControlKind::from_folder(&folder);

    sample.sample_id = match kind {
        ControlKind::Unknown => format!("F{}", folder),
        _ => format!("{}_{}", folder, sample.batch()),
    };
    sample.region = kind.region().to_string();
    sample.folder = folder.to_uppercase();

    debug!("Control {} classified as {}", sample.folder, kind);
    Some(kind)
}
