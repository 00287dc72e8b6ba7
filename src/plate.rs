//! Extraction plate layouts. Every sheet of the plate workbook is one 8 × 12
//! plate; a cell holds the folder number of the sample extracted in that well.

use std::path::Path;

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::error::Result;
use crate::identifier::canonical_folder;

/// Rows A-H, zero-based
pub const PLATE_ROWS: usize = 8;
/// Columns 1-12, one-based as printed on the plate
pub const PLATE_COLS: usize = 12;

/// A well position: zero-based row, one-based column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Well {
    pub row: usize,
    pub col: usize,
}

impl Well {
    /// `None` if the position is not on an 8 × 12 plate
    pub fn new(row: usize, col: usize) -> Option<Well> {
        if row < PLATE_ROWS && (1..=PLATE_COLS).contains(&col) {
            Some(Well { row, col })
        } else {
            None
        }
    }

    /// The well itself and every adjacent well including diagonals, clipped at the plate edges
    pub fn neighbourhood(&self) -> Vec<Well> {
        let rows = self.row.saturating_sub(1)..=(self.row + 1).min(PLATE_ROWS - 1);
        let cols = self.col.saturating_sub(1).max(1)..=(self.col + 1).min(PLATE_COLS);

        let mut wells = Vec::with_capacity(9);
        for row in rows {
            for col in cols.clone() {
                wells.push(Well { row, col });
            }
        }
        wells
    }
}

/// Where a sample sat during extraction
#[derive(Debug, Clone, PartialEq)]
pub struct PlateLocation {
    pub plate: String,
    pub well: Well,
    pub neighbours: Vec<Well>,
}

impl PlateLocation {
    pub fn new(plate: &str, well: Well) -> Self {
        PlateLocation {
            plate: plate.to_string(),
            well,
            neighbours: well.neighbourhood(),
        }
    }

    pub fn same_plate(&self, other: &PlateLocation) -> bool {
        self.plate == other.plate
    }

    /// True if `other` is on this plate and within the neighbourhood of this well
    pub fn is_adjacent(&self, other: &PlateLocation) -> bool {
        self.same_plate(other) && self.neighbours.contains(&other.well)
    }
}

/// The filled wells of one plate sheet
#[derive(Debug, Clone, PartialEq)]
pub struct PlateSheet {
    pub name: String,
    pub wells: Vec<(Well, String)>,
}

impl PlateSheet {
    /// Reads a plate grid. The first row holds the column numbers and the
    /// first column the row letters; both are skipped.
    pub fn from_range(name: &str, range: &Range<DataType>) -> Self {
        let mut wells = Vec::new();
        for (row, cells) in range.rows().skip(1).enumerate() {
            for (col, cell) in cells.iter().enumerate().skip(1) {
                let folder = match canonical_folder(cell) {
                    Some(f) => f.to_uppercase(),
                    None => continue,
                };
                match Well::new(row, col) {
                    Some(well) => wells.push((well, folder)),
                    None => warn!(
                        "Plate {}: {} at row {}, column {} is outside of the plate, ignored",
                        name,
                        folder,
                        row + 1,
                        col
                    ),
                }
            }
        }
        PlateSheet {
            name: name.to_string(),
            wells,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }
}

/// Loads every non-empty sheet of the extraction plate workbook
pub fn read_plate_workbook(path: &Path) -> Result<Vec<PlateSheet>> {
    let mut wb: Xlsx<_> = open_workbook(path)?;
    let mut plates = Vec::new();
    for name in wb.sheet_names().to_owned() {
        let range = match wb.worksheet_range(&name) {
            Some(range) => range?,
            None => continue,
        };
        let sheet = PlateSheet::from_range(&name, &range);
        if sheet.is_empty() {
            debug!("Plate sheet {} is empty, skipping", name);
        } else {
            plates.push(sheet);
        }
    }
    info!("Imported {} extraction plates from {}", plates.len(), path.display());
    Ok(plates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_well() {
        let n = Well::new(0, 1).unwrap().neighbourhood();
        assert_eq!(n.len(), 4);
        assert!(n.contains(&Well { row: 0, col: 1 }));
        assert!(n.contains(&Well { row: 1, col: 2 }));
        assert!(n.iter().all(|w| w.col >= 1 && w.row <= 1));
    }

    #[test]
    fn inner_well() {
        let n = Well::new(3, 6).unwrap().neighbourhood();
        assert_eq!(n.len(), 9);
        assert!(n.contains(&Well { row: 3, col: 6 }));
        assert!(n.contains(&Well { row: 2, col: 5 }));
        assert!(n.contains(&Well { row: 4, col: 7 }));
    }

    #[test]
    fn far_edges_do_not_wrap() {
        let n = Well::new(7, 12).unwrap().neighbourhood();
        assert_eq!(n.len(), 4);
        assert!(n.iter().all(|w| w.row >= 6 && w.col >= 11));

        let n = Well::new(0, 6).unwrap().neighbourhood();
        assert_eq!(n.len(), 6);
    }

    #[test]
    fn off_plate() {
        assert!(Well::new(8, 1).is_none());
        assert!(Well::new(0, 0).is_none());
        assert!(Well::new(0, 13).is_none());
    }

    #[test]
    fn adjacency() {
        let a = PlateLocation::new("Plate 1", Well::new(2, 2).unwrap());
        let b = PlateLocation::new("Plate 1", Well::new(3, 3).unwrap());
        let c = PlateLocation::new("Plate 1", Well::new(5, 3).unwrap());
        let d = PlateLocation::new("Plate 2", Well::new(3, 3).unwrap());
        assert!(a.is_adjacent(&b) && b.is_adjacent(&a));
        assert!(!a.is_adjacent(&c));
        assert!(!a.is_adjacent(&d));
        assert!(a.same_plate(&c));
    }

    #[test]
    fn sheet_grid() {
        let mut range: Range<DataType> = Range::new((0, 0), (2, 3));
        range.set_value((0, 1), DataType::Int(1));
        range.set_value((0, 2), DataType::Int(2));
        range.set_value((1, 0), DataType::String(String::from("A")));
        range.set_value((1, 1), DataType::Float(501234.0));
        range.set_value((1, 2), DataType::String(String::from("b12 ")));
        range.set_value((2, 0), DataType::String(String::from("B")));
        range.set_value((2, 3), DataType::String(String::from("nS1")));

        let sheet = PlateSheet::from_range("Plate 1", &range);
        assert_eq!(
            sheet.wells,
            vec![
                (Well { row: 0, col: 1 }, String::from("501234")),
                (Well { row: 0, col: 2 }, String::from("B12")),
                (Well { row: 1, col: 3 }, String::from("NS1")),
            ]
        );
    }
}
