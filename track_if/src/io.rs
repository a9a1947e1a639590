//! # Track Files
//!
//! Track data is stored as CSV. Two formats are used:
//!
//! - Centre lines: `x,y,right_width,left_width`, one row per centre line point, ordered in the
//!   direction of travel and never closed (the first point is not repeated at the end).
//! - Cones: `cone_type,X,Y,Z,std_X,std_Y,std_Z,right,left`, where `cone_type` is one of `blue`,
//!   `yellow`, `big_orange` or `small_orange` and `right`/`left` flag which boundary the cone
//!   belongs to.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::TrackWidth;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A centre line and the track width at each of its points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentreLine {
    pub points_m: Vec<Vector2<f64>>,
    pub widths: Vec<TrackWidth>,
}

/// Cones of a track sorted by type, plus the right and left boundaries they form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cones {
    pub blue: Vec<Vector2<f64>>,
    pub yellow: Vec<Vector2<f64>>,
    pub big_orange: Vec<Vector2<f64>>,
    pub small_orange: Vec<Vector2<f64>>,

    /// All cones flagged as part of the right boundary, whatever their colour.
    pub right: Vec<Vector2<f64>>,

    /// All cones flagged as part of the left boundary, whatever their colour.
    pub left: Vec<Vector2<f64>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CentreLineRecord {
    x: f64,
    y: f64,
    right_width: f64,
    left_width: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ConeRecord {
    cone_type: ConeType,
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
    #[serde(rename = "Z")]
    z: f64,
    #[serde(rename = "std_X")]
    std_x: f64,
    #[serde(rename = "std_Y")]
    std_y: f64,
    #[serde(rename = "std_Z")]
    std_z: f64,
    right: u8,
    left: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConeType {
    Blue,
    Yellow,
    BigOrange,
    SmallOrange,
}

#[derive(Debug, thiserror::Error)]
pub enum TrackIoError {
    #[error("Could not read track file {path:?}: {source}")]
    Read { path: PathBuf, source: csv::Error },

    #[error("Could not write track file {path:?}: {source}")]
    Write { path: PathBuf, source: csv::Error },

    #[error("Could not flush track file {path:?}: {source}")]
    Flush {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Row {row} of {path:?} contains a non-finite or negative value")]
    InvalidValue { path: PathBuf, row: usize },

    #[error("Centre line has {points} points but {widths} widths")]
    LengthMismatch { points: usize, widths: usize },
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load a centre line and its track widths.
pub fn load_centre_line<P: AsRef<Path>>(path: P) -> Result<CentreLine, TrackIoError> {
    let path = path.as_ref();
    let read_err = |source| TrackIoError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;

    let mut centre_line = CentreLine::default();

    for (row, result) in reader.deserialize::<CentreLineRecord>().enumerate() {
        let rec = result.map_err(read_err)?;

        let valid = [rec.x, rec.y, rec.right_width, rec.left_width]
            .iter()
            .all(|v| v.is_finite())
            && rec.right_width >= 0.0
            && rec.left_width >= 0.0;
        if !valid {
            return Err(TrackIoError::InvalidValue {
                path: path.to_path_buf(),
                row,
            });
        }

        centre_line.points_m.push(Vector2::new(rec.x, rec.y));
        centre_line
            .widths
            .push(TrackWidth::new(rec.right_width, rec.left_width));
    }

    debug!(
        "Loaded centre line of {} points from {:?}",
        centre_line.points_m.len(),
        path
    );

    Ok(centre_line)
}

/// Save a centre line and its track widths.
pub fn save_centre_line<P: AsRef<Path>>(
    path: P,
    centre_line: &CentreLine,
) -> Result<(), TrackIoError> {
    if centre_line.points_m.len() != centre_line.widths.len() {
        return Err(TrackIoError::LengthMismatch {
            points: centre_line.points_m.len(),
            widths: centre_line.widths.len(),
        });
    }

    let path = path.as_ref();
    let write_err = |source| TrackIoError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;

    for (point, width) in centre_line.points_m.iter().zip(centre_line.widths.iter()) {
        writer
            .serialize(CentreLineRecord {
                x: point.x,
                y: point.y,
                right_width: width.right_m,
                left_width: width.left_m,
            })
            .map_err(write_err)?;
    }

    writer.flush().map_err(|source| TrackIoError::Flush {
        path: path.to_path_buf(),
        source,
    })
}

/// Load cones, sorting them by colour and by boundary.
pub fn load_cones<P: AsRef<Path>>(path: P) -> Result<Cones, TrackIoError> {
    let path = path.as_ref();
    let read_err = |source| TrackIoError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;

    let mut cones = Cones::default();

    for (row, result) in reader.deserialize::<ConeRecord>().enumerate() {
        let rec = result.map_err(read_err)?;

        if !rec.x.is_finite() || !rec.y.is_finite() {
            return Err(TrackIoError::InvalidValue {
                path: path.to_path_buf(),
                row,
            });
        }

        let pos = Vector2::new(rec.x, rec.y);

        match rec.cone_type {
            ConeType::Blue => cones.blue.push(pos),
            ConeType::Yellow => cones.yellow.push(pos),
            ConeType::BigOrange => cones.big_orange.push(pos),
            ConeType::SmallOrange => cones.small_orange.push(pos),
        }

        if rec.right == 1 {
            cones.right.push(pos);
        }
        if rec.left == 1 {
            cones.left.push(pos);
        }
    }

    debug!(
        "Loaded {} right and {} left cones from {:?}",
        cones.right.len(),
        cones.left.len(),
        path
    );

    Ok(cones)
}

/// Save cones by colour.
///
/// Blue cones are written as left boundary cones and yellow ones as right boundary cones. Orange
/// cones are assigned to the right boundary if they have positive x and to the left one if they
/// have negative x. The `right` and `left` fields of `cones` are not used.
pub fn save_cones<P: AsRef<Path>>(path: P, cones: &Cones) -> Result<(), TrackIoError> {
    let path = path.as_ref();
    let write_err = |source| TrackIoError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;

    let rows = cones
        .blue
        .iter()
        .map(|p| (ConeType::Blue, p, 0, 1))
        .chain(cones.yellow.iter().map(|p| (ConeType::Yellow, p, 1, 0)))
        .chain(
            cones
                .big_orange
                .iter()
                .map(|p| (ConeType::BigOrange, p, (p.x > 0.0) as u8, (p.x < 0.0) as u8)),
        )
        .chain(
            cones
                .small_orange
                .iter()
                .map(|p| (ConeType::SmallOrange, p, (p.x > 0.0) as u8, (p.x < 0.0) as u8)),
        );

    for (cone_type, pos, right, left) in rows {
        writer
            .serialize(ConeRecord {
                cone_type,
                x: pos.x,
                y: pos.y,
                z: 0.0,
                std_x: 0.0,
                std_y: 0.0,
                std_z: 0.0,
                right,
                left,
            })
            .map_err(write_err)?;
    }

    writer.flush().map_err(|source| TrackIoError::Flush {
        path: path.to_path_buf(),
        source,
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("track_if_{}_{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_centre_line_file() -> Result<(), TrackIoError> {
        let path = temp_path("centre_line.csv");

        let centre_line = CentreLine {
            points_m: vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.5, 0.25),
                Vector2::new(3.0, -0.125),
            ],
            widths: vec![
                TrackWidth::new(1.5, 1.5),
                TrackWidth::new(2.0, 1.0),
                TrackWidth::new(1.25, 1.75),
            ],
        };

        save_centre_line(&path, &centre_line)?;
        let loaded = load_centre_line(&path)?;
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, centre_line);

        Ok(())
    }

    #[test]
    fn test_centre_line_invalid() {
        let path = temp_path("centre_line_invalid.csv");
        std::fs::write(&path, "x,y,right_width,left_width\n0.0,0.0,1.0,1.0\n1.0,0.0,-1.0,1.0\n")
            .unwrap();

        let res = load_centre_line(&path);
        std::fs::remove_file(&path).ok();

        match res {
            Err(TrackIoError::InvalidValue { row, .. }) => assert_eq!(row, 1),
            other => panic!("Expected an invalid value error, got {:?}", other),
        }

        let mismatched = CentreLine {
            points_m: vec![Vector2::zeros()],
            widths: vec![],
        };
        assert!(matches!(
            save_centre_line(temp_path("never_written.csv"), &mismatched),
            Err(TrackIoError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_cones_file() -> Result<(), TrackIoError> {
        let path = temp_path("cones.csv");

        let cones = Cones {
            blue: vec![Vector2::new(-1.5, 0.0), Vector2::new(-1.5, 5.0)],
            yellow: vec![Vector2::new(1.5, 0.0)],
            big_orange: vec![Vector2::new(2.0, 10.0), Vector2::new(-2.0, 10.0)],
            small_orange: vec![],
            ..Default::default()
        };

        save_cones(&path, &cones)?;
        let loaded = load_cones(&path)?;
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.blue, cones.blue);
        assert_eq!(loaded.yellow, cones.yellow);
        assert_eq!(loaded.big_orange, cones.big_orange);
        assert!(loaded.small_orange.is_empty());

        // Boundaries are rebuilt from the flags
        assert_eq!(
            loaded.right,
            vec![Vector2::new(1.5, 0.0), Vector2::new(2.0, 10.0)]
        );
        assert_eq!(
            loaded.left,
            vec![
                Vector2::new(-1.5, 0.0),
                Vector2::new(-1.5, 5.0),
                Vector2::new(-2.0, 10.0)
            ]
        );

        Ok(())
    }

    #[test]
    fn test_cones_unknown_type() {
        let path = temp_path("cones_unknown.csv");
        std::fs::write(
            &path,
            "cone_type,X,Y,Z,std_X,std_Y,std_Z,right,left\npurple,0.0,0.0,0.0,0.0,0.0,0.0,1,0\n",
        )
        .unwrap();

        let res = load_cones(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(res, Err(TrackIoError::Read { .. })));
    }
}
