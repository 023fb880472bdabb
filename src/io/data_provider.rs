//! Input data access. The simulation core queries a [`DataProvider`]; the
//! [`FileDataProvider`] reads the conventional directory layout with
//! plain-text matrices and JSON tables.

use crate::age::NUM_AGE_GROUPS;
use crate::date::Date;
use crate::error::EpiError;
use crate::secir::InfectionState;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Contact locations of the contact matrix group, in matrix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactLocation {
    Home,
    School,
    Work,
    Other,
}

impl ContactLocation {
    pub const COUNT: usize = 4;

    pub const ALL: [ContactLocation; ContactLocation::COUNT] = [
        ContactLocation::Home,
        ContactLocation::School,
        ContactLocation::Work,
        ContactLocation::Other,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// File name fragment of the contact survey data.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            ContactLocation::Home => "home",
            ContactLocation::School => "school_pf_eig",
            ContactLocation::Work => "work",
            ContactLocation::Other => "other",
        }
    }
}

/// Which variant of a contact matrix to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixVariant {
    Baseline,
    Minimum,
}

/// Which mobility data set to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilityKind {
    Commuter,
    Twitter,
}

/// Initial compartment values of one region, per age group, with reporting
/// scaling factors already applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionPopulation {
    pub region_id: i32,
    /// `compartments[age][state]` in flat state enumeration order.
    pub compartments: Vec<Vec<f64>>,
}

/// The data the core consumes to build a scenario graph.
pub trait DataProvider {
    fn read_contact_matrix(
        &self,
        location: ContactLocation,
        variant: MatrixVariant,
    ) -> Result<DMatrix<f64>, EpiError>;

    fn read_mobility_matrix(&self, kind: MobilityKind) -> Result<DMatrix<f64>, EpiError>;

    fn read_population_data(
        &self,
        region_ids: &[i32],
        date: Date,
    ) -> Result<Vec<RegionPopulation>, EpiError>;

    fn get_holidays(
        &self,
        state_id: i32,
        start: Date,
        end: Date,
    ) -> Result<Vec<(Date, Date)>, EpiError>;

    fn get_county_ids(&self) -> Result<Vec<i32>, EpiError>;

    fn get_state_id(&self, county_id: i32) -> Result<i32, EpiError>;
}

/// Parses a whitespace-separated rectangular matrix from a text file.
pub fn read_matrix_plain(path: &Path) -> Result<DMatrix<f64>, EpiError> {
    let content = fs::read_to_string(path)?;
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row: Result<Vec<f64>, _> = line.split_whitespace().map(str::parse::<f64>).collect();
        let row = row.map_err(|e| {
            EpiError::MalformedData(format!(
                "{}:{}: invalid number: {e}",
                path.display(),
                line_no + 1
            ))
        })?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(EpiError::DimensionMismatch(format!(
                    "{}:{}: row has {} entries, expected {}",
                    path.display(),
                    line_no + 1,
                    row.len(),
                    first.len()
                )));
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(EpiError::MalformedData(format!(
            "{}: empty matrix",
            path.display()
        )));
    }
    let (nrows, ncols) = (rows.len(), rows[0].len());
    Ok(DMatrix::from_fn(nrows, ncols, |i, j| rows[i][j]))
}

#[derive(Debug, Deserialize)]
struct HolidayEntry {
    state_id: i32,
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct PopulationEntry {
    region_id: i32,
    date: String,
    /// `compartments[age][state]`, unscaled reported values.
    compartments: Vec<Vec<f64>>,
}

/// Reads scenario input from a data directory:
///
/// ```text
/// <data_dir>/contacts/{baseline,minimum}_<location>.txt
/// <data_dir>/mobility/{commuter_migration_scaled,twitter_scaled_1252}.txt
/// <data_dir>/pydata/population.json
/// <data_dir>/pydata/county_ids.json
/// <data_dir>/pydata/holidays.json
/// ```
pub struct FileDataProvider {
    data_dir: PathBuf,
    /// Multiplier on reported infections to account for under-reporting,
    /// per age group.
    pub scaling_factor_infected: Vec<f64>,
    /// Multiplier on reported ICU occupancy.
    pub scaling_factor_icu: f64,
}

impl FileDataProvider {
    #[must_use]
    pub fn new(data_dir: PathBuf) -> FileDataProvider {
        FileDataProvider {
            data_dir,
            scaling_factor_infected: vec![1.0; NUM_AGE_GROUPS],
            scaling_factor_icu: 1.0,
        }
    }

    fn pydata(&self, file: &str) -> PathBuf {
        self.data_dir.join("pydata").join(file)
    }
}

impl DataProvider for FileDataProvider {
    fn read_contact_matrix(
        &self,
        location: ContactLocation,
        variant: MatrixVariant,
    ) -> Result<DMatrix<f64>, EpiError> {
        let prefix = match variant {
            MatrixVariant::Baseline => "baseline",
            MatrixVariant::Minimum => "minimum",
        };
        let path = self
            .data_dir
            .join("contacts")
            .join(format!("{prefix}_{}.txt", location.file_stem()));
        let matrix = read_matrix_plain(&path)?;
        if matrix.nrows() != NUM_AGE_GROUPS || matrix.ncols() != NUM_AGE_GROUPS {
            return Err(EpiError::DimensionMismatch(format!(
                "{}: contact matrix is {}x{}, expected {}x{}",
                path.display(),
                matrix.nrows(),
                matrix.ncols(),
                NUM_AGE_GROUPS,
                NUM_AGE_GROUPS
            )));
        }
        Ok(matrix)
    }

    fn read_mobility_matrix(&self, kind: MobilityKind) -> Result<DMatrix<f64>, EpiError> {
        let file = match kind {
            MobilityKind::Commuter => "commuter_migration_scaled.txt",
            MobilityKind::Twitter => "twitter_scaled_1252.txt",
        };
        read_matrix_plain(&self.data_dir.join("mobility").join(file))
    }

    fn read_population_data(
        &self,
        region_ids: &[i32],
        date: Date,
    ) -> Result<Vec<RegionPopulation>, EpiError> {
        let content = fs::read_to_string(self.pydata("population.json"))?;
        let entries: Vec<PopulationEntry> = serde_json::from_str(&content)?;
        let date_str = date.to_string();

        let mut result = Vec::with_capacity(region_ids.len());
        for &region_id in region_ids {
            let entry = entries
                .iter()
                .find(|e| e.region_id == region_id && e.date == date_str)
                .ok_or_else(|| {
                    EpiError::MalformedData(format!(
                        "no population data for region {region_id} at {date_str}"
                    ))
                })?;
            if entry.compartments.len() != NUM_AGE_GROUPS
                || entry
                    .compartments
                    .iter()
                    .any(|per_age| per_age.len() != InfectionState::COUNT)
            {
                return Err(EpiError::DimensionMismatch(format!(
                    "population data for region {region_id} has the wrong shape"
                )));
            }
            let mut compartments = entry.compartments.clone();
            for (age, per_age) in compartments.iter_mut().enumerate() {
                let factor = self.scaling_factor_infected[age];
                for state in [
                    InfectionState::Exposed,
                    InfectionState::InfectedNoSymptoms,
                    InfectionState::InfectedSymptoms,
                    InfectionState::InfectedSevere,
                ] {
                    per_age[state.index()] *= factor;
                }
                per_age[InfectionState::InfectedCritical.index()] *= self.scaling_factor_icu;
            }
            result.push(RegionPopulation {
                region_id,
                compartments,
            });
        }
        Ok(result)
    }

    fn get_holidays(
        &self,
        state_id: i32,
        start: Date,
        end: Date,
    ) -> Result<Vec<(Date, Date)>, EpiError> {
        let content = fs::read_to_string(self.pydata("holidays.json"))?;
        let entries: Vec<HolidayEntry> = serde_json::from_str(&content)?;
        let mut periods = Vec::new();
        for entry in entries {
            if entry.state_id != state_id {
                continue;
            }
            let period_start: Date = entry.start.parse()?;
            let period_end: Date = entry.end.parse()?;
            // Keep periods overlapping the simulation window.
            if period_end >= start && period_start <= end {
                periods.push((period_start, period_end));
            }
        }
        periods.sort();
        Ok(periods)
    }

    fn get_county_ids(&self) -> Result<Vec<i32>, EpiError> {
        let content = fs::read_to_string(self.pydata("county_ids.json"))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn get_state_id(&self, county_id: i32) -> Result<i32, EpiError> {
        // County ids carry the state in their leading digits.
        if county_id < 1000 {
            return Err(EpiError::InvalidValue(format!(
                "invalid county id {county_id}"
            )));
        }
        Ok(county_id / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn reads_plain_matrices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.txt");
        write_file(&path, "1 2 3\n4 5 6\n");
        let matrix = read_matrix_plain(&path).unwrap();
        assert_eq!(matrix.nrows(), 2);
        assert_eq!(matrix[(1, 2)], 6.0);
    }

    #[test]
    fn ragged_matrix_is_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.txt");
        write_file(&path, "1 2\n3\n");
        assert!(matches!(
            read_matrix_plain(&path),
            Err(EpiError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn garbage_matrix_is_malformed_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.txt");
        write_file(&path, "1 x\n");
        assert!(matches!(
            read_matrix_plain(&path),
            Err(EpiError::MalformedData(_))
        ));
    }

    #[test]
    fn contact_matrix_must_match_age_groups() {
        let dir = tempdir().unwrap();
        write_file(
            &dir.path().join("contacts").join("baseline_home.txt"),
            "1 2\n3 4\n",
        );
        let provider = FileDataProvider::new(dir.path().to_path_buf());
        assert!(matches!(
            provider.read_contact_matrix(ContactLocation::Home, MatrixVariant::Baseline),
            Err(EpiError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn population_data_applies_scaling_factors() {
        let dir = tempdir().unwrap();
        let mut per_age = vec![vec![0.0; InfectionState::COUNT]; NUM_AGE_GROUPS];
        per_age[0][InfectionState::Susceptible.index()] = 1000.0;
        per_age[0][InfectionState::InfectedSymptoms.index()] = 10.0;
        per_age[0][InfectionState::InfectedCritical.index()] = 2.0;
        let entry = serde_json::json!([{
            "region_id": 1001,
            "date": "2020.12.12",
            "compartments": per_age,
        }]);
        write_file(
            &dir.path().join("pydata").join("population.json"),
            &entry.to_string(),
        );
        let mut provider = FileDataProvider::new(dir.path().to_path_buf());
        provider.scaling_factor_infected = vec![2.5; NUM_AGE_GROUPS];
        provider.scaling_factor_icu = 2.0;
        let data = provider
            .read_population_data(&[1001], "2020.12.12".parse().unwrap())
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].compartments[0][InfectionState::Susceptible.index()], 1000.0);
        assert_eq!(
            data[0].compartments[0][InfectionState::InfectedSymptoms.index()],
            25.0
        );
        assert_eq!(
            data[0].compartments[0][InfectionState::InfectedCritical.index()],
            4.0
        );
    }

    #[test]
    fn holidays_filter_by_state_and_window() {
        let dir = tempdir().unwrap();
        write_file(
            &dir.path().join("pydata").join("holidays.json"),
            r#"[
                {"state_id": 9, "start": "2020.10.31", "end": "2020.11.06"},
                {"state_id": 9, "start": "2021.02.15", "end": "2021.02.19"},
                {"state_id": 8, "start": "2020.10.26", "end": "2020.10.30"}
            ]"#,
        );
        let provider = FileDataProvider::new(dir.path().to_path_buf());
        let holidays = provider
            .get_holidays(
                9,
                "2020.10.01".parse().unwrap(),
                "2020.12.31".parse().unwrap(),
            )
            .unwrap();
        assert_eq!(holidays.len(), 1);
        assert_eq!(holidays[0].0, "2020.10.31".parse().unwrap());
    }

    #[test]
    fn state_id_from_county_id() {
        let dir = tempdir().unwrap();
        let provider = FileDataProvider::new(dir.path().to_path_buf());
        assert_eq!(provider.get_state_id(9162).unwrap(), 9);
        assert_eq!(provider.get_state_id(1001).unwrap(), 1);
        assert!(provider.get_state_id(5).is_err());
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempdir().unwrap();
        let provider = FileDataProvider::new(dir.path().to_path_buf());
        assert!(matches!(
            provider.get_county_ids(),
            Err(EpiError::IoError(_))
        ));
    }
}
