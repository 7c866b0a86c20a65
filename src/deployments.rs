//! Deployment metadata.
//!
//! The deployments CSV is the hand-maintained registry of camera
//! deployments: which wind meter sat next to which camera, who observed the
//! site, how far the camera stood from the cluster. The lag builder
//! left-joins a handful of its columns onto the output; the wind stage uses
//! `wind_meter_name` to pick each deployment's `.s3db` store.
//!
//! Spreadsheet exports drift, so loading is forgiving: only `deployment_id`
//! is mandatory, and every absent metadata column is warned about once and
//! then read as missing for every row.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::logging::{self, Stage};
use crate::model::PipelineError;

/// Metadata columns the lag output carries, plus the wind-meter link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deployment {
    pub deployment_id: String,
    pub wind_meter_name: Option<String>,
    pub observer: Option<String>,
    pub horizontal_dist_to_cluster_m: Option<f64>,
    pub grove: Option<String>,
    pub view_id: Option<String>,
}

pub struct DeploymentTable {
    by_id: HashMap<String, Deployment>,
    /// Metadata columns absent from the file, kept for the run summary.
    pub missing_columns: Vec<String>,
}

const METADATA_COLUMNS: [&str; 5] = [
    "wind_meter_name",
    "Observer",
    "horizontal_dist_to_cluster_m",
    "grove",
    "view_id",
];

impl DeploymentTable {
    /// An empty table, used when the pipeline runs without a metadata file.
    pub fn empty() -> Self {
        DeploymentTable {
            by_id: HashMap::new(),
            missing_columns: METADATA_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| PipelineError::Io {
            path: path.display().to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::Malformed {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?
            .clone();

        let index_of = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
        };

        let id_idx = index_of("deployment_id").ok_or_else(|| PipelineError::Malformed {
            path: path.display().to_string(),
            detail: "missing required column 'deployment_id'".to_string(),
        })?;

        let mut missing_columns = Vec::new();
        let mut column_indices = HashMap::new();
        for col in METADATA_COLUMNS {
            match index_of(col) {
                Some(idx) => {
                    column_indices.insert(col, idx);
                }
                None => {
                    logging::warn(
                        Stage::Metadata,
                        None,
                        &format!("Deployments file lacks column '{}'; it will be blank", col),
                    );
                    missing_columns.push(col.to_string());
                }
            }
        }

        let mut by_id = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| PipelineError::Malformed {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;

            let Some(deployment_id) = record.get(id_idx).filter(|id| !id.is_empty()) else {
                continue;
            };

            let field = |col: &str| -> Option<String> {
                column_indices
                    .get(col)
                    .and_then(|&idx| record.get(idx))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from)
            };

            by_id.insert(
                deployment_id.to_string(),
                Deployment {
                    deployment_id: deployment_id.to_string(),
                    wind_meter_name: field("wind_meter_name"),
                    observer: field("Observer"),
                    horizontal_dist_to_cluster_m: field("horizontal_dist_to_cluster_m")
                        .and_then(|v| v.parse().ok()),
                    grove: field("grove"),
                    view_id: field("view_id"),
                },
            );
        }

        logging::info(
            Stage::Metadata,
            None,
            &format!("Loaded metadata for {} deployments", by_id.len()),
        );
        Ok(DeploymentTable {
            by_id,
            missing_columns,
        })
    }

    pub fn get(&self, deployment_id: &str) -> Option<&Deployment> {
        self.by_id.get(deployment_id)
    }

    /// Resolve each deployment's wind store path through its
    /// `wind_meter_name`, keeping only deployments whose named store exists.
    pub fn wind_store_paths(
        &self,
        stores: &HashMap<String, PathBuf>,
    ) -> HashMap<String, PathBuf> {
        let mut paths = HashMap::new();
        for (id, deployment) in &self.by_id {
            let Some(meter) = &deployment.wind_meter_name else {
                continue;
            };
            match stores.get(meter) {
                Some(path) => {
                    paths.insert(id.clone(), path.clone());
                }
                None => {
                    logging::warn(
                        Stage::Wind,
                        Some(id),
                        &format!("Wind meter '{}' has no store on disk", meter),
                    );
                }
            }
        }
        paths
    }
}

// ---------------------------------------------------------------------------
// Source merging
// ---------------------------------------------------------------------------

/// Counts reported after merging the QGIS and label exports.
#[derive(Debug, PartialEq)]
pub struct CombineSummary {
    pub combined: usize,
    pub qgis_records: usize,
    pub label_records: usize,
    pub qgis_only: Vec<String>,
    pub label_only: Vec<String>,
}

const QGIS_COLUMNS: [&str; 16] = [
    "camera_name",
    "wind_meter_name",
    "Deployed_time",
    "Recovered_time",
    "notes",
    "height_m",
    "horizontal_dist_to_cluster_m",
    "view_direction",
    "cluster_count",
    "deployment_id",
    "status",
    "photo_interval_min",
    "monarchs_present",
    "youtube_url",
    "latitude",
    "longitude",
];

// Label columns whose names collide with QGIS columns get a label_ prefix.
const LABEL_COLUMNS: [(&str, &str); 6] = [
    ("Status", "label_status"),
    ("Percent Complete", "Percent Complete"),
    ("Observer", "Observer"),
    ("Effort", "Effort"),
    ("Notes", "label_notes"),
    ("Youtube Link", "label_youtube_url"),
];

/// Merge the QGIS export (keyed on `deployment_id`) with the observer label
/// sheet (keyed on `Deployment ID`, usually saved with a UTF-8 BOM) into one
/// deployments file covering the union of ids. Ids present in only one
/// source get blank fields from the other.
pub fn combine_sources(
    qgis_path: &Path,
    label_path: &Path,
    output_path: &Path,
) -> Result<CombineSummary, PipelineError> {
    let qgis = read_keyed_csv(qgis_path, "deployment_id")?;
    let labels = read_keyed_csv(label_path, "Deployment ID")?;

    let mut all_ids: Vec<String> = qgis.keys().chain(labels.keys()).cloned().collect();
    all_ids.sort();
    all_ids.dedup();

    let mut writer = csv::Writer::from_path(output_path).map_err(|e| PipelineError::Io {
        path: output_path.display().to_string(),
        source: std::io::Error::other(e.to_string()),
    })?;

    let header: Vec<&str> = QGIS_COLUMNS
        .iter()
        .copied()
        .chain(LABEL_COLUMNS.iter().map(|&(_, renamed)| renamed))
        .collect();
    writer
        .write_record(&header)
        .map_err(|e| write_error(output_path, e))?;

    for id in &all_ids {
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        match qgis.get(id) {
            Some(fields) => {
                for col in QGIS_COLUMNS {
                    row.push(fields.get(col).cloned().unwrap_or_default());
                }
            }
            None => {
                for col in QGIS_COLUMNS {
                    row.push(if col == "deployment_id" {
                        id.clone()
                    } else {
                        String::new()
                    });
                }
            }
        }
        let label_fields = labels.get(id);
        for (original, _) in LABEL_COLUMNS {
            row.push(
                label_fields
                    .and_then(|f| f.get(original))
                    .cloned()
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&row)
            .map_err(|e| write_error(output_path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::Io {
        path: output_path.display().to_string(),
        source: e,
    })?;

    let qgis_only: Vec<String> = all_ids
        .iter()
        .filter(|id| qgis.contains_key(*id) && !labels.contains_key(*id))
        .cloned()
        .collect();
    let label_only: Vec<String> = all_ids
        .iter()
        .filter(|id| labels.contains_key(*id) && !qgis.contains_key(*id))
        .cloned()
        .collect();

    Ok(CombineSummary {
        combined: all_ids.len(),
        qgis_records: qgis.len(),
        label_records: labels.len(),
        qgis_only,
        label_only,
    })
}

fn write_error(path: &Path, e: csv::Error) -> PipelineError {
    PipelineError::Io {
        path: path.display().to_string(),
        source: std::io::Error::other(e.to_string()),
    }
}

/// Read a CSV into `id → (column → value)`, dropping rows with a blank key.
/// A UTF-8 BOM on the first header is stripped before matching.
fn read_keyed_csv(
    path: &Path,
    key_column: &str,
) -> Result<HashMap<String, HashMap<String, String>>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| PipelineError::Io {
        path: path.display().to_string(),
        source: std::io::Error::other(e.to_string()),
    })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::Malformed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if !headers.iter().any(|h| h == key_column) {
        return Err(PipelineError::Malformed {
            path: path.display().to_string(),
            detail: format!("missing key column '{}'", key_column),
        });
    }

    let mut rows = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::Malformed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let fields: HashMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(String::from))
            .collect();
        let Some(key) = fields.get(key_column).filter(|k| !k.is_empty()) else {
            continue;
        };
        rows.insert(key.clone(), fields);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", contents).unwrap();
        path
    }

    #[test]
    fn test_load_reads_metadata_and_wind_meter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "deployments.csv",
            "deployment_id,wind_meter_name,Observer,horizontal_dist_to_cluster_m,grove,view_id\n\
             SC3,WM1,R. Alvarez,12.5,Pismo,V2\n\
             SC4,,,,,\n",
        );

        let table = DeploymentTable::load(&path).unwrap();
        assert!(table.missing_columns.is_empty());
        let sc3 = table.get("SC3").unwrap();
        assert_eq!(sc3.wind_meter_name.as_deref(), Some("WM1"));
        assert_eq!(sc3.observer.as_deref(), Some("R. Alvarez"));
        assert_eq!(sc3.horizontal_dist_to_cluster_m, Some(12.5));
        let sc4 = table.get("SC4").unwrap();
        assert_eq!(sc4.wind_meter_name, None);
        assert_eq!(sc4.horizontal_dist_to_cluster_m, None);
    }

    #[test]
    fn test_missing_metadata_columns_warn_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "deployments.csv", "deployment_id\nSC3\n");
        let table = DeploymentTable::load(&path).unwrap();
        assert_eq!(table.missing_columns.len(), METADATA_COLUMNS.len());
        assert_eq!(table.get("SC3").unwrap().observer, None);
    }

    #[test]
    fn test_missing_id_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "deployments.csv", "camera_name\nCAM1\n");
        assert!(DeploymentTable::load(&path).is_err());
    }

    #[test]
    fn test_wind_store_paths_resolve_through_meter_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "deployments.csv",
            "deployment_id,wind_meter_name\nSC3,WM1\nSC4,WM9\nSC5,\n",
        );
        let table = DeploymentTable::load(&path).unwrap();

        let mut stores = HashMap::new();
        stores.insert("WM1".to_string(), PathBuf::from("/wind/WM1.s3db"));

        let paths = table.wind_store_paths(&stores);
        assert_eq!(paths.len(), 1, "only SC3's meter exists on disk");
        assert_eq!(paths["SC3"], PathBuf::from("/wind/WM1.s3db"));
    }

    #[test]
    fn test_combine_merges_union_with_renamed_label_columns() {
        let dir = tempfile::tempdir().unwrap();
        let qgis = write_file(
            &dir,
            "deployments_QGIS.csv",
            "deployment_id,camera_name,wind_meter_name,status\n\
             SC3,CAM3,WM1,recovered\n\
             SC4,CAM4,WM2,deployed\n",
        );
        // Label sheet saved with a UTF-8 BOM, as spreadsheet exports are.
        let label = write_file(
            &dir,
            "deployments_label.csv",
            "\u{feff}Deployment ID,Status,Observer,Notes,Youtube Link\n\
             SC3,done,R. Alvarez,windy site,https://yt/x\n\
             SC9,pending,M. Okafor,,\n",
        );
        let output = dir.path().join("deployments.csv");

        let summary = combine_sources(&qgis, &label, &output).unwrap();
        assert_eq!(summary.combined, 3);
        assert_eq!(summary.qgis_records, 2);
        assert_eq!(summary.label_records, 2);
        assert_eq!(summary.qgis_only, vec!["SC4".to_string()]);
        assert_eq!(summary.label_only, vec!["SC9".to_string()]);

        let text = std::fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("label_status"));
        assert!(header.contains("label_notes"));
        assert!(header.contains("label_youtube_url"));
        assert!(!header.contains("Youtube Link"));

        // SC3 carries fields from both sources.
        let sc3 = lines.find(|l| l.starts_with("CAM3")).unwrap();
        assert!(sc3.contains("R. Alvarez"));
        assert!(sc3.contains("windy site"));
        // SC9 exists only in the label sheet but still gets its id.
        assert!(text.lines().any(|l| l.contains("SC9")));
    }
}
