//! Merge the QGIS and observer-label deployment exports into the single
//! deployments CSV the pipeline consumes.

use std::path::PathBuf;
use std::process::ExitCode;

use monarch_dataprep::deployments::combine_sources;

const USAGE: &str = "\
Usage: combine_deployments [--qgis <FILE>] [--labels <FILE>] [--output <FILE>]

Defaults:
  --qgis    data/deployments/deployments_QGIS.csv
  --labels  data/deployments/deployments_label.csv
  --output  data/deployments.csv
";

fn main() -> ExitCode {
    let mut qgis = PathBuf::from("data/deployments/deployments_QGIS.csv");
    let mut labels = PathBuf::from("data/deployments/deployments_label.csv");
    let mut output = PathBuf::from("data/deployments.csv");

    let mut argv = std::env::args().skip(1);
    while let Some(flag) = argv.next() {
        let mut value = |name: &str| {
            argv.next()
                .ok_or_else(|| format!("{} needs a value", name))
        };
        match flag.as_str() {
            "--qgis" => match value("--qgis") {
                Ok(v) => qgis = PathBuf::from(v),
                Err(e) => return fail(&e),
            },
            "--labels" => match value("--labels") {
                Ok(v) => labels = PathBuf::from(v),
                Err(e) => return fail(&e),
            },
            "--output" => match value("--output") {
                Ok(v) => output = PathBuf::from(v),
                Err(e) => return fail(&e),
            },
            "--help" | "-h" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            other => return fail(&format!("Unknown option '{}'\n\n{}", other, USAGE)),
        }
    }

    match combine_sources(&qgis, &labels, &output) {
        Ok(summary) => {
            println!("Combined {} deployment records", summary.combined);
            println!("QGIS records: {}", summary.qgis_records);
            println!("Label records: {}", summary.label_records);
            println!("Output written to: {}", output.display());
            if !summary.qgis_only.is_empty() {
                println!("Records only in QGIS file: {:?}", summary.qgis_only);
            }
            if !summary.label_only.is_empty() {
                println!("Records only in label file: {:?}", summary.label_only);
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn fail(message: &str) -> ExitCode {
    eprintln!("❌ {}", message);
    ExitCode::FAILURE
}
