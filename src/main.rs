//! Command-line entry point for the lag-dataset preparation pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use monarch_dataprep::config::Config;
use monarch_dataprep::logging::{self, LogLevel, Stage};
use monarch_dataprep::{RunOptions, run};

const USAGE: &str = "\
Usage: monarch_dataprep [OPTIONS]

Inputs:
  --json-dir <DIR>           Classification JSON directory (default: data/json)
  --temp-file <FILE>         Temperature CSV (default: data/temperature.csv)
  --wind-db-dir <DIR>        Wind .s3db store directory (default: data/wind)
  --deployments-file <FILE>  Deployment metadata CSV (default: data/deployments.csv)
  --config <FILE>            Pipeline TOML config (default: built-in values)

Outputs:
  --output-daily <FILE>      Daily aggregate CSV (default: output/daily.csv)
  --output-24hr <FILE>       24-hour window lag CSV (default: output/lag_24hr.csv)
  --output-sunset <FILE>     Sunset window lag CSV (default: output/lag_sunset.csv)

Filters:
  --min-photos <N>           Override minimum daytime photos per valid day
  --max-photos <N>           Override maximum daytime photos per valid day

Diagnostics:
  --log-file <FILE>          Mirror log output to a file
  --verbose                  Show per-observation debug output
  --help                     Show this help
";

struct Args {
    json_dir: PathBuf,
    temp_file: PathBuf,
    wind_db_dir: PathBuf,
    deployments_file: PathBuf,
    config_file: Option<PathBuf>,
    output_daily: PathBuf,
    output_24hr: PathBuf,
    output_sunset: PathBuf,
    min_photos: Option<usize>,
    max_photos: Option<usize>,
    log_file: Option<String>,
    verbose: bool,
}

impl Args {
    fn parse() -> Result<Args, String> {
        let mut args = Args {
            json_dir: PathBuf::from("data/json"),
            temp_file: PathBuf::from("data/temperature.csv"),
            wind_db_dir: PathBuf::from("data/wind"),
            deployments_file: PathBuf::from("data/deployments.csv"),
            config_file: None,
            output_daily: PathBuf::from("output/daily.csv"),
            output_24hr: PathBuf::from("output/lag_24hr.csv"),
            output_sunset: PathBuf::from("output/lag_sunset.csv"),
            min_photos: None,
            max_photos: None,
            log_file: None,
            verbose: false,
        };

        let mut argv = std::env::args().skip(1);
        while let Some(flag) = argv.next() {
            let mut value = |name: &str| {
                argv.next().ok_or_else(|| format!("{} needs a value", name))
            };
            match flag.as_str() {
                "--json-dir" => args.json_dir = PathBuf::from(value("--json-dir")?),
                "--temp-file" => args.temp_file = PathBuf::from(value("--temp-file")?),
                "--wind-db-dir" => args.wind_db_dir = PathBuf::from(value("--wind-db-dir")?),
                "--deployments-file" => {
                    args.deployments_file = PathBuf::from(value("--deployments-file")?)
                }
                "--config" => args.config_file = Some(PathBuf::from(value("--config")?)),
                "--output-daily" => args.output_daily = PathBuf::from(value("--output-daily")?),
                "--output-24hr" => args.output_24hr = PathBuf::from(value("--output-24hr")?),
                "--output-sunset" => {
                    args.output_sunset = PathBuf::from(value("--output-sunset")?)
                }
                "--min-photos" => {
                    args.min_photos = Some(
                        value("--min-photos")?
                            .parse()
                            .map_err(|_| "--min-photos needs an integer".to_string())?,
                    )
                }
                "--max-photos" => {
                    args.max_photos = Some(
                        value("--max-photos")?
                            .parse()
                            .map_err(|_| "--max-photos needs an integer".to_string())?,
                    )
                }
                "--log-file" => args.log_file = Some(value("--log-file")?),
                "--verbose" => args.verbose = true,
                other => return Err(format!("Unknown option '{}'\n\n{}", other, USAGE)),
            }
        }
        Ok(args)
    }
}

fn main() -> ExitCode {
    if std::env::args().skip(1).any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let args = match Args::parse() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let min_level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    logging::init_logger(min_level, args.log_file.as_deref());

    let mut config = match &args.config_file {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                logging::error(Stage::System, None, &e.to_string());
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    if let Some(min) = args.min_photos {
        config.min_photos_per_day = min;
    }
    if let Some(max) = args.max_photos {
        config.max_photos_per_day = max;
    }

    let options = RunOptions {
        json_dir: args.json_dir,
        temp_file: args.temp_file,
        wind_db_dir: Some(args.wind_db_dir),
        deployments_file: Some(args.deployments_file),
        output_daily: Some(args.output_daily),
        output_24hr: Some(args.output_24hr),
        output_sunset: Some(args.output_sunset),
        config,
    };

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}
