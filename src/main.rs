use clap::{Arg, Command};
use log::LevelFilter;
use pneumoscan::engine::{AnalysisEngine, Session};
use pneumoscan::history::render_history;
use pneumoscan::inference::InferenceClient;
use pneumoscan::intake::UploadCandidate;
use pneumoscan::record::Principal;
use pneumoscan::report;
use pneumoscan::store::SqliteRecordStore;
use pneumoscan::Config;
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("pneumoscan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Chest X-ray pneumonia analysis: upload intake, remote inference, history, reports")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/pneumoscan.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("submit")
                .long("submit")
                .value_name("FILE")
                .help("Submit an X-ray image for analysis")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("content-type")
                .long("content-type")
                .value_name("MIME")
                .help("Override the media type inferred from the file extension")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("principal")
                .short('u')
                .long("principal")
                .value_name("NAME")
                .help("Principal the analyses belong to")
                .default_value("local"),
        )
        .arg(
            Arg::new("history")
                .long("history")
                .help("Show the analysis history for the principal")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .value_name("ID")
                .help("Write the report for one analysis record")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Directory reports are written to")
                .default_value("."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = matches.get_one::<String>("config").unwrap();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        match Config::default().to_file(generate_path) {
            Ok(()) => {
                println!("Default configuration written to {generate_path}");
                return;
            }
            Err(e) => {
                log::error!("Failed to write configuration: {e}");
                process::exit(1);
            }
        }
    }

    if matches.get_flag("test-config") {
        match Config::from_file(config_path) {
            Ok(config) => {
                println!("Configuration {config_path} is valid");
                println!("  inference endpoint: {}", config.inference.endpoint_url);
                println!("  record store: {}", config.store.db_path);
                return;
            }
            Err(e) => {
                log::error!("Configuration {config_path} is invalid: {e}");
                process::exit(1);
            }
        }
    }

    let config = if Path::new(config_path).exists() {
        match Config::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load configuration from {config_path}: {e}");
                process::exit(1);
            }
        }
    } else {
        log::debug!("no configuration at {config_path}, using defaults");
        Config::default()
    };

    let store = match SqliteRecordStore::open(&config.store.db_path) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to open record store {}: {e}", config.store.db_path);
            process::exit(1);
        }
    };

    let client = match InferenceClient::new(
        &config.inference.endpoint_url,
        config.inference.timeout_seconds,
    ) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to build inference client: {e}");
            process::exit(1);
        }
    };

    let engine = AnalysisEngine::new(client, store);
    let principal = Principal::new(matches.get_one::<String>("principal").unwrap().clone());
    let mut session = Session::new(principal);

    if let Some(file) = matches.get_one::<String>("submit") {
        let content_type = matches.get_one::<String>("content-type").cloned();
        let candidate = match UploadCandidate::from_path(file, content_type) {
            Ok(candidate) => candidate,
            Err(e) => {
                log::error!("Cannot read {file}: {e}");
                process::exit(1);
            }
        };

        match engine.submit(&mut session, candidate).await {
            Ok(record) => {
                println!("Analysis {} complete", record.id);
                if let (Some(label), Some(score)) =
                    (&record.predicted_label, record.confidence_score)
                {
                    println!("  Result: {label} ({:.2}%)", score * 100.0);
                }
            }
            Err(e) => {
                log::error!("{} step failed: {e}", e.step());
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("history") {
        match engine.history(&session) {
            Ok(records) => print!("{}", render_history(&records)),
            Err(e) => {
                log::error!("{} step failed: {e}", e.step());
                process::exit(1);
            }
        }
        return;
    }

    if let Some(id_arg) = matches.get_one::<String>("report") {
        let id: i64 = match id_arg.parse() {
            Ok(id) => id,
            Err(_) => {
                log::error!("Invalid record id: {id_arg}");
                process::exit(1);
            }
        };

        let record = match engine.record(&session, id) {
            Ok(record) => record,
            Err(e) => {
                log::error!("{} step failed: {e}", e.step());
                process::exit(1);
            }
        };

        let document = report::render(&record);
        let output_dir = matches.get_one::<String>("output").unwrap();
        let path = Path::new(output_dir).join(&document.filename);
        if let Err(e) = std::fs::write(&path, &document.contents) {
            log::error!("Failed to write report {}: {e}", path.display());
            process::exit(1);
        }
        println!("Report written to {}", path.display());
        return;
    }

    eprintln!("Nothing to do: pass --submit, --history, or --report (see --help)");
    process::exit(1);
}
