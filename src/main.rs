use clap::Parser;
use psarc2gpx::{convert_with_progress, ConvertError, Platform};
use std::path::PathBuf;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{}", err);
            1
        }
    });
}

fn main_result() -> Result<(), ConvertError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("psarc2gpx=info"))
        .init();

    let args = CliArgs::parse();
    let input = PathBuf::from(&args.input);
    let output = args.output.as_ref().map(PathBuf::from);
    let platform = match args.platform.as_deref() {
        None => None,
        Some("pc") => Some(Platform::Pc),
        Some("mac") => Some(Platform::Mac),
        Some(other) => {
            return Err(ConvertError::ParsingError(format!(
                "unknown platform {other:?}, expected pc or mac"
            )))
        }
    };

    let mut report = |percent: u8, stage: &str| log::info!("[{percent:>3}%] {stage}");
    let result = convert_with_progress(&input, output.as_deref(), platform, &mut report)?;

    for warning in &result.warnings {
        log::warn!("{warning}");
    }
    log::info!(
        "converted {} track(s) into {}",
        result.track_count,
        result.output_path.display()
    );
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// Path to the Rocksmith 2014 .psarc archive
    input: String,
    /// Output .gpx path. Defaults to the input path with a .gpx extension.
    #[arg(long)]
    output: Option<String>,
    /// Force the SNG decryption key (pc or mac) instead of auto-detecting.
    #[arg(long)]
    platform: Option<String>,
}
