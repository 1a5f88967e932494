//! rupe - dump the headers, sections and imports of Windows PE files

use std::path::Path;
use std::process;

use clap::{Arg, ArgAction, Command};
use log::{debug, error, info};
use rupe_decoder::{ImportAddressing, PeError, PeFile};

mod config;
mod errors;
mod fs;
mod logger;
mod render;

use config::Config;
use errors::AppResult;

fn cli() -> Command {
    Command::new("rupe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Dump the headers, sections and imports of Windows PE files")
        .arg(
            Arg::new("file")
                .help("PE image to decode (.exe, .dll, .sys, ...)")
                .value_name("FILE")
                .required_unless_present("init-config")
                .index(1),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Config file (default: <config dir>/rupe/config.toml)")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("lenient")
                .long("lenient")
                .help("Do not fail on a missing MZ signature")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("direct-imports")
                .long("direct-imports")
                .help("Treat the import directory address as a raw file offset")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-imports")
                .long("no-imports")
                .help("Skip the import table")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("init-config")
                .long("init-config")
                .help("Write a commented default config file and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count),
        )
}

/// Decode `data` and render it. On failure the returned text holds every
/// structure decoded before the error.
fn dump(data: &[u8], config: &Config) -> (String, Option<PeError>) {
    match PeFile::parse_or_partial(data, config.decode.clone()) {
        Ok(pe) => (render::render(&pe, &config.display), None),
        Err(chain) => (
            render::render_partial(&chain, data, &config.display),
            chain.error,
        ),
    }
}

fn run(path: &Path, config: &Config) -> AppResult<()> {
    let bytes = fs::load_image(path)?;
    info!(
        "Decoding '{}' ({})",
        path.display(),
        render::human_size(bytes.len() as u64)
    );
    debug!(
        "Image is {}",
        if bytes.is_mapped() { "memory-mapped" } else { "read into memory" }
    );

    let (text, err) = dump(&bytes, config);
    print!("{}", text);
    match err {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn main() {
    let matches = cli().get_matches();

    if let Err(e) = logger::init(matches.get_count("verbose")) {
        eprintln!("Warning: Could not initialize logger: {}", e);
    }

    if matches.get_flag("init-config") {
        match Config::init_default() {
            Ok(path) => {
                println!("Wrote {}", path.display());
                return;
            }
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        }
    }

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => match Config::load_from(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        },
        None => Config::load(),
    };

    if matches.get_flag("lenient") {
        config.decode.strict_signature = false;
    }
    if matches.get_flag("direct-imports") {
        config.decode.import_addressing = ImportAddressing::Direct;
    }
    if matches.get_flag("no-imports") {
        config.display.show_imports = false;
    }
    debug!("Effective config: {:?}", config);

    let Some(file) = matches.get_one::<String>("file") else {
        error!("No input file given");
        process::exit(1);
    };

    if let Err(e) = run(Path::new(file), &config) {
        eprintln!("Error: {}: {}", file, e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rupe_decoder::DecodeOptions;

    #[test]
    fn test_cli_flags() {
        let m = cli()
            .try_get_matches_from(["rupe", "-vv", "--lenient", "--no-imports", "a.exe"])
            .unwrap();
        assert_eq!(m.get_count("verbose"), 2);
        assert!(m.get_flag("lenient"));
        assert!(m.get_flag("no-imports"));
        assert!(!m.get_flag("direct-imports"));
        assert_eq!(m.get_one::<String>("file").unwrap(), "a.exe");
    }

    #[test]
    fn test_cli_requires_file() {
        assert!(cli().try_get_matches_from(["rupe"]).is_err());
        assert!(cli().try_get_matches_from(["rupe", "--init-config"]).is_ok());
    }

    #[test]
    fn test_dump_reports_bad_signature() {
        let data = vec![0u8; 256];
        let (text, err) = dump(&data, &Config::default());
        assert!(matches!(err, Some(PeError::InvalidSignature { .. })));
        // The DOS header itself decoded before the signature check
        assert!(text.contains("DOS HEADER"));
        assert!(!text.contains("COFF"));
    }

    #[test]
    fn test_dump_lenient_shows_dos_header() {
        // No MZ, PE offset pointing past the end of the file
        let mut data = vec![0u8; 128];
        data[60..64].copy_from_slice(&0x1000u32.to_le_bytes());
        let config = Config {
            decode: DecodeOptions::lenient(),
            ..Config::default()
        };
        let (text, err) = dump(&data, &config);
        assert!(matches!(err, Some(PeError::MalformedOffset { .. })));
        assert!(text.contains("DOS HEADER"));
        assert!(text.contains("0x00001000"));
    }
}
