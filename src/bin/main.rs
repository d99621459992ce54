use anyhow::{bail, Context, Result};
use clap::Parser;
use dicom_preflight::report::{describe_element, render_elements, render_sequences, render_text};
use dicom_preflight::{Checked, DisplayLimits, Error as PreflightError, Preflight};
use env_logger::Builder;
use log::{warn, Level, LevelFilter};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Check DICOM files for structural issues that trip up anonymization
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file ('-' for stdin) or directory
    #[arg(short, long, value_name = "INPUT_PATH")]
    input: PathBuf,

    /// Recursively look for files in input directory
    #[arg(short, long)]
    recursive: bool,

    /// Continue when file found is not DICOM
    #[arg(short, long = "continue")]
    r#continue: bool,

    /// Print the reports as JSON, one object per line
    #[arg(long)]
    json: bool,

    /// JSON file with the validation and extraction settings
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Write a minimal test file next to the input, or into DIR
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    minimal: Option<Option<PathBuf>>,

    /// Also list the elements, the sequences and the required tags in detail
    #[arg(long)]
    inspect: bool,

    /// Show more verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    file: String,
    #[serde(flatten)]
    report: &'a dicom_preflight::Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    minimal: Option<String>,
}

struct Options {
    json: bool,
    inspect: bool,
    minimal: Option<Option<PathBuf>>,
    limits: DisplayLimits,
}

fn minimal_output_path(input_path: &Path, dir: Option<&Path>) -> Result<PathBuf> {
    let Some(file_name) = input_path.file_name() else {
        bail!(
            "cannot derive a minimal file name from {}",
            input_path.display()
        );
    };
    let file_name = format!("minimal_test_{}", file_name.to_string_lossy());
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    Ok(dir.join(file_name))
}

fn render(
    preflight: &Preflight,
    checked: &Checked,
    input_path: &Path,
    minimal_path: Option<&Path>,
    options: &Options,
) -> Result<String> {
    let input = input_path.display();
    if options.json {
        let output = JsonOutput {
            file: input.to_string(),
            report: &checked.report,
            minimal: minimal_path.map(|p| p.display().to_string()),
        };
        return Ok(serde_json::to_string(&output)?);
    }

    let mut sections = vec![
        format!("Testing anonymization compatibility for: {input}"),
        render_text(&checked.report, &options.limits),
    ];

    if options.inspect {
        sections.push(render_elements(&checked.dataset, &options.limits));
        sections.push(render_sequences(&checked.dataset));
        let details: Vec<String> = preflight
            .validator()
            .config()
            .required_tags()
            .iter()
            .map(|&tag| describe_element(&checked.dataset, tag))
            .collect();
        sections.push(details.join("\n\n"));
    }

    if let Some(minimal_path) = minimal_path {
        let minimal = minimal_path.display();
        sections.push(format!("Created minimal test file: {minimal}"));
    }

    Ok(sections.join("\n\n"))
}

fn check(preflight: &Preflight, input_path: &Path, options: &Options) -> Result<()> {
    let input = input_path.display();
    let checked = if input_path == Path::new("-") {
        preflight.check(io::stdin().lock())
    } else {
        let input_src = File::open(input_path)
            .with_context(|| format!("failed to open {input}"))?;
        preflight.check(input_src)
    }
    .with_context(|| format!("failed to check {input}"))?;

    let minimal_path = match &options.minimal {
        None => None,
        Some(dir) => {
            if input_path == Path::new("-") && dir.is_none() {
                bail!("--minimal needs a directory when reading from stdin");
            }
            let minimal_path = minimal_output_path(input_path, dir.as_deref())?;
            preflight
                .write_minimal(&checked.dataset, &minimal_path)
                .with_context(|| format!("failed to write minimal test file for {input}"))?;
            Some(minimal_path)
        }
    };

    let minimal = minimal_path.as_deref();
    let output = render(preflight, &checked, input_path, minimal, options)?;
    writeln!(io::stdout().lock(), "{output}")?;

    Ok(())
}

fn load_preflight(path: Option<&Path>) -> Result<Preflight> {
    let Some(path) = path else {
        return Ok(Preflight::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Preflight::from_json(&json)
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let input_path = args.input;
    let recurse = args.recursive;
    let continue_on_read_error = args.r#continue;
    let verbose = args.verbose;

    let log_level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Error
    };

    let mut builder = Builder::from_default_env();
    builder
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "Error",
                Level::Warn => "Warning",
                Level::Info => "Info",
                Level::Debug => "Debug",
                Level::Trace => "Trace",
            };
            writeln!(buf, "{}: {}", level, record.args())
        })
        .filter(None, log_level);
    builder.init();

    let preflight = load_preflight(args.config.as_deref())?;
    let options = Options {
        json: args.json,
        inspect: args.inspect,
        minimal: args.minimal,
        limits: DisplayLimits::default(),
    };

    if let Some(Some(dir)) = &options.minimal {
        if !dir.is_dir() {
            bail!("minimal output path should be an existing directory");
        }
    }

    // Input is stdin or a file
    if input_path == Path::new("-") || input_path.is_file() {
        check(&preflight, &input_path, &options)?;
        return Ok(());
    }

    // Input is a directory
    if input_path.is_dir() {
        let mut walk_dir = WalkDir::new(&input_path);
        if !recurse {
            walk_dir = walk_dir.max_depth(1);
        }

        walk_dir
            .into_iter()
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path_buf = entry.into_path();
                let is_minimal = path_buf
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("minimal_test_"));
                if path_buf.is_file() && !is_minimal {
                    Some(path_buf)
                } else {
                    None
                }
            })
            .par_bridge() // convert to a parallel iterator
            .try_for_each(|path_buf| match check(&preflight, &path_buf, &options) {
                Err(e) if continue_on_read_error => {
                    let is_read_error = e
                        .downcast_ref::<PreflightError>()
                        .is_some_and(PreflightError::is_read_error);
                    if is_read_error {
                        warn!("{:#}", e);
                        return Ok(());
                    }
                    Err(e)
                }
                other => other,
            })?;

        return Ok(());
    }

    bail!("Input should either be a file, stdin ('-') or a directory");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_output_path_next_to_input() {
        let path = minimal_output_path(Path::new("/data/ct/image.dcm"), None).unwrap();
        assert_eq!(path, PathBuf::from("/data/ct/minimal_test_image.dcm"));
    }

    #[test]
    fn test_minimal_output_path_in_dir() {
        let out = Some(Path::new("/tmp/out"));
        let path = minimal_output_path(Path::new("/data/ct/image.dcm"), out).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/out/minimal_test_image.dcm"));
    }

    #[test]
    fn test_load_preflight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preflight.json");

        std::fs::write(&path, r#"{"private_tag_threshold": 0}"#).unwrap();
        let preflight = load_preflight(Some(&path)).unwrap();
        assert_eq!(preflight.validator().config().private_tag_threshold(), 0);

        std::fs::write(&path, r#"{"disallowed_vrs": ["XX"]}"#).unwrap();
        let err = load_preflight(Some(&path)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreflightError>(),
            Some(PreflightError::Config(_))
        ));
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from(["dcmcheck", "-i", "in.dcm", "--minimal", "--json"]);
        assert_eq!(args.minimal, Some(None));
        assert!(args.json);

        let args = Args::parse_from(["dcmcheck", "-i", "in", "--minimal", "out", "-r", "-c"]);
        assert_eq!(args.minimal, Some(Some(PathBuf::from("out"))));
        assert!(args.recursive && args.r#continue);

        let args = Args::parse_from(["dcmcheck", "-i", "in.dcm"]);
        assert_eq!(args.minimal, None);
    }
}
