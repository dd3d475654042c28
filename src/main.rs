use std::path::PathBuf;
use std::time::Instant;

use imgsplice::batch::{self, BatchOptions, RunSummary};
use imgsplice::inject::CrcPolicy;
use imgsplice::io::{self, OutputDir};
use imgsplice::types::Verbosity;

const DEFAULT_OUTPUT_DIR: &str = "loaded";

#[derive(Debug, Clone, PartialEq, Eq)]
struct RunArgs {
    input_path: PathBuf,
    payload_path: Option<PathBuf>,
    output_path: PathBuf,
    dos_mode: bool,
    threads: Option<usize>,
    stale_crc: bool,
    verbosity: Verbosity,
}

fn usage(program_name: &str) -> String {
    format!(
        "\nUsage: {program_name} -i <image|folder> -p <payloads.txt> [options]\n       \
         {program_name} -i <image|folder> --dosimage [options]\n\n\
         Options:\n  \
         -i <path>        image file or folder of images (required)\n  \
         -p <path>        newline-delimited payload file (required without --dosimage)\n  \
         -o <path>        output folder, cleared on every run (default: {DEFAULT_OUTPUT_DIR})\n  \
         --dosimage       create the DoS image catalog instead of injecting payloads\n  \
         --threads <n>    worker threads (default: all cores)\n  \
         --stale-crc      leave CRCs of patched PNG chunks stale\n  \
         -q               quiet; -v verbose\n"
    )
}

fn flag_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str, String> {
    *index += 1;
    args.get(*index)
        .map(String::as_str)
        .ok_or_else(|| format!("Arguments Error: Missing value for {flag}."))
}

fn parse_cli(args: &[String], program_name: &str) -> Result<RunArgs, String> {
    if args.len() < 2 {
        return Err(usage(program_name));
    }

    let mut input_path = None;
    let mut payload_path = None;
    let mut output_path = PathBuf::from(DEFAULT_OUTPUT_DIR);
    let mut dos_mode = false;
    let mut threads = None;
    let mut stale_crc = false;
    let mut verbosity = Verbosity::Normal;

    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "-i" => input_path = Some(PathBuf::from(flag_value(args, &mut index, "-i")?)),
            "-p" => payload_path = Some(PathBuf::from(flag_value(args, &mut index, "-p")?)),
            "-o" => output_path = PathBuf::from(flag_value(args, &mut index, "-o")?),
            "--dosimage" => dos_mode = true,
            "--threads" => {
                let value = flag_value(args, &mut index, "--threads")?;
                let count: usize = value.parse().map_err(|_| {
                    format!("Arguments Error: Invalid thread count \"{value}\".")
                })?;
                if count == 0 {
                    return Err("Arguments Error: Thread count must be at least 1.".to_string());
                }
                threads = Some(count);
            }
            "--stale-crc" => stale_crc = true,
            "-q" => verbosity = Verbosity::Quiet,
            "-v" => verbosity = Verbosity::Verbose,
            _ => return Err(usage(program_name)),
        }
        index += 1;
    }

    let Some(input_path) = input_path else {
        return Err(usage(program_name));
    };
    if !dos_mode && payload_path.is_none() {
        return Err(
            "Arguments Error: Payload file (-p) is required when not using --dosimage.".to_string(),
        );
    }

    Ok(RunArgs {
        input_path,
        payload_path,
        output_path,
        dos_mode,
        threads,
        stale_crc,
        verbosity,
    })
}

fn print_summary(summary: &RunSummary, elapsed_secs: f64) {
    let line_heavy = "=".repeat(50);
    let line_light = "-".repeat(50);
    println!("\n{line_heavy}");
    println!("Execution Summary:");
    println!("{line_light}");
    println!("Artifacts produced        : {}", summary.produced);
    println!("Input files skipped       : {}", summary.skipped);
    println!("Failed units              : {}", summary.failed);
    println!("Processing time           : {elapsed_secs:.2} seconds");
    println!("{line_heavy}");
}

fn run(args: &RunArgs) -> Result<(), String> {
    let started = Instant::now();

    let (files, filtered) = io::collect_input_files(&args.input_path)?;
    if args.verbosity > Verbosity::Quiet {
        for path in &filtered {
            eprintln!(
                "Skipping \"{}\": unsupported file extension.",
                path.display()
            );
        }
    }

    let payloads = match (&args.payload_path, args.dos_mode) {
        (Some(path), false) => Some(io::read_payloads(path)?),
        _ => None,
    };

    let out = OutputDir::prepare(&args.output_path)?;

    let opts = BatchOptions {
        crc_policy: if args.stale_crc {
            CrcPolicy::Stale
        } else {
            CrcPolicy::Recompute
        },
        verbosity: args.verbosity,
    };

    let (images, skipped) = batch::load_images(&files, args.verbosity);
    if images.is_empty() {
        return Err("Input Error: No readable, supported images found.".to_string());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.unwrap_or(0))
        .build()
        .map_err(|err| format!("Setup Error: Failed to build worker pool: {err}"))?;

    let mut summary = pool.install(|| match &payloads {
        Some(payloads) => batch::run_inject(&images, payloads, &out, &opts),
        None => batch::run_dos(&images, &out, &opts),
    });
    summary.skipped += skipped + filtered.len();

    if args.verbosity > Verbosity::Quiet {
        print_summary(&summary, started.elapsed().as_secs_f64());
        println!(
            "\nArtifacts written to \"{}\".\n",
            out.root().display()
        );
    }

    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program_name = args
        .first()
        .map_or_else(|| "imgsplice".to_string(), Clone::clone);

    let run_args = match parse_cli(&args, &program_name) {
        Ok(run_args) => run_args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&run_args) {
        eprintln!("\n{err}\n");
        std::process::exit(1);
    }
}
