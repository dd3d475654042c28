use std::path::PathBuf;

use rayon::prelude::*;

use crate::detect;
use crate::dos::DosVariant;
use crate::inject::{self, CrcPolicy};
use crate::io::{self, OutputDir};
use crate::types::{InjectionPoint, RawImage, Verbosity};

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub crc_policy: CrcPolicy,
    pub verbosity: Verbosity,
}

/// Outcome counts for one run. `skipped` counts input files dropped before
/// fan-out; `failed` counts units that errored mid-flight. Neither fails
/// the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub produced: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// An input image that made it through the detector, ready for fan-out.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub stem: String,
    pub image: RawImage,
}

/// Read and classify every candidate file. Unreadable or unrecognized
/// files are reported and skipped; the batch continues without them.
pub fn load_images(files: &[PathBuf], verbosity: Verbosity) -> (Vec<LoadedImage>, usize) {
    let mut images = Vec::with_capacity(files.len());
    let mut skipped = 0usize;

    for path in files {
        let loaded = io::read_image_file(path).and_then(|bytes| {
            detect::classify(bytes)
                .map_err(|err| format!("Skipping \"{}\": {err}.", path.display()))
        });
        match loaded {
            Ok(image) => images.push(LoadedImage {
                stem: io::file_stem(path),
                image,
            }),
            Err(err) => {
                skipped += 1;
                if verbosity > Verbosity::Quiet {
                    eprintln!("{err}");
                }
            }
        }
    }

    (images, skipped)
}

fn fan_out<U: Sync>(
    units: &[U],
    opts: &BatchOptions,
    run_unit: impl Fn(&U) -> Result<usize, String> + Sync,
) -> RunSummary {
    let results: Vec<Result<usize, String>> = units.par_iter().map(&run_unit).collect();

    let mut summary = RunSummary::default();
    for result in results {
        match result {
            Ok(produced) => summary.produced += produced,
            Err(err) => {
                summary.failed += 1;
                if opts.verbosity > Verbosity::Quiet {
                    eprintln!("Unit Error: {err}");
                }
            }
        }
    }
    summary
}

fn inject_unit(
    image: &LoadedImage,
    payload_num: usize,
    payload: &[u8],
    out: &OutputDir,
    opts: &BatchOptions,
) -> Result<usize, String> {
    let artifacts = inject::splice_all(&image.image, payload, opts.crc_policy)
        .map_err(|err| format!("\"{}\" payload {payload_num} (resolve/splice): {err}", image.stem))?;

    let mut written = Vec::with_capacity(artifacts.len());
    for (point, bytes) in artifacts {
        let name = io::inject_artifact_name(
            &image.stem,
            payload_num,
            point,
            image.image.format.extension(),
        );
        match out.write_artifact(&name, &bytes) {
            Ok(path) => written.push(path),
            Err(err) => {
                // a failed unit must not leave partial output behind
                for path in &written {
                    let _ = std::fs::remove_file(path);
                }
                return Err(format!(
                    "\"{}\" payload {payload_num} (write): {err}",
                    image.stem
                ));
            }
        }
    }
    let produced = written.len();

    if opts.verbosity >= Verbosity::Verbose {
        println!(
            "Injected payload {payload_num} into \"{}\" at {} points.",
            image.stem,
            InjectionPoint::ALL.len()
        );
    }
    Ok(produced)
}

fn dos_unit(
    image: &LoadedImage,
    variant: DosVariant,
    out: &OutputDir,
    opts: &BatchOptions,
) -> Result<usize, String> {
    let bytes = variant
        .generate(&image.image)
        .map_err(|err| format!("\"{}\" {} (generate): {err}", image.stem, variant.tag()))?;

    let name = io::dos_artifact_name(&image.stem, variant);
    out.write_artifact(&name, &bytes)
        .map_err(|err| format!("\"{}\" {} (write): {err}", image.stem, variant.tag()))?;

    if opts.verbosity >= Verbosity::Verbose {
        println!("Created {} variant for \"{}\".", variant.tag(), image.stem);
    }
    Ok(1)
}

/// Fan out image x payload units; each writes three artifacts.
pub fn run_inject(
    images: &[LoadedImage],
    payloads: &[Vec<u8>],
    out: &OutputDir,
    opts: &BatchOptions,
) -> RunSummary {
    let units: Vec<(&LoadedImage, usize, &[u8])> = images
        .iter()
        .flat_map(|image| {
            payloads
                .iter()
                .enumerate()
                .map(move |(index, payload)| (image, index + 1, payload.as_slice()))
        })
        .collect();

    fan_out(&units, opts, |&(image, payload_num, payload)| {
        inject_unit(image, payload_num, payload, out, opts)
    })
}

/// Fan out image x DoS-variant units; each writes one artifact.
pub fn run_dos(images: &[LoadedImage], out: &OutputDir, opts: &BatchOptions) -> RunSummary {
    let units: Vec<(&LoadedImage, DosVariant)> = images
        .iter()
        .flat_map(|image| DosVariant::ALL.iter().map(move |&variant| (image, variant)))
        .collect();

    fan_out(&units, opts, |&(image, variant)| {
        dos_unit(image, variant, out, opts)
    })
}
