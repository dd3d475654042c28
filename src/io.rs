use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::dos::DosVariant;
use crate::types::{EXTENSION_LIST, InjectionPoint};

pub type IoResult<T> = Result<T, String>;

pub fn has_file_extension(path: &Path, exts: &[&str]) -> bool {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    exts.iter().any(|candidate| {
        let candidate = candidate.trim_start_matches('.').to_ascii_lowercase();
        ext == candidate
    })
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Expand the input argument into the list of candidate image files: the
/// file itself, or a non-recursive directory scan filtered by supported
/// extensions. Entries rejected by the extension filter come back in the
/// second list so the caller can report them as skips. Both lists are
/// sorted for deterministic processing order.
pub fn collect_input_files(input: &Path) -> IoResult<(Vec<PathBuf>, Vec<PathBuf>)> {
    let metadata = fs::metadata(input).map_err(|_| {
        format!(
            "Input Error: Path \"{}\" not found or not readable.",
            input.display()
        )
    })?;

    if metadata.is_file() {
        return Ok((vec![input.to_path_buf()], Vec::new()));
    }

    if metadata.is_dir() {
        let entries = fs::read_dir(input).map_err(|err| {
            format!(
                "Input Error: Failed reading folder \"{}\": {err}",
                input.display()
            )
        })?;

        let mut files = Vec::new();
        let mut rejected = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| format!("Input Error: Failed reading folder entry: {err}"))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if has_file_extension(&path, EXTENSION_LIST) {
                files.push(path);
            } else {
                rejected.push(path);
            }
        }
        files.sort();
        rejected.sort();

        if files.is_empty() {
            return Err(format!(
                "Input Error: No supported image files (png/jpg/jpeg/gif) found in \"{}\".",
                input.display()
            ));
        }
        return Ok((files, rejected));
    }

    Err(format!(
        "Input Error: Path \"{}\" is neither a file nor a folder.",
        input.display()
    ))
}

pub fn read_image_file(path: &Path) -> IoResult<Vec<u8>> {
    let metadata = fs::metadata(path).map_err(|_| {
        format!(
            "Image File Error: \"{}\" not found or not a regular file.",
            path.display()
        )
    })?;
    if !metadata.is_file() {
        return Err(format!(
            "Image File Error: \"{}\" not found or not a regular file.",
            path.display()
        ));
    }
    if metadata.len() == 0 {
        return Err(format!(
            "Image File Error: \"{}\" is empty.",
            path.display()
        ));
    }

    fs::read(path).map_err(|err| format!("Image File Error: Failed to read full file: {err}"))
}

/// One payload per trimmed, non-blank line; bytes are otherwise opaque.
pub fn read_payloads(path: &Path) -> IoResult<Vec<Vec<u8>>> {
    let raw = fs::read(path).map_err(|_| {
        format!(
            "Payload File Error: \"{}\" not found or not readable.",
            path.display()
        )
    })?;

    let payloads: Vec<Vec<u8>> = raw
        .split(|&b| b == b'\n')
        .map(|line| line.trim_ascii().to_vec())
        .filter(|line| !line.is_empty())
        .collect();

    if payloads.is_empty() {
        return Err(format!(
            "Payload File Error: No payloads found in \"{}\".",
            path.display()
        ));
    }
    Ok(payloads)
}

/// Handle to the prepared output directory. Constructed exactly once per
/// run, before any worker starts; workers only append uniquely-named files
/// through it.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Destructively clear and recreate the directory.
    pub fn prepare(path: &Path) -> IoResult<OutputDir> {
        if path.exists() {
            fs::remove_dir_all(path).map_err(|err| {
                format!(
                    "Output Error: Failed to clear output folder \"{}\": {err}",
                    path.display()
                )
            })?;
        }
        fs::create_dir_all(path).map_err(|err| {
            format!(
                "Output Error: Failed to create output folder \"{}\": {err}",
                path.display()
            )
        })?;

        Ok(OutputDir {
            root: path.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create-once, write-once: artifact names are unique per unit, so an
    /// existing file is a naming bug, not something to overwrite.
    pub fn write_artifact(&self, name: &str, bytes: &[u8]) -> IoResult<PathBuf> {
        let path = self.root.join(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                format!(
                    "Write File Error: Failed to create \"{}\": {err}",
                    path.display()
                )
            })?;
        file.write_all(bytes)
            .map_err(|err| format!("Write File Error: Failed while writing output file: {err}"))?;
        file.flush()
            .map_err(|err| format!("Write File Error: Failed while finalizing output file: {err}"))?;

        Ok(path)
    }
}

/// `{stem}_p{n}_{header|body|trailer}.{ext}` — deterministic per unit.
pub fn inject_artifact_name(
    stem: &str,
    payload_num: usize,
    point: InjectionPoint,
    extension: &str,
) -> String {
    format!("{stem}_p{payload_num}_{}.{extension}", point.tag())
}

/// `{stem}_dos_{tag}.{ext}` — the extension follows the variant's own
/// output format, not the template's.
pub fn dos_artifact_name(stem: &str, variant: DosVariant) -> String {
    format!(
        "{stem}_dos_{}.{}",
        variant.tag(),
        variant.output_format().extension()
    )
}
