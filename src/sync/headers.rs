// Inventory of the column headers used across a set of survey exports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::sync::{io_common::simplify_file_name, *};

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct HeaderInfo {
    #[serde(rename = "Header")]
    pub header: String,
    #[serde(rename = "Files")]
    pub files: Vec<String>,
    #[serde(rename = "FileCount")]
    pub file_count: usize,
}

/// Headers and the files they appear in. The headers are compared without case,
/// and the first spelling seen is kept.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct HeaderInventory {
    entries: HashMap<String, (String, Vec<String>)>,
}

impl HeaderInventory {
    pub fn new() -> HeaderInventory {
        HeaderInventory::default()
    }

    pub fn add(&mut self, header: &str, file_name: &str) {
        let header = header.trim();
        if header.is_empty() {
            return;
        }
        let (_, files) = self
            .entries
            .entry(header.to_lowercase())
            .or_insert_with(|| (header.to_string(), Vec::new()));
        if !files.iter().any(|f| f.eq_ignore_ascii_case(file_name)) {
            files.push(file_name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The headers, sorted without case, each with its sorted list of files.
    pub fn into_infos(self) -> Vec<HeaderInfo> {
        let mut entries: Vec<(String, (String, Vec<String>))> = self.entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
            .into_iter()
            .map(|(_, (header, mut files))| {
                files.sort_by_key(|f| f.to_lowercase());
                HeaderInfo {
                    header,
                    file_count: files.len(),
                    files,
                }
            })
            .collect()
    }
}

fn is_xlsx(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case("xlsx"))
            .unwrap_or(false)
}

/// Collects the headers of all the spreadsheets directly in the directory.
///
/// The files that cannot be read are skipped.
pub fn collect_headers(dir: &str) -> SyncResult<Vec<HeaderInfo>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .context(OpeningFileSnafu { path: dir })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_xlsx(p))
        .collect();
    paths.sort();

    if paths.is_empty() {
        warn!("No .xlsx files found in {}", dir);
        return Ok(Vec::new());
    }
    info!("Found {} spreadsheets to process", paths.len());

    let mut inventory = HeaderInventory::new();
    for p in paths.iter() {
        let path = p.display().to_string();
        let file_name = simplify_file_name(&path);
        info!("Processing: {}", file_name);
        match io_excel::worksheet_headers(&path) {
            Ok(headers) => {
                for h in headers.iter() {
                    inventory.add(h, &file_name);
                }
            }
            Err(e) => {
                warn!("Error processing {}: {}", file_name, e);
            }
        }
    }
    debug!("collect_headers: {} distinct headers", inventory.len());
    Ok(inventory.into_infos())
}
