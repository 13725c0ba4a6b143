use crate::sync::*;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CompanyColumns {
    pub first: usize,
    pub last: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub source: SourceSettings,
    pub index: Option<IndexSettings>,
    #[serde(rename = "companyColumns")]
    pub company_columns: Option<CompanyColumns>,
    #[serde(rename = "knownCompanies")]
    pub known_companies: Option<Vec<String>>,
    #[serde(rename = "batchSize")]
    _batch_size: Option<JSValue>,
}

/// The validated settings of the company update.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CompanySettings {
    /// Number of the first `Column{n}` field that may contain the company.
    pub first_column: usize,
    /// Number of the last `Column{n}` field (inclusive).
    pub last_column: usize,
    /// If set, only these names are accepted as companies.
    pub known_companies: Option<HashSet<String>>,
    pub batch_size: usize,
}

impl CompanySettings {
    pub const DEFAULT_FIRST_COLUMN: usize = 11;
    pub const DEFAULT_LAST_COLUMN: usize = 33;
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    /// Number of columns of a spreadsheet (XFD).
    pub const MAX_COLUMN: usize = 16_384;
}

impl Default for CompanySettings {
    fn default() -> Self {
        CompanySettings {
            first_column: CompanySettings::DEFAULT_FIRST_COLUMN,
            last_column: CompanySettings::DEFAULT_LAST_COLUMN,
            known_companies: None,
            batch_size: CompanySettings::DEFAULT_BATCH_SIZE,
        }
    }
}

/// The validated settings of the answer indexing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnswerSettings {
    /// The names accepted as companies in the answers to the company question.
    pub known_companies: HashSet<String>,
    pub batch_size: usize,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        AnswerSettings {
            known_companies: answers::DEFAULT_KNOWN_COMPANIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            batch_size: CompanySettings::DEFAULT_BATCH_SIZE,
        }
    }
}

impl SyncConfig {
    /// A configuration reading the given file, without any index configured.
    pub fn from_input(input: &str, input_type: Option<&str>) -> SyncConfig {
        SyncConfig {
            source: SourceSettings {
                provider: input_type
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| infer_provider(input)),
                file_path: input.to_string(),
                excel_worksheet_name: None,
            },
            index: None,
            company_columns: None,
            known_companies: None,
            _batch_size: None,
        }
    }

    pub fn batch_size(&self) -> SyncResult<usize> {
        match &self._batch_size {
            None => Ok(CompanySettings::DEFAULT_BATCH_SIZE),
            x => match read_js_int(x) {
                Some(n) if n > 0 => Ok(n),
                _ => InvalidConfigSnafu {
                    message: format!("batchSize must be a positive integer, got {:?}", x),
                }
                .fail(),
            },
        }
    }

    /// The index to update. Defaults to a dry run on the standard output.
    pub fn index_settings(&self) -> IndexSettings {
        self.index.clone().unwrap_or(IndexSettings {
            provider: "stdout".to_string(),
            file_path: None,
        })
    }

    /// Without `knownCompanies`, the companies of the survey exports are accepted.
    pub fn answer_settings(&self) -> SyncResult<AnswerSettings> {
        let known_companies = match &self.known_companies {
            Some(l) => l.iter().map(|s| s.trim().to_string()).collect(),
            None => AnswerSettings::default().known_companies,
        };
        Ok(AnswerSettings {
            known_companies,
            batch_size: self.batch_size()?,
        })
    }

    pub fn company_settings(&self) -> SyncResult<CompanySettings> {
        let (first_column, last_column) = match &self.company_columns {
            Some(cc) => (cc.first, cc.last),
            None => (
                CompanySettings::DEFAULT_FIRST_COLUMN,
                CompanySettings::DEFAULT_LAST_COLUMN,
            ),
        };
        ensure!(
            first_column >= 1
                && first_column <= last_column
                && last_column <= CompanySettings::MAX_COLUMN,
            InvalidConfigSnafu {
                message: format!(
                    "invalid company columns: first {} last {} (columns go from 1 to {})",
                    first_column,
                    last_column,
                    CompanySettings::MAX_COLUMN
                ),
            }
        );
        let known_companies: Option<HashSet<String>> = self
            .known_companies
            .as_ref()
            .map(|l| l.iter().map(|s| s.trim().to_string()).collect());
        Ok(CompanySettings {
            first_column,
            last_column,
            known_companies,
            batch_size: self.batch_size()?,
        })
    }
}

/// Values passed on the command line, which take precedence over the
/// configuration file.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<String>,
    pub input_type: Option<String>,
    pub excel_worksheet_name: Option<String>,
    pub out: Option<String>,
    pub batch_size: Option<usize>,
    pub dry_run: bool,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut SyncConfig) {
        if let Some(input) = &self.input {
            config.source.file_path = input.clone();
            config.source.provider = self
                .input_type
                .clone()
                .unwrap_or_else(|| infer_provider(input));
        } else if let Some(input_type) = &self.input_type {
            config.source.provider = input_type.clone();
        }
        if self.excel_worksheet_name.is_some() {
            config.source.excel_worksheet_name = self.excel_worksheet_name.clone();
        }
        if let Some(out) = &self.out {
            config.index = Some(IndexSettings {
                provider: "file".to_string(),
                file_path: Some(out.clone()),
            });
        }
        if self.dry_run {
            config.index = Some(IndexSettings {
                provider: "stdout".to_string(),
                file_path: None,
            });
        }
        if let Some(n) = self.batch_size {
            config._batch_size = Some(JSValue::from(n));
        }
    }
}

/// Reads the configuration file, if any, and applies the overrides.
pub fn resolve_config(
    config_path: Option<&str>,
    overrides: &ConfigOverrides,
) -> SyncResult<SyncConfig> {
    let mut config = match config_path {
        Some(p) => read_config(p)?,
        None => {
            let input = overrides.input.as_deref().context(InvalidConfigSnafu {
                message: "either a configuration file or an input file is required",
            })?;
            SyncConfig::from_input(input, overrides.input_type.as_deref())
        }
    };
    overrides.apply(&mut config);
    Ok(config)
}

/// Reads a configuration file. The relative paths it contains are resolved
/// against the directory of the file.
pub fn read_config(path: &str) -> SyncResult<SyncConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let mut config: SyncConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    let root_p = Path::new(path).parent().context(MissingParentDirSnafu {})?;
    config.source.file_path = resolve_path(root_p, &config.source.file_path);
    if let Some(index) = config.index.as_mut() {
        index.file_path = index.file_path.as_ref().map(|p| resolve_path(root_p, p));
    }
    debug!("read_config: {:?}", config);
    Ok(config)
}

fn resolve_path(root: &Path, file_path: &str) -> String {
    root.join(file_path).display().to_string()
}

/// The provider of a file, guessed from its extension.
pub fn infer_provider(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("xlsx") => "xlsx".to_string(),
        Some("csv") => "csv".to_string(),
        _ => "json".to_string(),
    }
}

fn read_js_int(x: &Option<JSValue>) -> Option<usize> {
    match x {
        Some(JSValue::Number(n)) => n.as_u64().map(|x| x as usize),
        Some(JSValue::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}
