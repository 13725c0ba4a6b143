use clap::Parser;

/// Synchronizes survey responses with a search index, using identifiers derived
/// from the respondent, the survey and the question.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, global = true, takes_value = false)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Merges the company of every respondent into the answers stored in the index.
    SyncCompany(IndexUpdateArgs),
    /// Indexes one document per answered question of every response.
    IndexAnswers(IndexUpdateArgs),
    /// Converts a spreadsheet export into a JSON array of records.
    Convert(ConvertArgs),
    /// Lists the headers found in all the spreadsheets of a directory.
    Headers(HeadersArgs),
    /// Prints the identifier derived from a respondent, a survey and a question.
    Derive(DeriveArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct IndexUpdateArgs {
    /// (file path, optional) The JSON configuration of the source and the index.
    #[clap(short, long, value_parser, env = "SURVEY_SYNC_CONFIG")]
    pub config: Option<String>,

    /// (file path) The file containing the survey records. Setting this option overrides
    /// the source that may be specified with the --config option.
    #[clap(short, long, value_parser, env = "SURVEY_SYNC_INPUT")]
    pub input: Option<String>,

    /// (json, xlsx or csv) The type of the input. By default, it is guessed from the
    /// extension of the file.
    #[clap(long, value_parser, env = "SURVEY_SYNC_INPUT_TYPE")]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use. By default,
    /// the first worksheet is read.
    #[clap(long, value_parser, env = "SURVEY_SYNC_EXCEL_WORKSHEET_NAME")]
    pub excel_worksheet_name: Option<String>,

    /// (file path) If specified, the updates are merged into the JSON index stored at this
    /// location. Setting this option overrides the index of the --config option.
    #[clap(short, long, value_parser, env = "SURVEY_SYNC_OUT")]
    pub out: Option<String>,

    /// (default 50) The number of documents sent to the index at once.
    #[clap(long, value_parser, env = "SURVEY_SYNC_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// If passed as an argument, the updates are printed to the standard output instead
    /// of being applied.
    #[clap(long, takes_value = false, env = "SURVEY_SYNC_DRY_RUN")]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConvertArgs {
    /// (file path) The spreadsheet to convert.
    #[clap(short, long, value_parser, env = "SURVEY_SYNC_INPUT")]
    pub input: String,

    /// The name of the worksheet to use. By default, the first worksheet is read.
    #[clap(long, value_parser, env = "SURVEY_SYNC_EXCEL_WORKSHEET_NAME")]
    pub excel_worksheet_name: Option<String>,

    /// If passed as an argument, every record is stamped with the identifier of its
    /// response, the name of the file and its position.
    #[clap(long, takes_value = false)]
    pub with_ids: bool,

    /// (file path, 'stdout' or empty) Where to write the records.
    #[clap(short, long, value_parser, env = "SURVEY_SYNC_OUT")]
    pub out: Option<String>,

    /// (file path) A reference file containing the expected records in JSON format. If
    /// provided, the program checks that the output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct HeadersArgs {
    /// (directory) The directory containing the spreadsheets.
    #[clap(short, long, value_parser, env = "SURVEY_SYNC_INPUT")]
    pub input: String,

    /// (file path, 'stdout' or empty) Where to write the list of headers.
    #[clap(short, long, value_parser, env = "SURVEY_SYNC_OUT")]
    pub out: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DeriveArgs {
    /// The identifier of the respondent.
    #[clap(long, value_parser)]
    pub respondent_id: String,

    /// The identifier of the survey (collector).
    #[clap(long, value_parser)]
    pub survey_id: String,

    /// The text of the question, if any.
    #[clap(long, value_parser)]
    pub question: Option<String>,

    /// If passed as an argument, prints the identifier of the whole response instead.
    #[clap(long, takes_value = false)]
    pub response: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_arguments() {
        let args = Args::parse_from([
            "survey_sync",
            "derive",
            "--respondent-id",
            "12345",
            "--survey-id",
            "67890",
            "--question",
            "Gender?",
            "--verbose",
        ]);
        assert!(args.verbose);
        match args.command {
            Command::Derive(d) => {
                assert_eq!(d.respondent_id, "12345");
                assert_eq!(d.question.as_deref(), Some("Gender?"));
                assert!(!d.response);
            }
            x => panic!("unexpected command {:?}", x),
        }
    }

    #[test]
    fn sync_company_arguments() {
        let args = Args::parse_from([
            "survey_sync",
            "sync-company",
            "--input",
            "responses.xlsx",
            "--batch-size",
            "10",
            "--dry-run",
        ]);
        match args.command {
            Command::SyncCompany(s) => {
                assert_eq!(s.input.as_deref(), Some("responses.xlsx"));
                assert_eq!(s.batch_size, Some(10));
                assert!(s.dry_run);
            }
            x => panic!("unexpected command {:?}", x),
        }
    }

    #[test]
    fn index_answers_arguments() {
        let args = Args::parse_from([
            "survey_sync",
            "index-answers",
            "--config",
            "sync.json",
            "--out",
            "index.json",
        ]);
        match args.command {
            Command::IndexAnswers(a) => {
                assert_eq!(a.config.as_deref(), Some("sync.json"));
                assert_eq!(a.out.as_deref(), Some("index.json"));
                assert_eq!(a.batch_size, None);
                assert!(!a.dry_run);
            }
            x => panic!("unexpected command {:?}", x),
        }
    }
}
