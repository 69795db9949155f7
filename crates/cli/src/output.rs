use crate::error::CliError;
use engine_config::report::summary::IngestSummary;

/// Prints the run summary on stdout; logs go to stderr.
pub fn print_summary(summary: &IngestSummary, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{}", summary.to_text());
    }
    Ok(())
}
