use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::analysis::Analysis;
use super::error::IncentiveError;
use super::programs::ProgramKey;
use super::report::estimated_value;

pub const CSV_HEADER: [&str; 5] = ["Program", "Available", "Status", "Estimated Value", "Notes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExportFormat {
    type Err = IncentiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(IncentiveError::validation(format!(
                "unsupported export format '{other}'; expected json or csv"
            ))),
        }
    }
}

pub fn export_analysis(
    analysis: &Analysis,
    format: ExportFormat,
    default_project_cost: f64,
) -> Result<String, IncentiveError> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(analysis)
            .map_err(|err| IncentiveError::validation(format!("failed to encode analysis: {err}"))),
        ExportFormat::Csv => to_csv(analysis, default_project_cost),
    }
}

fn to_csv(analysis: &Analysis, default_project_cost: f64) -> Result<String, IncentiveError> {
    let project_cost = analysis.project_details.project_cost_or(default_project_cost);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_error)?;

    for program in ProgramKey::ALL {
        let Some(result) = analysis.result(program) else {
            continue;
        };
        let value = if result.available() {
            format!("{:.2}", estimated_value(program, project_cost))
        } else {
            "0.00".to_string()
        };
        let notes = match (result.data(), result.error_message()) {
            (Some(payload), _) => payload.notes().join("; "),
            (None, Some(message)) => message.to_string(),
            (None, None) => String::new(),
        };

        writer
            .write_record([
                program.label(),
                if result.available() { "Yes" } else { "No" },
                result.status().label(),
                value.as_str(),
                notes.as_str(),
            ])
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| IncentiveError::validation(format!("failed to flush csv: {err}")))?;
    String::from_utf8(bytes)
        .map_err(|err| IncentiveError::validation(format!("csv output was not utf-8: {err}")))
}

fn csv_error(err: csv::Error) -> IncentiveError {
    IncentiveError::validation(format!("failed to write csv: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats_case_insensitively() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!(" csv ".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);

        let err = "xml".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, IncentiveError::Validation(_)));
        assert!(err.to_string().contains("xml"));
    }
}
