// ⚠️ Error Taxonomy - one base failure type for every lookup
//
// Single-entity calls propagate these unchanged. Batch operations downgrade
// resolution failures to sentinel rows and data gaps to null cells, and let
// scope/configuration errors abort.

use thiserror::Error;

/// How many ambiguous candidates the message lists before summarizing
const AMBIGUOUS_PREVIEW: usize = 5;

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Identifier matched nothing in the name index
    #[error("no entity found for identifier '{identifier}'.{}", render_suggestions(.suggestions))]
    NotFound {
        identifier: String,
        suggestions: Vec<String>,
    },

    /// Identifier matched more than one name under containment search
    #[error(
        "identifier '{identifier}' is ambiguous: {} matches found. Matches: {}. Suggestion: {suggestion}",
        count_matches(.matches),
        preview_matches(.matches)
    )]
    Ambiguous {
        identifier: String,
        matches: Vec<String>,
        suggestion: String,
    },

    /// Scope/type parameter missing or outside the enumerated set
    #[error("{}", describe_invalid_scope(.parameter, .value, .valid))]
    InvalidScope {
        parameter: String,
        value: Option<String>,
        valid: Vec<&'static str>,
    },

    /// Resolution succeeded but no rows satisfy the request
    #[error(
        "data unavailable for entity '{entity}' with scope '{scope}'. Reason: {reason}.{}",
        render_suggestions(.suggestions)
    )]
    DataUnavailable {
        entity: String,
        scope: String,
        reason: String,
        suggestions: Vec<String>,
    },

    /// Indicator configuration is incomplete or names an unknown source
    #[error("indicator '{indicator}' is malformed: {reason}")]
    MalformedIndicator { indicator: String, reason: String },

    #[error("invalid period range: {reason}")]
    InvalidPeriodRange { reason: String },

    /// Failure while loading the underlying relations
    #[error("failed to load relations: {0:#}")]
    Load(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn not_found(identifier: &str) -> Self {
        AnalysisError::NotFound {
            identifier: identifier.to_string(),
            suggestions: vec![
                "check that the name or code is spelled correctly".to_string(),
                "use the 8-digit code for precision".to_string(),
            ],
        }
    }

    pub fn ambiguous(identifier: &str, matches: Vec<String>) -> Self {
        AnalysisError::Ambiguous {
            identifier: identifier.to_string(),
            matches,
            suggestion: "use a more complete name or the 8-digit code for precision".to_string(),
        }
    }

    pub fn invalid_scope(parameter: &str, value: Option<&str>, valid: &[&'static str]) -> Self {
        AnalysisError::InvalidScope {
            parameter: parameter.to_string(),
            value: value.map(str::to_string),
            valid: valid.to_vec(),
        }
    }

    pub fn data_unavailable(entity: &str, scope: &str, reason: impl Into<String>) -> Self {
        AnalysisError::DataUnavailable {
            entity: entity.to_string(),
            scope: scope.to_string(),
            reason: reason.into(),
            suggestions: vec![
                "check the requested periods and accounts".to_string(),
                "try a different scope explicitly".to_string(),
            ],
        }
    }

    pub fn malformed(indicator: &str, reason: impl Into<String>) -> Self {
        AnalysisError::MalformedIndicator {
            indicator: indicator.to_string(),
            reason: reason.into(),
        }
    }

    /// Identifier could not be mapped to an entity code
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            AnalysisError::NotFound { .. } | AnalysisError::Ambiguous { .. }
        )
    }

    /// Entity is known, the requested figures are not
    pub fn is_data_gap(&self) -> bool {
        matches!(self, AnalysisError::DataUnavailable { .. })
    }
}

fn render_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" Suggestions: {}", suggestions.join(", "))
    }
}

fn count_matches(matches: &[String]) -> usize {
    matches.len()
}

fn preview_matches(matches: &[String]) -> String {
    let mut shown = matches
        .iter()
        .take(AMBIGUOUS_PREVIEW)
        .map(|m| format!("'{}'", m))
        .collect::<Vec<_>>()
        .join(", ");

    if matches.len() > AMBIGUOUS_PREVIEW {
        shown.push_str(&format!(" (and {} more)", matches.len() - AMBIGUOUS_PREVIEW));
    }
    shown
}

fn describe_invalid_scope(parameter: &str, value: &Option<String>, valid: &[&'static str]) -> String {
    let valid_list = valid
        .iter()
        .map(|v| format!("'{}'", v))
        .collect::<Vec<_>>()
        .join(", ");

    match value.as_deref() {
        None => format!(
            "parameter '{}' is required. Valid values: {}",
            parameter, valid_list
        ),
        Some(v) => format!(
            "value '{}' is invalid for parameter '{}'. Valid values: {}",
            v, parameter, valid_list
        ),
    }
}

// ============================================================================
// TESTS
// ============================================================================
