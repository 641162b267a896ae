// 🔎 Scoped Retrieval Providers
//
// Every provider filters one relation by (code, periods, accounts).
// Which code depends on the scope the caller names explicitly:
//
//   DetailScope::Individual  → entity_detail on reporting_code
//   DetailScope::Prudential  → group_detail  on reporting_code
//   ValueScope::Individual   → group_values  on own_code
//   ValueScope::Prudential   → group_values  on parent_group_code
//   ValueScope::Financial    → group_values  on financial_group_code
//
// No scope ever falls back to another one.

pub mod attributes;
pub mod detail;
pub mod values;

use crate::error::{AnalysisError, AnalysisResult};
use crate::period::Period;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub use attributes::{AttributeProvider, AttributeRecord};
pub use detail::{DetailProvider, DetailRecord};
pub use values::{ValueProvider, ValueRecord};

// ============================================================================
// SCOPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailScope {
    Individual,
    Prudential,
}

impl DetailScope {
    pub const VALID: [&'static str; 3] = ["individual", "prudential", "group-level"];

    /// Parse a caller-supplied scope; missing or unknown values are rejected
    pub fn parse(value: Option<&str>) -> AnalysisResult<Self> {
        let raw = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return Err(AnalysisError::invalid_scope("scope", None, &Self::VALID)),
        };

        match raw.to_lowercase().as_str() {
            "individual" => Ok(DetailScope::Individual),
            "prudential" | "group-level" => Ok(DetailScope::Prudential),
            _ => Err(AnalysisError::invalid_scope("scope", Some(raw), &Self::VALID)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailScope::Individual => "individual",
            DetailScope::Prudential => "prudential",
        }
    }
}

impl fmt::Display for DetailScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueScope {
    Individual,
    Prudential,
    Financial,
}

impl ValueScope {
    pub const VALID: [&'static str; 5] = [
        "individual",
        "prudential",
        "financial",
        "group-level",
        "financial-group",
    ];

    pub fn parse(value: Option<&str>) -> AnalysisResult<Self> {
        let raw = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return Err(AnalysisError::invalid_scope("scope", None, &Self::VALID)),
        };

        match raw.to_lowercase().as_str() {
            "individual" => Ok(ValueScope::Individual),
            "prudential" | "group-level" => Ok(ValueScope::Prudential),
            "financial" | "financial-group" => Ok(ValueScope::Financial),
            _ => Err(AnalysisError::invalid_scope("scope", Some(raw), &Self::VALID)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueScope::Individual => "individual",
            ValueScope::Prudential => "prudential",
            ValueScope::Financial => "financial",
        }
    }
}

impl fmt::Display for ValueScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ACCOUNTS
// ============================================================================

/// An account is addressed by name or by numeric code.
///
/// JSON: `"Total Assets"` is a name, `78182` is a code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Account {
    Code(i64),
    Name(String),
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Account::Code(code) => write!(f, "{}", code),
            Account::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Account {
    fn from(name: &str) -> Self {
        Account::Name(name.to_string())
    }
}

impl From<i64> for Account {
    fn from(code: i64) -> Self {
        Account::Code(code)
    }
}

/// Accounts split by kind; a row matches if its name OR its code is present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSet {
    names: BTreeSet<String>,
    codes: BTreeSet<i64>,
}

impl AccountSet {
    pub fn new<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut set = AccountSet::default();
        set.extend(accounts);
        set
    }

    pub fn extend<'a>(&mut self, accounts: impl IntoIterator<Item = &'a Account>) {
        for account in accounts {
            match account {
                Account::Name(name) => {
                    self.names.insert(name.trim().to_string());
                }
                Account::Code(code) => {
                    self.codes.insert(*code);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.codes.is_empty()
    }

    pub fn matches(&self, name: &str, code: i64) -> bool {
        self.codes.contains(&code) || self.names.contains(name)
    }
}

// ============================================================================
// QUERY
// ============================================================================

/// Filter parameters of one retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub accounts: Vec<Account>,
    pub periods: Vec<Period>,
    #[serde(default)]
    pub documents: Option<Vec<u32>>,
}

impl Query {
    pub fn new(accounts: Vec<Account>, periods: Vec<Period>) -> Self {
        Query {
            accounts,
            periods,
            documents: None,
        }
    }

    pub fn with_documents(mut self, documents: Vec<u32>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Exact-parameter match for one row; an empty account list matches nothing
    pub(crate) fn matcher(&self) -> RowMatcher<'_> {
        RowMatcher {
            accounts: AccountSet::new(&self.accounts),
            periods: &self.periods,
            documents: self.documents.as_deref(),
        }
    }

    /// Human-readable parameter summary for DataUnavailable reasons
    pub(crate) fn describe(&self) -> String {
        let accounts = self
            .accounts
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let periods = self
            .periods
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        match &self.documents {
            Some(docs) => format!(
                "accounts [{}], periods [{}], documents {:?}",
                accounts, periods, docs
            ),
            None => format!("accounts [{}], periods [{}]", accounts, periods),
        }
    }
}

pub(crate) struct RowMatcher<'q> {
    accounts: AccountSet,
    periods: &'q [Period],
    documents: Option<&'q [u32]>,
}

impl RowMatcher<'_> {
    pub(crate) fn matches(&self, period: Period, account_name: &str, account_code: i64) -> bool {
        self.periods.contains(&period) && self.accounts.matches(account_name, account_code)
    }

    pub(crate) fn document_ok(&self, document: u32) -> bool {
        self.documents.map_or(true, |docs| docs.contains(&document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parsing_is_case_insensitive_with_aliases() {
        assert_eq!(DetailScope::parse(Some("Individual")).unwrap(), DetailScope::Individual);
        assert_eq!(DetailScope::parse(Some("GROUP-LEVEL")).unwrap(), DetailScope::Prudential);
        assert_eq!(ValueScope::parse(Some("financial-group")).unwrap(), ValueScope::Financial);
        assert_eq!(ValueScope::parse(Some(" prudential ")).unwrap(), ValueScope::Prudential);
    }

    #[test]
    fn test_scope_parsing_rejects_missing_and_unknown() {
        match DetailScope::parse(None) {
            Err(AnalysisError::InvalidScope { value, valid, .. }) => {
                assert_eq!(value, None);
                assert!(valid.contains(&"prudential"));
            }
            other => panic!("expected InvalidScope, got {:?}", other),
        }

        // Detail family has no financial scope
        assert!(matches!(
            DetailScope::parse(Some("financial")),
            Err(AnalysisError::InvalidScope { .. })
        ));
        assert!(ValueScope::parse(Some("cascade")).is_err());
    }

    #[test]
    fn test_account_json_is_untagged() {
        let accounts: Vec<Account> = serde_json::from_str(r#"["Total Assets", 78182]"#).unwrap();
        assert_eq!(accounts[0], Account::Name("Total Assets".to_string()));
        assert_eq!(accounts[1], Account::Code(78182));
    }

    #[test]
    fn test_account_set_matches_by_name_or_code() {
        let set = AccountSet::new(&[Account::from("Cash"), Account::from(78182)]);
        assert!(set.matches("Cash", 1));
        assert!(set.matches("Anything", 78182));
        assert!(!set.matches("Total Assets", 10000001));
        assert!(AccountSet::default().is_empty());
    }
}
