//! Evaluation parameters.
//!
//! `EvalParams` describes one experiment; it is projected per revision into
//! the argument list of a worker and the key of the result store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{SearchError, SearchResult};
use crate::domain::models::revision::RevisionId;

/// Browser configuration an evaluation runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowserConfigOption {
    #[default]
    Default,
    Btpc,
    Tp,
    NoTp,
    Pb,
    AllowJavaApplets,
}

impl BrowserConfigOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Btpc => "btpc",
            Self::Tp => "tp",
            Self::NoTp => "no-tp",
            Self::Pb => "pb",
            Self::AllowJavaApplets => "allow-java-applets",
        }
    }
}

impl fmt::Display for BrowserConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserConfigOption {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "btpc" => Ok(Self::Btpc),
            "tp" => Ok(Self::Tp),
            "no-tp" => Ok(Self::NoTp),
            "pb" => Ok(Self::Pb),
            "allow-java-applets" => Ok(Self::AllowJavaApplets),
            other => Err(SearchError::InvalidParams(format!(
                "browser configuration option '{other}' is not supported"
            ))),
        }
    }
}

/// Parameters of one experiment, shared by every revision of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalParams {
    pub framework_name: String,
    pub automation: String,
    pub browser: String,
    #[serde(default)]
    pub configuration: BrowserConfigOption,
    #[serde(default)]
    pub mech_id: Option<String>,
    #[serde(default)]
    pub mech_groups: Vec<String>,
    #[serde(default)]
    pub extension_name: Option<String>,
    #[serde(default)]
    pub additional_cli_args: Vec<String>,
    #[serde(default)]
    pub cookie_name: Option<String>,
}

impl EvalParams {
    pub fn validate(&self) -> SearchResult<()> {
        if self.framework_name.trim().is_empty() {
            return Err(SearchError::InvalidParams(
                "an evaluation framework should be selected".to_string(),
            ));
        }
        if self.automation.trim().is_empty() {
            return Err(SearchError::InvalidParams(
                "a browser automation should be selected".to_string(),
            ));
        }
        if self.browser.trim().is_empty() {
            return Err(SearchError::InvalidParams(
                "a browser should be selected".to_string(),
            ));
        }
        if self.mech_groups.is_empty() {
            return Err(SearchError::InvalidParams(
                "at least one mechanism group is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn worker_params(&self, revision: &RevisionId) -> WorkerParams {
        WorkerParams {
            framework_name: self.framework_name.clone(),
            automation: self.automation.clone(),
            browser: self.browser.clone(),
            revision: revision.clone(),
            configuration: self.configuration,
            mech_id: self.mech_id.clone(),
            mech_groups: self.mech_groups.clone(),
            extension_name: self.extension_name.clone(),
            additional_cli_args: self.additional_cli_args.clone(),
            cookie_name: self.cookie_name.clone(),
        }
    }

    pub fn result_query(&self, revision: &RevisionId) -> ResultQuery {
        ResultQuery {
            automation: self.automation.clone(),
            browser: self.browser.clone(),
            configuration: self.configuration,
            revision: revision.clone(),
            mech_groups: self.mech_groups.clone(),
            mech_id: self.mech_id.clone(),
            extension_name: self.extension_name.clone(),
            additional_cli_args: self.additional_cli_args.clone(),
            cookie_name: self.cookie_name.clone(),
        }
    }
}

/// Work item handed to one isolated worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerParams {
    pub framework_name: String,
    pub automation: String,
    pub browser: String,
    pub revision: RevisionId,
    pub configuration: BrowserConfigOption,
    pub mech_id: Option<String>,
    pub mech_groups: Vec<String>,
    pub extension_name: Option<String>,
    pub additional_cli_args: Vec<String>,
    pub cookie_name: Option<String>,
}

impl WorkerParams {
    /// Flat argument list understood by the worker entry point.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--framework-name".to_string(),
            self.framework_name.clone(),
            "--automation".to_string(),
            self.automation.clone(),
            "--browser".to_string(),
            self.browser.clone(),
            "--state_id".to_string(),
            self.revision.to_string(),
            "--config".to_string(),
            self.configuration.to_string(),
        ];
        if let Some(ref mech_id) = self.mech_id {
            args.push("--mech_id".to_string());
            args.push(mech_id.clone());
        }
        for group in &self.mech_groups {
            args.push("--mech_groups".to_string());
            args.push(group.clone());
        }
        if let Some(ref extension) = self.extension_name {
            args.push("--extension_file".to_string());
            args.push(extension.clone());
        }
        for option in &self.additional_cli_args {
            args.push("--browser_cli_options".to_string());
            args.push(option.clone());
        }
        if let Some(ref cookie) = self.cookie_name {
            args.push("--cookie_name".to_string());
            args.push(cookie.clone());
        }
        args
    }
}

/// Key of a stored evaluation result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultQuery {
    pub automation: String,
    pub browser: String,
    pub configuration: BrowserConfigOption,
    pub revision: RevisionId,
    pub mech_groups: Vec<String>,
    pub mech_id: Option<String>,
    pub extension_name: Option<String>,
    pub additional_cli_args: Vec<String>,
    pub cookie_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EvalParams {
        EvalParams {
            framework_name: "custom".to_string(),
            automation: "selenium".to_string(),
            browser: "chromium".to_string(),
            configuration: BrowserConfigOption::Default,
            mech_id: None,
            mech_groups: vec!["csp".to_string(), "cookies".to_string()],
            extension_name: None,
            additional_cli_args: vec![],
            cookie_name: None,
        }
    }

    #[test]
    fn test_minimal_worker_args() {
        let args = params().worker_params(&RevisionId::Position(1000)).to_args();
        assert_eq!(
            args,
            vec![
                "--framework-name",
                "custom",
                "--automation",
                "selenium",
                "--browser",
                "chromium",
                "--state_id",
                "1000",
                "--config",
                "default",
                "--mech_groups",
                "csp",
                "--mech_groups",
                "cookies",
            ]
        );
    }

    #[test]
    fn test_optional_worker_args_are_separate_tokens() {
        let mut p = params();
        p.mech_id = Some("csp-01".to_string());
        p.extension_name = Some("adblock.crx".to_string());
        p.additional_cli_args = vec!["--disable-gpu".to_string(), "--no-sandbox".to_string()];
        p.cookie_name = Some("generic".to_string());

        let args = p.worker_params(&RevisionId::Position(7)).to_args();
        let joined = args.join(" ");
        assert!(joined.contains("--mech_id csp-01"));
        assert!(joined.contains("--extension_file adblock.crx"));
        assert!(joined.contains("--browser_cli_options --disable-gpu --browser_cli_options --no-sandbox"));
        assert!(joined.ends_with("--cookie_name generic"));
    }

    #[test]
    fn test_config_option_parsing() {
        assert_eq!(
            "no-tp".parse::<BrowserConfigOption>().unwrap(),
            BrowserConfigOption::NoTp
        );
        assert!("incognito".parse::<BrowserConfigOption>().is_err());
    }

    #[test]
    fn test_validate_requires_mech_groups() {
        let mut p = params();
        assert!(p.validate().is_ok());
        p.mech_groups.clear();
        assert!(matches!(p.validate(), Err(SearchError::InvalidParams(_))));
    }

    #[test]
    fn test_result_query_carries_revision() {
        let query = params().result_query(&RevisionId::Changeset("abc".to_string()));
        assert_eq!(query.revision, RevisionId::Changeset("abc".to_string()));
        assert_eq!(query.mech_groups.len(), 2);
    }
}
