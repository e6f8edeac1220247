use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fields::FieldId;
use crate::rules::Strategy;

/// Text written for a missing value under `OnMissing::Literal`.
pub const MISSING_LITERAL: &str = "未填写";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnMissing {
    /// Leave the paragraph untouched.
    Skip,
    /// Write `未填写`.
    Literal,
    /// Remove the placeholder and write nothing.
    #[default]
    Blank,
}

impl FromStr for OnMissing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(OnMissing::Skip),
            "literal" => Ok(OnMissing::Literal),
            "blank" => Ok(OnMissing::Blank),
            other => Err(format!("expected skip, literal or blank, got `{other}`")),
        }
    }
}

impl fmt::Display for OnMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnMissing::Skip => "skip",
            OnMissing::Literal => "literal",
            OnMissing::Blank => "blank",
        })
    }
}

/// A recognition rule supplied through configuration instead of generated
/// from the alias tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub priority: u16,
    pub pattern: String,
    pub strategy: Strategy,
    /// Target field; when absent the field is looked up from the `label`
    /// capture.
    #[serde(default)]
    pub field: Option<FieldId>,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    pub on_missing: OnMissing,
    pub collapse_spacing_width: usize,
    pub preserve_underline: bool,
    pub strict: bool,
    pub skip_keywords: Vec<String>,
    pub skip_whitelist: Vec<String>,
    pub extra_aliases: BTreeMap<FieldId, Vec<String>>,
    pub extra_rules: Vec<RuleSpec>,
}

impl Default for FillOptions {
    fn default() -> Self {
        FillOptions {
            on_missing: OnMissing::Blank,
            collapse_spacing_width: 4,
            preserve_underline: false,
            strict: false,
            skip_keywords: ["招标代理", "代理", "签字", "签名"]
                .map(String::from)
                .to_vec(),
            skip_whitelist: vec!["签字代表".to_string()],
            extra_aliases: BTreeMap::new(),
            extra_rules: Vec::new(),
        }
    }
}

impl FillOptions {
    pub fn load(path: &Path) -> Result<FillOptions, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
        })?;
        let options: FillOptions = serde_json::from_str(&raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.collapse_spacing_width < 2 {
            return Err(Error::InvalidOptions(format!(
                "collapse_spacing_width must be at least 2, got {}",
                self.collapse_spacing_width
            )));
        }
        Ok(())
    }
}
