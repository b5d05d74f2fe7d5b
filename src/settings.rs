use crate::compiler::compiler_errors::CompileError;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::path::Path;

pub const SAPLING_FILE_EXTENSION: &str = "sap";
pub const CONFIG_FILE_NAME: &str = "lifecycle.toml";

// These are guesses about how much should be initially allocated for the
// analysis-side collections. Rough heuristics from small test programs,
// should be recalculated at a later point.
pub const LIFTED_PLAN_CAPACITY: usize = 16; // (Maybe) Most units override a handful of types
pub const DROPS_PER_EDGE_CAPACITY: usize = 4; // (No idea atm)
pub const DEFAULT_ERROR_LIMIT: usize = 50;

/// The syntactic positions an expression can occupy, as seen by the
/// destructible-context check.
///
/// `Other` is the catch-all for every position outside the whitelist and
/// can never itself be whitelisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSite {
    VarInit,
    LetInit,
    ReturnValue,
    ResultAssignment,
    Other,
}

impl ContextSite {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextSite::VarInit => "var-init",
            ContextSite::LetInit => "let-init",
            ContextSite::ReturnValue => "return-value",
            ContextSite::ResultAssignment => "result-assignment",
            ContextSite::Other => "other",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub unit_name: String,

    /// The destructible-context whitelist. A policy table rather than
    /// hard-coded logic so future versions can widen it (an escape
    /// analysis is the planned replacement).
    pub destructible_contexts: FxHashSet<ContextSite>,

    /// Stop collecting user errors after this many
    pub error_limit: usize,

    pub warnings_disabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mut destructible_contexts = FxHashSet::default();
        destructible_contexts.insert(ContextSite::VarInit);
        destructible_contexts.insert(ContextSite::LetInit);
        destructible_contexts.insert(ContextSite::ReturnValue);
        destructible_contexts.insert(ContextSite::ResultAssignment);

        Config {
            unit_name: String::from("main"),
            destructible_contexts,
            error_limit: DEFAULT_ERROR_LIMIT,
            warnings_disabled: false,
        }
    }
}

// Raw deserialization shape. Everything optional so a partial config file
// overlays the defaults.
#[derive(Deserialize)]
struct RawConfig {
    unit_name: Option<String>,
    destructible_contexts: Option<Vec<ContextSite>>,
    error_limit: Option<usize>,
    warnings_disabled: Option<bool>,
}

impl Config {
    pub fn from_toml_str(toml_src: &str) -> Result<Config, CompileError> {
        let raw: RawConfig = toml::from_str(toml_src)
            .map_err(|e| CompileError::config_error(format!("Invalid lifecycle config: {e}")))?;

        let mut config = Config::default();

        if let Some(unit_name) = raw.unit_name {
            config.unit_name = unit_name;
        }

        if let Some(contexts) = raw.destructible_contexts {
            if contexts.contains(&ContextSite::Other) {
                return Err(CompileError::config_error(
                    "'other' is the rejection bucket of the destructible-context check and cannot be whitelisted",
                ));
            }

            config.destructible_contexts = contexts.into_iter().collect();
        }

        if let Some(error_limit) = raw.error_limit {
            config.error_limit = error_limit;
        }

        if let Some(warnings_disabled) = raw.warnings_disabled {
            config.warnings_disabled = warnings_disabled;
        }

        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Config, CompileError> {
        let toml_src = std::fs::read_to_string(path).map_err(|e| {
            CompileError::config_error(format!(
                "Could not read lifecycle config at {}: {e}",
                path.display()
            ))
        })?;

        Config::from_toml_str(&toml_src)
    }
}
