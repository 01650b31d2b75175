//! Case file parsing and validation.
//!
//! Cases are TOML files describing one problem plus optional search overrides.
//! See `eval/cases/` for examples.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

/// A parsed case file: metadata, problem, and config overrides.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CaseFile {
    pub case: CaseMeta,
    pub problem: Problem,
    #[serde(default)]
    pub config: CaseConfig,
}

/// Case metadata.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Problem handed to the controller, tagged by domain.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// 24 game over the given numbers.
    Game24 { numbers: Vec<u64> },
    /// Arithmetic word problem, optionally with its expected answer.
    Word {
        question: String,
        #[serde(default)]
        gold: Option<f64>,
    },
}

impl Problem {
    pub fn kind(&self) -> &'static str {
        match self {
            Problem::Game24 { .. } => "game24",
            Problem::Word { .. } => "word",
        }
    }
}

/// Search and backend overrides for the case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CaseConfig {
    pub max_iterations: Option<u32>,
    pub min_iterations: Option<u32>,
    pub require_gold: Option<bool>,
    /// Generation backend command override (e.g. `["llm", "-m", "gpt-4o-mini"]`).
    pub generator_command: Option<Vec<String>>,
}

impl CaseFile {
    /// Load and validate a case file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read case {}", path.display()))?;
        let case: CaseFile =
            toml::from_str(&contents).with_context(|| format!("parse case {}", path.display()))?;
        case.validate()
            .with_context(|| format!("validate case {}", path.display()))?;
        Ok(case)
    }

    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let case: CaseFile = toml::from_str(contents).context("parse case")?;
        case.validate()?;
        Ok(case)
    }

    fn validate(&self) -> Result<()> {
        validate_case_id(&self.case.id)?;
        match &self.problem {
            Problem::Game24 { numbers } => {
                if numbers.is_empty() {
                    bail!("problem.numbers must be a non-empty array");
                }
            }
            Problem::Word { question, gold } => {
                if question.trim().is_empty() {
                    bail!("problem.question must be non-empty");
                }
                if let Some(gold) = gold
                    && !gold.is_finite()
                {
                    bail!("problem.gold must be a finite number");
                }
            }
        }
        if let Some(max_iterations) = self.config.max_iterations
            && max_iterations == 0
        {
            bail!("config.max_iterations must be > 0");
        }
        if let Some(command) = &self.config.generator_command
            && (command.is_empty() || command[0].trim().is_empty())
        {
            bail!("config.generator_command must be a non-empty array");
        }
        Ok(())
    }
}

/// Discover and load all case files from a directory.
///
/// Returns cases sorted by id. Errors if duplicate ids are found.
pub fn discover_cases(dir: &Path) -> Result<Vec<CaseFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read cases dir {}", dir.display()))? {
        let entry = entry.context("read case entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        cases.push(CaseFile::load(&path)?);
    }
    cases.sort_by(|left, right| left.case.id.cmp(&right.case.id));
    for pair in cases.windows(2) {
        if pair[0].case.id == pair[1].case.id {
            return Err(anyhow!("duplicate case.id {}", pair[0].case.id));
        }
    }
    Ok(cases)
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case.id must be non-empty");
    }
    if id.contains('/') || id.contains('\\') {
        bail!("case.id must not contain path separators");
    }
    if id.contains("..") {
        bail!("case.id must not contain '..'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case.id must use [a-z0-9_-] only");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_game24_case() {
        let input = r#"
[case]
id = "game24-1259"

[problem]
kind = "game24"
numbers = [1, 2, 5, 9]

[config]
max_iterations = 12
generator_command = ["llm", "-m", "gpt-4o-mini"]
"#;
        let case = CaseFile::parse_str(input).expect("case parses");
        assert_eq!(case.case.id, "game24-1259");
        assert_eq!(
            case.problem,
            Problem::Game24 {
                numbers: vec![1, 2, 5, 9]
            }
        );
        assert_eq!(case.config.max_iterations, Some(12));
    }

    #[test]
    fn parses_word_case_without_config() {
        let input = r#"
[case]
id = "word-pens"

[problem]
kind = "word"
question = "Ann has 3 boxes of 4 pens. How many pens?"
gold = 12
"#;
        let case = CaseFile::parse_str(input).expect("case parses");
        assert_eq!(case.problem.kind(), "word");
        assert_eq!(case.config, CaseConfig::default());
    }

    #[test]
    fn rejects_invalid_id() {
        let input = r#"
[case]
id = "bad/id"

[problem]
kind = "game24"
numbers = [4, 6]
"#;
        let err = CaseFile::parse_str(input).expect_err("invalid id");
        assert!(err.to_string().contains("case.id"));
    }

    #[test]
    fn bundled_cases_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("cases");
        let cases = discover_cases(&dir).expect("discover");
        assert!(!cases.is_empty());
        assert!(cases.iter().any(|case| case.problem.kind() == "game24"));
        assert!(cases.iter().any(|case| case.problem.kind() == "word"));
    }

    #[test]
    fn rejects_empty_problem() {
        let input = r#"
[case]
id = "empty"

[problem]
kind = "game24"
numbers = []
"#;
        let err = CaseFile::parse_str(input).expect_err("invalid problem");
        assert!(err.to_string().contains("problem.numbers"));
    }
}
