//! Selection criteria for testbenches and test cases.
//!
//! Patterns are whole-string regular expressions: `foo` selects `foo` and
//! never `foobar`.
use anyhow::{anyhow, Context, Result};
use regex::Regex;

/// Attribute a filter pass operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAttr {
    Tags,
    Tests,
}

/// Compiled, fully anchored pattern list.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    compiled: Vec<Regex>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut set = PatternSet::default();
        for pattern in patterns {
            set.compiled.push(compile_full_match(pattern.as_ref())?);
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(text))
    }
}

/// Check a user pattern and anchor it for whole-string matching.
pub fn compile_full_match(pattern: &str) -> Result<Regex> {
    if pattern.trim().is_empty() {
        return Err(anyhow!("regular expression must not be empty"));
    }
    Regex::new(&format!("^(?:{pattern})$"))
        .with_context(|| format!("invalid regular expression {pattern:?}"))
}

/// Inclusion/exclusion rules plus an explicit testbench selection.
#[derive(Debug, Clone, Default)]
pub struct Filtering {
    pub tb_names: Vec<String>,
    pub include_tests: PatternSet,
    pub exclude_tests: PatternSet,
    pub include_tags: PatternSet,
    pub exclude_tags: PatternSet,
}

impl Filtering {
    pub fn new<S: AsRef<str>>(
        tb_names: Vec<String>,
        include_tests: &[S],
        exclude_tests: &[S],
        include_tags: &[S],
        exclude_tags: &[S],
    ) -> Result<Self> {
        Ok(Filtering {
            tb_names,
            include_tests: PatternSet::new(include_tests).context("include tests")?,
            exclude_tests: PatternSet::new(exclude_tests).context("exclude tests")?,
            include_tags: PatternSet::new(include_tags).context("include tags")?,
            exclude_tags: PatternSet::new(exclude_tags).context("exclude tags")?,
        })
    }

    fn rules(&self, attr: FilterAttr) -> (&PatternSet, &PatternSet) {
        match attr {
            FilterAttr::Tags => (&self.include_tags, &self.exclude_tags),
            FilterAttr::Tests => (&self.include_tests, &self.exclude_tests),
        }
    }

    /// Keep candidates that pass inclusion, then drop the excluded ones.
    ///
    /// An empty include list places no restriction. Candidate order is kept.
    pub fn select<S: AsRef<str>>(&self, attr: FilterAttr, candidates: &[S]) -> Vec<String> {
        let (include, exclude) = self.rules(attr);
        candidates
            .iter()
            .map(|item| item.as_ref())
            .filter(|item| include.is_empty() || include.matches(item))
            .filter(|item| !exclude.matches(item))
            .map(str::to_string)
            .collect()
    }

    /// Whether a testbench with `tags` takes part in the regression.
    ///
    /// Untagged testbenches only participate when no include-tag patterns are
    /// given.
    pub fn accepts_tags(&self, tags: &[String]) -> bool {
        if tags.is_empty() {
            return self.include_tags.is_empty();
        }
        !self.select(FilterAttr::Tags, tags).is_empty()
    }
}
