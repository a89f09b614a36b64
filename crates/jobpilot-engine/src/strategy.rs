//! Candidate strategy lists: the ordered, data-driven heuristics used to find
//! each semantic target on a console page.
//!
//! Order encodes likelihood. The resolver stops at the first visible match,
//! so more specific selectors come first. Name-parameterized targets carry
//! the `{job}` placeholder and are bound when the target is resolved.

use jobpilot_common::protocol::Selector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error("candidate list for '{0}' must contain at least one strategy")]
    Empty(String),
}

/// Key of a semantic target, independent of any job name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKey {
    UsernameField,
    PasswordField,
    LoginButton,
    NavigationLink,
    AuthenticatedIndicator,
    UnauthenticatedIndicator,
    JobRowGroup,
    RowNameField,
    JobRow,
    JobActionControl,
    JobActionGlobal,
}

impl TargetKey {
    pub const ALL: [TargetKey; 11] = [
        TargetKey::UsernameField,
        TargetKey::PasswordField,
        TargetKey::LoginButton,
        TargetKey::NavigationLink,
        TargetKey::AuthenticatedIndicator,
        TargetKey::UnauthenticatedIndicator,
        TargetKey::JobRowGroup,
        TargetKey::RowNameField,
        TargetKey::JobRow,
        TargetKey::JobActionControl,
        TargetKey::JobActionGlobal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKey::UsernameField => "username_field",
            TargetKey::PasswordField => "password_field",
            TargetKey::LoginButton => "login_button",
            TargetKey::NavigationLink => "navigation_link",
            TargetKey::AuthenticatedIndicator => "authenticated_indicator",
            TargetKey::UnauthenticatedIndicator => "unauthenticated_indicator",
            TargetKey::JobRowGroup => "job_row_group",
            TargetKey::RowNameField => "row_name_field",
            TargetKey::JobRow => "job_row",
            TargetKey::JobActionControl => "job_action_control",
            TargetKey::JobActionGlobal => "job_action_global",
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to find on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticTarget {
    UsernameField,
    PasswordField,
    LoginButton,
    NavigationLink,
    AuthenticatedIndicator,
    UnauthenticatedIndicator,
    /// Rows of the job listing (batch target).
    JobRowGroup,
    /// Display-name cell inside one row.
    RowNameField,
    /// A row-like element whose text contains the job name.
    JobRow(String),
    /// The play/run control inside a row.
    JobActionControl,
    /// A page-global play/run control located relative to the job name.
    JobActionGlobal(String),
}

impl SemanticTarget {
    pub fn key(&self) -> TargetKey {
        match self {
            SemanticTarget::UsernameField => TargetKey::UsernameField,
            SemanticTarget::PasswordField => TargetKey::PasswordField,
            SemanticTarget::LoginButton => TargetKey::LoginButton,
            SemanticTarget::NavigationLink => TargetKey::NavigationLink,
            SemanticTarget::AuthenticatedIndicator => TargetKey::AuthenticatedIndicator,
            SemanticTarget::UnauthenticatedIndicator => TargetKey::UnauthenticatedIndicator,
            SemanticTarget::JobRowGroup => TargetKey::JobRowGroup,
            SemanticTarget::RowNameField => TargetKey::RowNameField,
            SemanticTarget::JobRow(_) => TargetKey::JobRow,
            SemanticTarget::JobActionControl => TargetKey::JobActionControl,
            SemanticTarget::JobActionGlobal(_) => TargetKey::JobActionGlobal,
        }
    }

    pub fn job_name(&self) -> Option<&str> {
        match self {
            SemanticTarget::JobRow(name) | SemanticTarget::JobActionGlobal(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for SemanticTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.job_name() {
            Some(name) => write!(f, "{}({:?})", self.key(), name),
            None => write!(f, "{}", self.key()),
        }
    }
}

/// One way of locating a target: a selector plus an optional probe timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStrategy {
    #[serde(flatten)]
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl CandidateStrategy {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Probe timeout for this strategy, or `default` when it has none.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }

    pub fn bind(&self, job: &str) -> Self {
        Self {
            selector: self.selector.bind(job),
            timeout_ms: self.timeout_ms,
        }
    }
}

impl From<Selector> for CandidateStrategy {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

/// Ordered, never-empty list of strategies for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<CandidateStrategy>",
    into = "Vec<CandidateStrategy>"
)]
pub struct CandidateList(Vec<CandidateStrategy>);

impl CandidateList {
    pub fn new(strategies: Vec<CandidateStrategy>) -> Result<Self, StrategyError> {
        if strategies.is_empty() {
            return Err(StrategyError::Empty("candidate list".into()));
        }
        Ok(Self(strategies))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateStrategy> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[CandidateStrategy] {
        &self.0
    }

    pub fn bind(&self, job: &str) -> Self {
        Self(self.0.iter().map(|s| s.bind(job)).collect())
    }
}

impl TryFrom<Vec<CandidateStrategy>> for CandidateList {
    type Error = StrategyError;

    fn try_from(strategies: Vec<CandidateStrategy>) -> Result<Self, Self::Error> {
        Self::new(strategies)
    }
}

impl From<CandidateList> for Vec<CandidateStrategy> {
    fn from(list: CandidateList) -> Self {
        list.0
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a CandidateStrategy;
    type IntoIter = std::slice::Iter<'a, CandidateStrategy>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Positive indicators imply an authenticated session, negative ones imply
/// the login page.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub positive: CandidateList,
    pub negative: CandidateList,
}

/// Strategy lists for every target key.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTable {
    lists: BTreeMap<TargetKey, CandidateList>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StrategyTable {
    /// Heuristics tuned for orchestration consoles (Orchestrator-style job listings).
    pub fn builtin() -> Self {
        let mut lists = BTreeMap::new();
        for key in TargetKey::ALL {
            lists.insert(key, CandidateList(builtin_candidates(key)));
        }
        Self { lists }
    }

    /// Replace the lists named in `overrides`, keep the rest.
    pub fn with_overrides(mut self, overrides: &BTreeMap<TargetKey, CandidateList>) -> Self {
        for (key, list) in overrides {
            self.lists.insert(*key, list.clone());
        }
        self
    }

    pub fn set(&mut self, key: TargetKey, list: CandidateList) {
        self.lists.insert(key, list);
    }

    pub fn get(&self, key: TargetKey) -> &CandidateList {
        // Every key is populated by `builtin`, and lists can only be replaced.
        &self.lists[&key]
    }

    /// Candidates for `target`, with the job placeholder bound.
    pub fn candidates(&self, target: &SemanticTarget) -> CandidateList {
        let list = self.get(target.key());
        match target.job_name() {
            Some(name) => list.bind(name),
            None => list.clone(),
        }
    }

    pub fn indicators(&self) -> IndicatorSet {
        IndicatorSet {
            positive: self.get(TargetKey::AuthenticatedIndicator).clone(),
            negative: self.get(TargetKey::UnauthenticatedIndicator).clone(),
        }
    }
}

fn css(s: &str) -> CandidateStrategy {
    Selector::css(s).into()
}

fn text(s: &str) -> CandidateStrategy {
    Selector::text(s).into()
}

fn css_text(c: &str, t: &str) -> CandidateStrategy {
    Selector::css_with_text(c, t).into()
}

fn builtin_candidates(key: TargetKey) -> Vec<CandidateStrategy> {
    match key {
        TargetKey::UsernameField => vec![
            css(r#"input[name="email"]"#),
            css(r#"input[name="username"]"#),
            css(r#"input[type="email"]"#),
            css(r#"input[type="text"][placeholder*="email" i]"#),
            css(r#"input[placeholder*="username" i]"#),
        ],
        TargetKey::PasswordField => vec![
            css(r#"input[name="password"]"#),
            css(r#"input[type="password"]"#),
        ],
        TargetKey::LoginButton => vec![
            css(r#"button[type="submit"]"#),
            css_text("button", "Sign in"),
            css_text("button", "Login"),
            css_text("button", "Log in"),
            css(r#"input[type="submit"]"#),
        ],
        TargetKey::NavigationLink => vec![
            css_text("a", "Jobs"),
            css_text("a", "Processes"),
            css(r#"a[href*="/jobs"]"#),
            css(r#"a[href*="/processes"]"#),
            css_text("button", "Jobs"),
            css_text("button", "Processes"),
        ],
        TargetKey::AuthenticatedIndicator => vec![
            text("Jobs"),
            text("Processes"),
            text("Robots"),
            text("Orchestrator"),
            css(r#"[data-testid*="menu"]"#),
            css("nav"),
            css(r#"[role="navigation"]"#),
        ],
        TargetKey::UnauthenticatedIndicator => vec![
            text("Sign in"),
            text("Login"),
            css(r#"input[type="password"]"#),
        ],
        TargetKey::JobRowGroup => vec![
            css(r#"tr[data-testid*="job"]"#),
            css(r#"tr[data-testid*="process"]"#),
            css(r#"div[data-testid*="job"]"#),
            css(r#"div[data-testid*="process"]"#),
            css(".job-row"),
            css(".process-row"),
            css("tbody tr"),
            css(r#"[class*="job"]"#),
            css(r#"[class*="process"]"#),
        ],
        TargetKey::RowNameField => vec![
            css("td:first-child"),
            css(r#"[class*="name"]"#),
            css(r#"[class*="title"]"#),
        ],
        TargetKey::JobRow => vec![
            css_text("tr", "{job}"),
            css_text(r#"[role="row"]"#, "{job}"),
            css_text("div", "{job}"),
        ],
        TargetKey::JobActionControl => vec![
            css(r#"button[aria-label*="play" i]"#),
            css(r#"button[aria-label*="run" i]"#),
            css_text("button", "Play"),
            css_text("button", "Run"),
            css(r#"button[title*="play" i]"#),
            css(r#"button[title*="run" i]"#),
            css(r#"[class*="play"]"#),
            css(r#"[class*="run"]"#),
        ],
        TargetKey::JobActionGlobal => vec![
            Selector::next_sibling(
                Selector::css_with_text("button", "{job}"),
                r#"button[aria-label*="play" i]"#,
            )
            .into(),
            Selector::next_sibling(
                Selector::css_with_text("button", "{job}"),
                r#"button[aria-label*="run" i]"#,
            )
            .into(),
            Selector::inside(
                Selector::css_with_text("tr", "{job}"),
                Selector::css(r#"button[aria-label*="play" i]"#),
            )
            .into(),
            Selector::inside(
                Selector::css_with_text("tr", "{job}"),
                Selector::css(r#"button[aria-label*="run" i]"#),
            )
            .into(),
            Selector::inside(
                Selector::css_with_text(r#"[data-testid*="job"]"#, "{job}"),
                Selector::css_with_text("button", "Play"),
            )
            .into(),
            Selector::inside(
                Selector::css_with_text(r#"[data-testid*="job"]"#, "{job}"),
                Selector::css_with_text("button", "Run"),
            )
            .into(),
            Selector::near(r#"button[title*="play" i]"#, "{job}").into(),
            Selector::near(r#"button[title*="run" i]"#, "{job}").into(),
        ],
    }
}
