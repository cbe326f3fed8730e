/// Human-readable names for observed units.
///
/// Parameterized tests share one declared name across invocations. When the
/// runner's unique id carries an invocation index, e.g.
/// `[engine:junit-jupiter]/[class:Foo]/[test-template:bar(int)]/[test-template-invocation:#3]`,
/// the label becomes `bar[#3]`.
use regex::Regex;
use std::sync::LazyLock;

/// Matches the invocation segment of a unique id.
static INVOCATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[test-template-invocation:#([0-9]+)]").unwrap());

/// Label used when a unit declares no name at all.
const UNNAMED: &str = "unnamed";

/// What the host harness tells us about the unit it is about to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitContext {
    /// Declared name of the test or command.
    pub name: String,
    /// Structured identifier, `/`-separated segments.
    pub unique_id: Option<String>,
}

impl UnitContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_id: None,
        }
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Label for log lines; see [`derive`].
    pub fn label(&self) -> String {
        derive(&self.name, self.unique_id.as_deref())
    }
}

/// Build a label from a declared name and an optional unique id.
///
/// The invocation index is looked up in the fourth `/`-separated segment
/// only; anything else leaves the name unchanged.
pub fn derive(name: &str, unique_id: Option<&str>) -> String {
    let name = if name.trim().is_empty() { UNNAMED } else { name };
    match unique_id.and_then(invocation_index) {
        Some(index) => format!("{name}[#{index}]"),
        None => name.to_string(),
    }
}

fn invocation_index(unique_id: &str) -> Option<u64> {
    let segment = unique_id.split('/').nth(3)?;
    let caps = INVOCATION_PATTERN.captures(segment)?;
    caps.get(1)?.as_str().parse().ok()
}
