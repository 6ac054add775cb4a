//! Path-prefix scoping.

/// Decides whether a request path is handled by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ScopeMatcher {
    prefix: Option<String>,
}

impl ScopeMatcher {
    /// `None` matches every path.
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Byte-wise prefix match on the decoded path.
    pub fn matches(&self, decoded_path: &str) -> bool {
        match &self.prefix {
            Some(prefix) => decoded_path.starts_with(prefix.as_str()),
            None => true,
        }
    }
}
