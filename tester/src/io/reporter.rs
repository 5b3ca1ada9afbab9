//! Test-case reporting.

/// Sink for per-query outcomes. Rendering is left to the implementation.
pub trait Reporter {
    fn add_test_case(&mut self, query: &str, line: usize);

    fn end_test_case(&mut self);

    fn add_failure(&mut self, err: &anyhow::Error);

    fn add_info(&mut self, info: &str);

    /// Number of failures recorded so far.
    fn failure_count(&self) -> usize;

    fn report(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Script line of the test case open when the failure was recorded.
    pub line: Option<usize>,
    pub message: String,
}

/// In-memory reporter that renders a plain-text summary.
#[derive(Debug, Clone, Default)]
pub struct SummaryReporter {
    name: String,
    cases: Vec<(String, usize)>,
    current: Option<usize>,
    failures: Vec<Failure>,
    infos: Vec<String>,
}

impl SummaryReporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Queries recorded as test cases, with their script line.
    pub fn cases(&self) -> &[(String, usize)] {
        &self.cases
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn infos(&self) -> &[String] {
        &self.infos
    }
}

impl Reporter for SummaryReporter {
    fn add_test_case(&mut self, query: &str, line: usize) {
        self.cases.push((query.to_string(), line));
        self.current = Some(line);
    }

    fn end_test_case(&mut self) {
        self.current = None;
    }

    fn add_failure(&mut self, err: &anyhow::Error) {
        self.failures.push(Failure {
            line: self.current,
            message: format!("{err:#}"),
        });
    }

    fn add_info(&mut self, info: &str) {
        self.infos.push(info.to_string());
    }

    fn failure_count(&self) -> usize {
        self.failures.len()
    }

    fn report(&self) -> String {
        let mut out = format!(
            "{}: {} queries, {} failed",
            self.name,
            self.cases.len(),
            self.failures.len()
        );
        for failure in &self.failures {
            match failure.line {
                Some(line) => out.push_str(&format!("\n  line {line}: {}", failure.message)),
                None => out.push_str(&format!("\n  {}", failure.message)),
            }
        }
        for info in &self.infos {
            out.push_str(&format!("\n{info}"));
        }
        out
    }
}
