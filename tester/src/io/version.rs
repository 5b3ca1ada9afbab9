//! Version oracle backed by `<binary> --version`.

use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::warn;

use crate::core::mode::VersionOracle;
use crate::io::process::run_with_timeout;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("valid version regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BinaryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl BinaryVersion {
    /// Extract the first `major.minor[.patch]` from `--version` output.
    pub fn parse(output: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(output)?;
        let number = |idx: usize| {
            caps.get(idx)
                .map_or(Some(0), |m| m.as_str().parse::<u32>().ok())
        };
        Some(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
        })
    }

    /// Thresholds of 10000 and above use MySQL's `MMmmpp` encoding (80034 is
    /// 8.0.34); smaller thresholds are major versions (`vtgate 19`).
    pub fn satisfies(&self, required: u32) -> bool {
        if required >= 10_000 {
            let encoded = u64::from(self.major) * 10_000
                + u64::from(self.minor) * 100
                + u64::from(self.patch);
            encoded >= u64::from(required)
        } else {
            self.major >= required
        }
    }
}

pub struct CommandVersionOracle {
    timeout: Duration,
}

impl CommandVersionOracle {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn installed_version(&self, binary: &str) -> Result<BinaryVersion> {
        let mut cmd = Command::new(binary);
        cmd.arg("--version");
        let output = run_with_timeout(cmd, self.timeout, 64 * 1024)
            .with_context(|| format!("run {binary} --version"))?;
        if !output.status.success() {
            bail!("{binary} --version: {}", output.failure_message());
        }
        let text = output.stdout_text();
        BinaryVersion::parse(&text)
            .with_context(|| format!("no version in {binary} --version output: {text:?}"))
    }
}

impl VersionOracle for CommandVersionOracle {
    /// An unknown version counts as not satisfying the requirement.
    fn is_binary_at_least_version(&self, version: u32, binary: &str) -> bool {
        match self.installed_version(binary) {
            Ok(installed) => installed.satisfies(version),
            Err(err) => {
                warn!(binary, err = %format!("{err:#}"), "cannot determine binary version");
                false
            }
        }
    }
}
