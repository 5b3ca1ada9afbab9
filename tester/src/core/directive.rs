//! Directive model: the closed set of script directives the run loop branches on.

use std::fmt;

use crate::error::DirectiveSyntaxError;

/// Kind of a script record.
///
/// `Comment`, `EmptyLine` and `Unknown` are never actionable; the run loop
/// reports them as unsupported if they reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Query,
    Skip,
    SkipIfBelowVersion,
    Error,
    VExplain,
    WaitForAuthoritative,
    RemoveFile,
    VitessOnly,
    MysqlOnly,
    Reference,
    Comment,
    EmptyLine,
    Unknown,
}

impl DirectiveKind {
    /// Script keyword for a control directive (`--<keyword> <args>`).
    pub fn from_keyword(word: &str) -> Option<Self> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "skip" => Self::Skip,
            "skip_if_below_version" => Self::SkipIfBelowVersion,
            "error" => Self::Error,
            "vexplain" => Self::VExplain,
            "wait_authoritative" => Self::WaitForAuthoritative,
            "remove_file" => Self::RemoveFile,
            "vitess_only" => Self::VitessOnly,
            "mysql_only" => Self::MysqlOnly,
            "reference" => Self::Reference,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Skip => "skip",
            Self::SkipIfBelowVersion => "skip_if_below_version",
            Self::Error => "error",
            Self::VExplain => "vexplain",
            Self::WaitForAuthoritative => "wait_authoritative",
            Self::RemoveFile => "remove_file",
            Self::VitessOnly => "vitess_only",
            Self::MysqlOnly => "mysql_only",
            Self::Reference => "reference",
            Self::Comment => "comment",
            Self::EmptyLine => "empty_line",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One script record.
///
/// `text` is the SQL for `Query` records and the argument string (directive
/// word stripped) for control directives. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub text: String,
    pub line: usize,
}

impl Directive {
    pub fn new(kind: DirectiveKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn query(text: impl Into<String>, line: usize) -> Self {
        Self::new(DirectiveKind::Query, text, line)
    }
}

/// Skip the next query unless `binary` is at least `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGate {
    pub binary: String,
    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEdge {
    Begin,
    End,
}

/// Table whose schema must become authoritative, with or without an explicit keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthoritativeTarget {
    Lookup { table: String },
    Explicit { table: String, keyspace: String },
}

/// Parse `<binary> <version>`.
pub fn parse_version_gate(text: &str) -> Result<VersionGate, DirectiveSyntaxError> {
    let directive = DirectiveKind::SkipIfBelowVersion.name();
    let [binary, version] = fields::<2>(directive, text)?;
    let version = version
        .parse::<u32>()
        .map_err(|_| DirectiveSyntaxError::Version {
            directive,
            value: version.to_string(),
            text: text.to_string(),
        })?;
    Ok(VersionGate {
        binary: binary.to_string(),
        version,
    })
}

/// Parse the single explain mode argument (`plan`, `trace`, `all`, ...).
pub fn parse_explain_mode(text: &str) -> Result<String, DirectiveSyntaxError> {
    let [mode] = fields::<1>(DirectiveKind::VExplain.name(), text)?;
    Ok(mode.to_string())
}

/// Parse `begin` / `end` for an only-scope directive of the given kind.
pub fn parse_scope_edge(
    kind: DirectiveKind,
    text: &str,
) -> Result<ScopeEdge, DirectiveSyntaxError> {
    let [edge] = fields::<1>(kind.name(), text)?;
    match edge.to_ascii_lowercase().as_str() {
        "begin" => Ok(ScopeEdge::Begin),
        "end" => Ok(ScopeEdge::End),
        _ => Err(DirectiveSyntaxError::ScopeEdge {
            directive: kind.name(),
            text: text.to_string(),
        }),
    }
}

/// Parse `<table> [<keyspace>]`.
pub fn parse_authoritative_target(text: &str) -> Result<AuthoritativeTarget, DirectiveSyntaxError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    match parts.as_slice() {
        [table] => Ok(AuthoritativeTarget::Lookup {
            table: table.to_string(),
        }),
        [table, keyspace] => Ok(AuthoritativeTarget::Explicit {
            table: table.to_string(),
            keyspace: keyspace.to_string(),
        }),
        _ => Err(DirectiveSyntaxError::ArgumentCount {
            directive: DirectiveKind::WaitForAuthoritative.name(),
            text: text.to_string(),
        }),
    }
}

fn fields<'a, const N: usize>(
    directive: &'static str,
    text: &'a str,
) -> Result<[&'a str; N], DirectiveSyntaxError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    parts
        .try_into()
        .map_err(|_| DirectiveSyntaxError::ArgumentCount {
            directive,
            text: text.to_string(),
        })
}
