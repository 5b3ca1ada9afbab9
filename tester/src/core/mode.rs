//! Mode state machine: skip/only/reference flags tracked across directives.
//!
//! Every one-shot flag is read-and-cleared by its accessor, so the run loop
//! never resets state between queries. Only-scopes persist until their `end`
//! directive and are mutually exclusive.

use std::fmt;

use crate::core::directive::VersionGate;
use crate::error::ScopeError;

/// Answers whether an installed backend binary meets a version requirement.
pub trait VersionOracle {
    fn is_binary_at_least_version(&self, version: u32, binary: &str) -> bool;
}

/// Bracketed script region where queries run against one backend only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    VitessOnly,
    MysqlOnly,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::VitessOnly => f.write_str("vitess_only"),
            Scope::MysqlOnly => f.write_str("mysql_only"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeState {
    skip_once: bool,
    version_gate: Option<VersionGate>,
    scope: Option<Scope>,
    reference: bool,
    expected_error: bool,
    pending_explain: Option<String>,
}

impl ModeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip exactly the next query.
    ///
    /// No-op inside an only-scope or while a reference capture is pending.
    pub fn skip_next(&mut self) {
        if self.scope.is_some() || self.reference {
            return;
        }
        self.skip_once = true;
    }

    /// Record a version gate for the next query. Versions are not queried here.
    pub fn skip_if_below_version(&mut self, gate: VersionGate) {
        self.version_gate = Some(gate);
    }

    /// Decide whether the next query is skipped, clearing whichever flag decided it.
    ///
    /// A pending `skip` wins and leaves the version gate for the following query.
    pub fn should_skip(&mut self, oracle: &dyn VersionOracle) -> bool {
        if std::mem::take(&mut self.skip_once) {
            return true;
        }
        match self.version_gate.take() {
            Some(gate) => !oracle.is_binary_at_least_version(gate.version, &gate.binary),
            None => false,
        }
    }

    pub fn begin_vitess_only(&mut self) -> Result<(), ScopeError> {
        self.begin(Scope::VitessOnly)
    }

    pub fn end_vitess_only(&mut self) -> Result<(), ScopeError> {
        self.end(Scope::VitessOnly)
    }

    pub fn begin_mysql_only(&mut self) -> Result<(), ScopeError> {
        self.begin(Scope::MysqlOnly)
    }

    pub fn end_mysql_only(&mut self) -> Result<(), ScopeError> {
        self.end(Scope::MysqlOnly)
    }

    fn begin(&mut self, scope: Scope) -> Result<(), ScopeError> {
        match self.scope {
            Some(open) if open == scope => Err(ScopeError::Nested(scope)),
            Some(open) => Err(ScopeError::Crossed {
                inner: scope,
                outer: open,
            }),
            None => {
                self.scope = Some(scope);
                Ok(())
            }
        }
    }

    fn end(&mut self, scope: Scope) -> Result<(), ScopeError> {
        if self.scope != Some(scope) {
            return Err(ScopeError::NotOpen(scope));
        }
        self.scope = None;
        Ok(())
    }

    /// Treat the next query's target result as the accepted baseline.
    ///
    /// Suppressed inside an only-scope or while a skip is pending.
    pub fn mark_reference(&mut self) {
        if self.scope.is_some() || self.skip_once {
            return;
        }
        self.reference = true;
    }

    pub fn should_treat_as_reference(&mut self) -> bool {
        std::mem::take(&mut self.reference)
    }

    /// The next executed query is allowed to fail.
    pub fn expect_error(&mut self) {
        self.expected_error = true;
    }

    pub fn take_expected_error(&mut self) -> bool {
        std::mem::take(&mut self.expected_error)
    }

    /// Run `vexplain <mode>` before the next executed query.
    pub fn explain_next(&mut self, mode: String) {
        self.pending_explain = Some(mode);
    }

    pub fn take_explain_mode(&mut self) -> Option<String> {
        self.pending_explain.take()
    }

    pub fn vitess_only(&self) -> bool {
        self.scope == Some(Scope::VitessOnly)
    }

    pub fn mysql_only(&self) -> bool {
        self.scope == Some(Scope::MysqlOnly)
    }

    pub fn target_in_scope(&self) -> bool {
        !self.mysql_only()
    }

    pub fn reference_in_scope(&self) -> bool {
        !self.vitess_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Installed(u32);

    impl VersionOracle for Installed {
        fn is_binary_at_least_version(&self, version: u32, _binary: &str) -> bool {
            self.0 >= version
        }
    }

    fn gate(version: u32) -> VersionGate {
        VersionGate {
            binary: "mysqld".to_string(),
            version,
        }
    }

    #[test]
    fn skip_applies_to_exactly_one_query() {
        let mut state = ModeState::new();
        state.skip_next();
        assert!(state.should_skip(&Installed(0)));
        assert!(!state.should_skip(&Installed(0)));
    }

    #[test]
    fn version_gate_skips_when_below_and_clears() {
        let mut state = ModeState::new();
        state.skip_if_below_version(gate(80000));
        assert!(state.should_skip(&Installed(57000)));
        assert!(!state.should_skip(&Installed(57000)));

        state.skip_if_below_version(gate(80000));
        assert!(!state.should_skip(&Installed(80030)));
        assert_eq!(state, ModeState::new());
    }

    #[test]
    fn pending_skip_leaves_version_gate_for_next_query() {
        let mut state = ModeState::new();
        state.skip_if_below_version(gate(80000));
        state.skip_next();
        assert!(state.should_skip(&Installed(90000)));
        // The gate is still recorded and now evaluated.
        assert!(state.should_skip(&Installed(57000)));
        assert!(!state.should_skip(&Installed(57000)));
    }

    #[test]
    fn scopes_are_mutually_exclusive() {
        let mut state = ModeState::new();
        state.begin_vitess_only().expect("begin vitess");
        assert_eq!(
            state.begin_mysql_only(),
            Err(ScopeError::Crossed {
                inner: Scope::MysqlOnly,
                outer: Scope::VitessOnly
            })
        );
        assert!(state.vitess_only());
        assert!(!state.mysql_only());
        assert!(state.target_in_scope());
        assert!(!state.reference_in_scope());
    }

    #[test]
    fn double_begin_and_unopened_end_fail_without_mutation() {
        let mut state = ModeState::new();
        assert_eq!(
            state.end_mysql_only(),
            Err(ScopeError::NotOpen(Scope::MysqlOnly))
        );
        state.begin_mysql_only().expect("begin mysql");
        assert_eq!(
            state.begin_mysql_only(),
            Err(ScopeError::Nested(Scope::MysqlOnly))
        );
        assert_eq!(
            state.end_vitess_only(),
            Err(ScopeError::NotOpen(Scope::VitessOnly))
        );
        assert!(state.mysql_only());
        state.end_mysql_only().expect("end mysql");
        assert!(!state.mysql_only());
        assert!(!state.vitess_only());
    }

    #[test]
    fn skip_is_ignored_inside_scope() {
        let mut state = ModeState::new();
        state.begin_vitess_only().expect("begin");
        state.skip_next();
        assert!(!state.should_skip(&Installed(0)));
    }

    #[test]
    fn skip_is_ignored_while_reference_pending() {
        let mut state = ModeState::new();
        state.mark_reference();
        state.skip_next();
        assert!(!state.should_skip(&Installed(0)));
        assert!(state.should_treat_as_reference());
    }

    /// A reference marker inside an only-scope is dropped silently, not rejected.
    #[test]
    fn reference_is_suppressed_inside_scope() {
        let mut state = ModeState::new();
        state.begin_mysql_only().expect("begin");
        state.mark_reference();
        assert!(!state.should_treat_as_reference());
    }

    #[test]
    fn reference_is_suppressed_while_skip_pending() {
        let mut state = ModeState::new();
        state.skip_next();
        state.mark_reference();
        assert!(!state.should_treat_as_reference());
    }

    #[test]
    fn one_shot_flags_clear_on_read() {
        let mut state = ModeState::new();
        state.mark_reference();
        state.expect_error();
        state.explain_next("plan".to_string());

        assert!(state.should_treat_as_reference());
        assert!(state.take_expected_error());
        assert_eq!(state.take_explain_mode().as_deref(), Some("plan"));
        assert_eq!(state, ModeState::new());
    }
}
