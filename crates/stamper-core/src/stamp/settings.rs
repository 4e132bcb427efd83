use serde::{Deserialize, Serialize};

/// Options of a stamping pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StamperSettings {
    /// Abort the whole stamp when an expression cannot be resolved.
    /// Checked before every other policy.
    pub fail_on_unresolved_expression: bool,

    /// Replace unresolved placeholders with nothing and consume unresolved
    /// directives without effect.
    pub leave_empty_on_expression_error: bool,

    /// Replace unresolved placeholders with
    /// [`unresolved_expressions_default_value`](Self::unresolved_expressions_default_value).
    pub replace_unresolved_expressions: bool,

    pub unresolved_expressions_default_value: Option<String>,

    /// Literal text turned into a hard line break after placeholders are
    /// resolved. Empty disables the pass.
    pub line_break_placeholder: String,

    /// Text of a paragraph inserted in place of a paragraph or doc-part
    /// repeat whose list is empty. None inserts nothing.
    pub empty_repeat_substitute: Option<String>,

    /// Drop `w:proofErr` markers before stamping so they cannot split
    /// placeholders across runs.
    pub remove_proof_errors: bool,

    /// Render `null` values as empty text instead of treating them as
    /// unresolved.
    pub replace_null_values: bool,
}

impl Default for StamperSettings {
    fn default() -> Self {
        Self {
            fail_on_unresolved_expression: true,
            leave_empty_on_expression_error: false,
            replace_unresolved_expressions: false,
            unresolved_expressions_default_value: None,
            line_break_placeholder: "\n".to_string(),
            empty_repeat_substitute: None,
            remove_proof_errors: false,
            replace_null_values: true,
        }
    }
}

impl StamperSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings that never abort: unresolved expressions stay verbatim.
    pub fn lenient() -> Self {
        Self {
            fail_on_unresolved_expression: false,
            ..Self::default()
        }
    }

    pub fn with_fail_on_unresolved(mut self, fail: bool) -> Self {
        self.fail_on_unresolved_expression = fail;
        self
    }

    pub fn with_leave_empty_on_error(mut self, leave_empty: bool) -> Self {
        self.leave_empty_on_expression_error = leave_empty;
        self
    }

    /// Enables default-value replacement of unresolved expressions.
    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.replace_unresolved_expressions = true;
        self.unresolved_expressions_default_value = Some(value.into());
        self
    }

    pub fn with_line_break_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.line_break_placeholder = placeholder.into();
        self
    }

    pub fn with_empty_repeat_substitute(mut self, text: impl Into<String>) -> Self {
        self.empty_repeat_substitute = Some(text.into());
        self
    }

    pub fn with_remove_proof_errors(mut self, remove: bool) -> Self {
        self.remove_proof_errors = remove;
        self
    }

    pub fn with_replace_null_values(mut self, replace: bool) -> Self {
        self.replace_null_values = replace;
        self
    }

    /// What to do with an expression that failed, in precedence order.
    pub fn unresolved_policy(&self) -> UnresolvedPolicy<'_> {
        if self.fail_on_unresolved_expression {
            UnresolvedPolicy::Fail
        } else if self.leave_empty_on_expression_error {
            UnresolvedPolicy::LeaveEmpty
        } else if self.replace_unresolved_expressions {
            UnresolvedPolicy::Replace(
                self.unresolved_expressions_default_value
                    .as_deref()
                    .unwrap_or(""),
            )
        } else {
            UnresolvedPolicy::Keep
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPolicy<'a> {
    Fail,
    LeaveEmpty,
    Replace(&'a str),
    Keep,
}
