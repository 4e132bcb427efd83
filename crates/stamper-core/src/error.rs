use thiserror::Error;

#[derive(Error, Debug)]
pub enum StampError {
    #[error("Invalid OOXML package: {message}")]
    InvalidPackage { message: String },

    #[error("Missing required part '{part_path}' in {document_type} document")]
    MissingPart { part_path: String, document_type: String },

    #[error("XML parsing error at {location}: {message}")]
    XmlParse { message: String, location: String },

    #[error("XML serialization error: {0}")]
    XmlWrite(String),

    /// Comment anchors that cannot be paired into a well-nested range.
    #[error("Malformed comment {comment_id}: {reason}")]
    MalformedComment { comment_id: String, reason: String },

    /// An expression failed to evaluate, or no object resolver could render its value.
    #[error("Expression {expression} could not be resolved against context of type {context_type}: {reason}")]
    UnresolvedExpression {
        expression: String,
        context_type: String,
        reason: String,
    },

    /// A directive was matched but cannot act on the node it was attached to.
    #[error("Directive '{directive}' cannot be applied here: {reason}")]
    InvalidDirective { directive: String, reason: String },

    /// A node recorded during the collect phase vanished before commit.
    #[error("Structural consistency fault: {0}")]
    StructuralConsistency(String),

    #[error("Nested doc-part stamping pass failed: {source}")]
    SubPassFailure {
        #[source]
        source: Box<StampError>,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl StampError {
    pub fn sub_pass(source: StampError) -> Self {
        Self::SubPassFailure {
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, StampError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_display_formats_correctly() {
        let err = StampError::InvalidPackage {
            message: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid OOXML package: test error");
    }

    #[test]
    fn unresolved_expression_names_expression_and_context() {
        let err = StampError::UnresolvedExpression {
            expression: "${name}".to_string(),
            context_type: "object".to_string(),
            reason: "no property 'name'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Expression ${name} could not be resolved against context of type object: no property 'name'"
        );
    }

    #[test]
    fn sub_pass_failure_keeps_cause() {
        let err = StampError::sub_pass(StampError::StructuralConsistency(
            "anchor vanished".to_string(),
        ));
        let source = err.source().expect("source is attached");
        assert_eq!(
            source.to_string(),
            "Structural consistency fault: anchor vanished"
        );
    }
}
