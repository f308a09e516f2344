use shared::{Node, Store};
use crate::error::ScrapeError;

/// Anything a dotted field path can be looked up in.
pub trait Fields {
    fn field(&self, dotted: &str) -> Node;
}

impl Fields for Store {
    fn field(&self, dotted: &str) -> Node {
        self.path(dotted)
    }
}

impl Fields for Node {
    fn field(&self, dotted: &str) -> Node {
        self.path(dotted)
    }
}

/// Numeric value of a required field.
pub fn number(node: &impl Fields, field: &str) -> Result<f64, ScrapeError> {
    let text = required(node, field)?;
    text.trim().parse().map_err(|_| ScrapeError::NotANumber {
        field: field.to_string(),
        value: text.to_string(),
    })
}

/// Integer value of a required field; fractional text is rejected.
pub fn integer(node: &impl Fields, field: &str) -> Result<i64, ScrapeError> {
    let text = required(node, field)?;
    text.trim().parse().map_err(|_| ScrapeError::NotANumber {
        field: field.to_string(),
        value: text.to_string(),
    })
}

/// Non-negative integer value of a required field, for counters.
pub fn unsigned(node: &impl Fields, field: &str) -> Result<u64, ScrapeError> {
    let text = required(node, field)?;
    text.trim().parse().map_err(|_| ScrapeError::NotANumber {
        field: field.to_string(),
        value: text.to_string(),
    })
}

/// Numeric value of an optional field, `default` when absent.
pub fn number_or(node: &impl Fields, field: &str, default: f64) -> Result<f64, ScrapeError> {
    if node.field(field).is_empty() {
        return Ok(default);
    }
    number(node, field)
}

/// Text of a field, empty when absent.
pub fn text(node: &impl Fields, field: &str) -> String {
    node.field(field).as_str().unwrap_or_default().to_string()
}

fn required(node: &impl Fields, field: &str) -> Result<String, ScrapeError> {
    match node.field(field) {
        Node::Scalar(value) => Ok(value),
        Node::Store(_) => Err(ScrapeError::MissingField(field.to_string())),
    }
}

/// `numerator / denominator * 100`.
pub fn percent(numerator: f64, denominator: f64, what: &'static str) -> Result<f64, ScrapeError> {
    if denominator == 0.0 {
        return Err(ScrapeError::DivideByZero(what));
    }
    Ok(numerator / denominator * 100.0)
}
