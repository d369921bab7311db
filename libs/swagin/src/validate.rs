//! Validation seam. Each application owns its validator; the default one
//! runs the rules declared with `#[derive(validator::Validate)]`.

use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::problem::Violation;

pub trait ModelValidator: Send + Sync + 'static {
    fn validate(&self, model: &dyn Validate) -> Result<(), ValidationErrors>;
}

/// Delegates to the model's own `Validate` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeriveValidator;

impl ModelValidator for DeriveValidator {
    fn validate(&self, model: &dyn Validate) -> Result<(), ValidationErrors> {
        model.validate()
    }
}

/// Flattens nested validation errors into JSON pointers, sorted by pointer.
pub fn violations(errors: &ValidationErrors) -> Vec<Violation> {
    let mut out = Vec::new();
    collect("", errors, &mut out);
    out.sort_by(|a, b| a.pointer.cmp(&b.pointer));
    out
}

fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<Violation>) {
    for (field, kind) in errors.errors() {
        let pointer = format!("{prefix}/{field}");
        match kind {
            ValidationErrorsKind::Field(list) => {
                for e in list {
                    let detail = match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("failed `{}` check", e.code),
                    };
                    out.push(Violation {
                        detail,
                        pointer: pointer.clone(),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(&pointer, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(&format!("{pointer}/{index}"), inner, out);
                }
            }
        }
    }
}
