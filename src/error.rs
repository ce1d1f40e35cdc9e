//! Typed input faults raised while coercing form fields. They are business
//! outcomes: the UI shows them and keeps the form open.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Invalid input: {field} is required.")]
    Missing { field: &'static str },
    #[error("Invalid input: {field} must be a whole number, got '{value}'.")]
    NotANumber { field: &'static str, value: String },
    #[error("Invalid input: {field} is out of range.")]
    OutOfRange { field: &'static str },
}
