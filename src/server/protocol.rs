//! JSON bodies the HTTP front returns, other than `Prediction` itself

use serde::Serialize;

/// Static payload for the liveness route
pub const WELCOME: &str = "Welcome to the AI Prediction API!";

#[derive(Debug, Serialize)]
pub struct Welcome {
    pub message: &'static str,
}

impl Default for Welcome {
    fn default() -> Self {
        Welcome { message: WELCOME }
    }
}

/// Body of every error response: `{"errors": ["..."]}`
#[derive(Debug, Serialize)]
pub struct Errors {
    pub errors: Vec<String>,
}

impl Errors {
    pub fn one(err: impl ToString) -> Self {
        Errors {
            errors: vec![err.to_string()],
        }
    }
}
