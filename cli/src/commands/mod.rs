pub mod compare;
pub mod config;
pub mod run;
pub mod scalability;
pub mod validate;

pub use compare::CompareArgs;
pub use config::ConfigArgs;
pub use run::RunArgs;
pub use scalability::ScalabilityArgs;
pub use validate::ValidateArgs;

/// How a command finished when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    /// Some requested backends produced no result
    Partial,
}
