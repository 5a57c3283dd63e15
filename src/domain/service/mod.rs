pub mod domain_pattern;

pub use domain_pattern::{DomainPattern, DomainRule};
