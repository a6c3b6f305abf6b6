pub mod annotate;
pub mod config;
pub mod discovery;
pub mod eligibility;
pub mod links;
pub mod rewrite;
pub mod runtime;
pub mod source;
pub mod topics;
