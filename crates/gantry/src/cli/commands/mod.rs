//! CLI command implementations

mod publish;

pub use publish::PublishCommand;
