//! netdocctl library - terminal front end for the netdoc agent

pub mod errors;
pub mod logging;
pub mod output;
pub mod repl;
pub mod session;
