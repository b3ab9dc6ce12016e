mod debug;
mod error;
mod orchestrator;
mod prompts;
mod response;
mod retry;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;
