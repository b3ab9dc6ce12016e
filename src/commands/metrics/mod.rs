mod distribution;
mod engine;
mod flags;
mod focus;
mod input;
mod issues;
mod run;
mod signals;
mod types;
mod week;


pub use run::run;
