mod materialize;
mod progress;
mod run;
mod source;

pub use run::run;
