pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
mod map_import;
mod scenario;
