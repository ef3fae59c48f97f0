mod matcher;
pub mod runner;

pub use runner::run_scenario;
pub use scenarios::load_scenarios_from_json;
