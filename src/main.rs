use ChemStoich::Examples::stoichiometry_examples::stoich_examples;
use log::error;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

pub fn main() {
    //
    let _ = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
    let task: usize = 1;
    if let Err(e) = stoich_examples(task) {
        error!("example {} failed: {}", task, e);
    }
}
