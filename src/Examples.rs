/// Worked stoichiometry problems: balancing, masses through coefficients, gas volumes, limiting reagent
pub mod stoichiometry_examples;
