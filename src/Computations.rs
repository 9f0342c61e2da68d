/// Units of measurement grouped by dimension, conversion through SI
pub mod units;
/// eng
/// Quantity kinds (m, n, M, V, Vs, c, rho, V0, P, T, R) and values of them: Datum is a value with its unit,
/// SSDatum is a Datum bound to a substance. Text form `m = 25 g` is parsed here as well.
pub mod datum;
/// eng
/// Named sets of standard conditions (STP, NTP, SATP, SWD) described by a small text table:
/// constants given directly, helper values used only while evaluating, and constants computed
/// from the others through the ideal gas law. The registry evaluates every preset once, when it is registered.
pub mod assumptions;
/// eng
/// Calculation session: known values of substances and of the environment, forward chaining over
/// m = n·M, m = ρ·V, n = c·Vs, V = n·V0, V0 = R·T/P and the coefficients of a balanced reaction.
/// Conflicting data, limiting reagent and export of the working set are handled here too.
pub mod quantity_solver;
#[allow(non_snake_case)]
pub mod quantity_solver_tests;
pub mod errors;
