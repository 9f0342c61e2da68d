/// eng
/// Chemical elements and polyatomic ions: built-in database with atomic masses, oxidation states and metal flags,
/// loadable from JSON as well. Lookup goes through the ElementDatabase trait.
pub mod periodic_table;
/// Atomic composition of a particle (element counts + net charge) with merging, scaling and molar mass
pub mod composition;
/// eng
/// Substances: Simple (one element, e.g. H2, Na), Ion (charged composition, e.g. SO4(-2)) and Molecule
/// (cation + anion in the minimal charge-balancing ratio, e.g. Al2(SO4)3). Shared behaviour is the Particle trait,
/// dispatched over the Substance enum. Special substances (water, proton, hydroxide, oxide) and school
/// classification (metal/nonmetal, acid/base/oxide/salt) are here too.
pub mod substances;
/// eng
/// Formula text into a Substance: tokenizes atoms and bracket groups, reads charge suffixes and phase marks
/// and splits neutral formulas into a charge-balanced cation and anion using oxidation states and the
/// polyatomic ion table.
pub mod formula_parser;
/// eng
/// Balancing of reaction equations: element-composition matrix and its exact integer null space.
/// No solution or more than one independent solution are reported as errors.
pub mod balancer;
/// Balanced reaction: parsing of reaction text, scheme/equation rendering, reaction type, conservation checks
pub mod reaction;
pub mod errors;
#[allow(non_snake_case)]
pub mod substances_tests;
