#[cfg(test)]
mod tests {
    use crate::Core::errors::ChemistryError;
    use crate::Core::formula_parser::parse;
    use crate::Core::reaction::Reaction;
    use crate::Core::substances::{Particle, Substance};
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    const FORMULAS: &[&str] = &[
        "H2", "O2", "Na", "Fe", "O3", "H2O", "NaOH", "HCl", "H2SO4", "HNO3", "H3PO4", "NaCl",
        "CaCl2", "Al2(SO4)3", "(NH4)2SO4", "NH4NO3", "Ca(OH)2", "Fe2O3", "FeO", "CuSO4", "K2Cr2O7",
        "KMnO4", "NaHCO3", "Na2CO3", "CO2", "CO", "SO2", "SO3", "NO2", "N2O5", "P2O5", "NH3", "CH4",
        "H2S", "H2O2", "Na2O2", "NaCH3COO", "Ca3(PO4)2", "Mg(NO3)2", "AgNO3", "BaSO4", "Na+",
        "Fe+3", "SO4-2", "NH4+", "OH-", "Cl-", "PO4(3-)",
    ];

    #[test]
    fn test_round_trip() {
        for text in FORMULAS {
            let first = parse(text).unwrap();
            let rendered = first.formula();
            let second = parse(&rendered).unwrap();
            assert_eq!(first, second, "{} -> {}", text, rendered);
            assert_eq!(second.formula(), rendered, "{}", text);
        }
    }

    #[test]
    fn test_molecules_are_neutral() {
        for text in FORMULAS {
            let substance = parse(text).unwrap();
            if let Substance::Molecule(m) = &substance {
                assert_eq!(m.charge(), 0, "{}", text);
                let q = m.cation().charge() * m.cation_index() as i32
                    + m.anion().charge() * m.anion_index() as i32;
                assert_eq!(q, 0, "{}", text);
            }
        }
    }

    #[test]
    fn test_molar_masses() {
        for (text, mass) in [
            ("H2O", 18.015),
            ("NaOH", 39.997),
            ("NaCl", 58.44),
            ("Ca(NO3)2", 164.086),
            ("H2SO4", 98.07),
            ("CO2", 44.009),
        ] {
            assert_relative_eq!(parse(text).unwrap().molar_mass(), mass, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_hash_follows_composition() {
        let set: HashSet<Substance> = ["NaOH", "NaHO", "H2O", "HOH"]
            .iter()
            .map(|t| Substance::parse(t).unwrap())
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serde_as_formula() {
        let substance = Substance::parse("Al2(SO4)3").unwrap();
        let json = serde_json::to_string(&substance).unwrap();
        assert_eq!(json, "\"Al2(SO4)3\"");
        let back: Substance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, substance);
        assert!(serde_json::from_str::<Substance>("\"Xq2\"").is_err());
    }

    #[test]
    fn test_balanced_reactions_conserve_elements_and_charge() {
        for text in [
            "Na + H2O -> NaOH + H2",
            "Fe + O2 -> Fe2O3",
            "KMnO4 + HCl -> KCl + MnCl2 + Cl2 + H2O",
            "Cu + HNO3 -> Cu(NO3)2 + NO + H2O",
            "Ca3(PO4)2 + H2SO4 -> CaSO4 + H3PO4",
            "Fe+3 + OH- -> Fe(OH)3",
            "NH4NO3 -> N2O + H2O",
        ] {
            let reaction = Reaction::from_text(text).unwrap();
            assert!(reaction.is_balanced(), "{}", text);
            assert!(reaction.mass_conservation_test(1e-6), "{}", text);
            let coefficients = reaction.coefficients();
            let g = coefficients.iter().fold(0, |acc, c| gcd(acc, *c));
            assert_eq!(g, 1, "{}", text);
        }
    }

    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 { a } else { gcd(b, a % b) }
    }

    #[test]
    fn test_known_coefficients() {
        let reaction = Reaction::from_text("KMnO4 + HCl -> KCl + MnCl2 + Cl2 + H2O").unwrap();
        assert_eq!(reaction.coefficients(), &[2, 16, 2, 2, 5, 8]);
        let reaction = Reaction::from_text("Cu + HNO3 -> Cu(NO3)2 + NO + H2O").unwrap();
        assert_eq!(reaction.coefficients(), &[3, 8, 3, 2, 4]);
    }

    #[test]
    fn test_balancing_is_independent_of_order() {
        let a = Reaction::from_text("Fe + O2 -> Fe2O3").unwrap();
        let b = Reaction::from_text("O2 + Fe -> Fe2O3").unwrap();
        let fe = Substance::parse("Fe").unwrap();
        let o2 = Substance::parse("O2").unwrap();
        assert_eq!(a.coefficient_of(&fe), b.coefficient_of(&fe));
        assert_eq!(a.coefficient_of(&o2), b.coefficient_of(&o2));
        assert_eq!(a.coefficients(), &[4, 3, 2]);
    }

    #[test]
    fn test_hydrogen_to_oxygen_is_unbalanceable() {
        let h2 = Substance::parse("H2").unwrap();
        let o2 = Substance::parse("O2").unwrap();
        assert!(matches!(
            Reaction::new(vec![h2], vec![o2]),
            Err(ChemistryError::Unbalanceable { .. })
        ));
    }
}
