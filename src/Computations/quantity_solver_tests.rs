#[cfg(test)]
mod tests {
    use crate::Computations::assumptions::AssumptionRegistry;
    use crate::Computations::datum::{Datum, QuantityKind, SSDatum};
    use crate::Computations::errors::ComputationError;
    use crate::Computations::quantity_solver::QuantitySolver;
    use crate::Core::reaction::Reaction;
    use crate::Core::substances::{Particle, Phase, Substance};
    use crate::settings::CalculatorConfig;
    use approx::assert_relative_eq;

    const STP_MOLAR_VOLUME: f64 = 22.413969;

    fn s(formula: &str) -> Substance {
        Substance::parse(formula).unwrap()
    }

    fn sodium_and_water() -> Reaction {
        Reaction::from_text("Na + H2O -> NaOH + H2").unwrap()
    }

    #[test]
    fn test_moles_from_mass() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Mass, 46.0, "g").unwrap())
            .unwrap();
        let n = solver.compute(&s("Na"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), 2.0, epsilon = 1e-2);
        assert_eq!(n.unit().symbol, "mol");
        assert_eq!(n.coefficient(), Some(2));
    }

    #[test]
    fn test_moles_through_coefficients() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Moles, 2.0, "mol").unwrap())
            .unwrap();
        let n = solver.compute(&s("H2"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), 1.0, epsilon = 1e-9);
        let naoh = solver.compute(&s("NaOH"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(naoh.value(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_water_needed() {
        let registry = AssumptionRegistry::standard().unwrap();
        let water = Substance::water();

        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("NaOH"), QuantityKind::Mass, 25.0, "g").unwrap())
            .unwrap();
        let m = solver.compute(&water, QuantityKind::Mass).unwrap();
        let expected = 25.0 / s("NaOH").molar_mass() * water.molar_mass();
        assert_relative_eq!(m.value(), expected, epsilon = 1e-9);
        assert_relative_eq!(m.value(), 11.26, epsilon = 1e-2);

        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("H2"), QuantityKind::Mass, 25.0, "g").unwrap())
            .unwrap();
        let m = solver.compute_in(&water, QuantityKind::Mass, "kg").unwrap();
        let expected = 25.0 / s("H2").molar_mass() * 2.0 * water.molar_mass() / 1000.0;
        assert_relative_eq!(m.value(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_gas_volume_at_stp() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver.assume("STP").unwrap();

        match solver.compute(&s("H2"), QuantityKind::Volume) {
            Err(ComputationError::InsufficientData { target, unknown }) => {
                assert_eq!(target, "V(H2)");
                assert!(unknown.contains(&"n(H2)".to_string()));
            }
            other => panic!("expected missing data, got {:?}", other),
        }

        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Moles, 2.0, "mol").unwrap())
            .unwrap();
        let v = solver.compute(&s("H2"), QuantityKind::Volume).unwrap();
        assert_eq!(v.unit().symbol, "L");
        assert_relative_eq!(v.value(), STP_MOLAR_VOLUME, epsilon = 1e-4);
    }

    #[test]
    fn test_liquid_has_no_molar_volume_relation() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver.assume("STP").unwrap();
        solver
            .write(SSDatum::new(s("H2O"), QuantityKind::Moles, 1.0, "mol").unwrap())
            .unwrap();
        assert!(matches!(
            solver.compute(&s("H2O"), QuantityKind::Volume),
            Err(ComputationError::InsufficientData { .. })
        ));

        // water vapour
        solver.set_phase(&s("H2O"), Phase::Gas).unwrap();
        let v = solver.compute(&s("H2O"), QuantityKind::Volume).unwrap();
        assert_relative_eq!(v.value(), STP_MOLAR_VOLUME, epsilon = 1e-4);
    }

    #[test]
    fn test_water_density_preset() {
        let registry = AssumptionRegistry::standard().unwrap();
        let config = CalculatorConfig {
            default_assumptions: vec!["SWD".to_string()],
            ..CalculatorConfig::default()
        };
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry)
            .with_config(config)
            .unwrap();
        assert_eq!(solver.active_assumptions(), &["SWD".to_string()]);
        solver
            .write(SSDatum::new(s("H2O"), QuantityKind::Mass, 18.0, "g").unwrap())
            .unwrap();
        let v = solver.compute_in(&s("H2O"), QuantityKind::Volume, "mL").unwrap();
        assert_relative_eq!(v.value(), 18.0, epsilon = 1e-9);

        // a measured density replaces the preset one
        solver
            .write(SSDatum::new(s("H2O"), QuantityKind::Density, 0.9, "g/mL").unwrap())
            .unwrap();
        let v = solver.compute_in(&s("H2O"), QuantityKind::Volume, "mL").unwrap();
        assert_relative_eq!(v.value(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_conflicting_data() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Mass, 46.0, "g").unwrap())
            .unwrap();
        // same value in other units is not a conflict
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Mass, 0.046, "kg").unwrap())
            .unwrap();
        match solver.write(SSDatum::new(s("Na"), QuantityKind::Mass, 50.0, "g").unwrap()) {
            Err(ComputationError::ConflictingDatum { key, known, written }) => {
                assert_eq!(key, "m(Na)");
                assert_relative_eq!(known, 46.0, epsilon = 1e-9);
                assert_relative_eq!(written, 50.0);
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
        // molar mass is a property of the substance
        assert!(matches!(
            solver.write(SSDatum::new(s("Na"), QuantityKind::MolarMass, 40.0, "g/mol").unwrap()),
            Err(ComputationError::ConflictingDatum { .. })
        ));

        solver
            .overwrite(SSDatum::new(s("Na"), QuantityKind::Mass, 23.0, "g").unwrap())
            .unwrap();
        let n = solver.compute(&s("Na"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_derived_values_follow_new_data() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Moles, 2.0, "mol").unwrap())
            .unwrap();
        assert_relative_eq!(
            solver.compute(&s("H2"), QuantityKind::Moles).unwrap().value(),
            1.0,
            epsilon = 1e-9
        );
        solver.erase(&s("Na"), QuantityKind::Moles).unwrap();
        assert!(!solver.has_value(&s("H2"), QuantityKind::Moles));
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Moles, 4.0, "mol").unwrap())
            .unwrap();
        assert_relative_eq!(
            solver.compute(&s("H2"), QuantityKind::Moles).unwrap().value(),
            2.0,
            epsilon = 1e-9
        );
        assert!(matches!(
            solver.erase(&s("NaOH"), QuantityKind::Mass),
            Err(ComputationError::ValueNotFound(_))
        ));
    }

    #[test]
    fn test_conditions() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::new(&registry);
        assert!(matches!(
            solver.compute_condition(QuantityKind::MolarVolume),
            Err(ComputationError::InsufficientData { .. })
        ));
        solver.assume("STP").unwrap();
        let v0 = solver.compute_condition(QuantityKind::MolarVolume).unwrap();
        assert_relative_eq!(v0.value(), STP_MOLAR_VOLUME, epsilon = 1e-4);

        // a written temperature invalidates the preset molar volume
        solver
            .write_condition(Datum::new(QuantityKind::Temperature, 25.0, "degC").unwrap())
            .unwrap();
        let v0 = solver.compute_condition(QuantityKind::MolarVolume).unwrap();
        assert_relative_eq!(v0.value(), 24.4654, epsilon = 1e-3);
        let t = solver.read_condition(QuantityKind::Temperature).unwrap();
        assert_eq!(t.unit().symbol, "degC");

        assert!(matches!(
            solver.write_condition(Datum::new(QuantityKind::Mass, 1.0, "g").unwrap()),
            Err(ComputationError::UnknownVariable(_))
        ));
        assert!(matches!(
            solver.assume("VENUS"),
            Err(ComputationError::UnknownAssumption(_))
        ));
    }

    #[test]
    fn test_pressure_from_volume() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::new(&registry);
        solver
            .write(SSDatum::new(s("CO2"), QuantityKind::Moles, 1.0, "mol").unwrap())
            .unwrap();
        solver
            .write(SSDatum::new(s("CO2"), QuantityKind::Volume, 22.414, "L").unwrap())
            .unwrap();
        solver
            .write_condition(Datum::new(QuantityKind::Temperature, 273.15, "K").unwrap())
            .unwrap();
        let p = solver.compute_condition(QuantityKind::Pressure).unwrap();
        assert_relative_eq!(p.value(), 101325.0, max_relative = 1e-3);
    }

    #[test]
    fn test_derived_density_keeps_molar_volume() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::new(&registry);
        let co2 = s("CO2");
        solver
            .write(SSDatum::new(co2.clone(), QuantityKind::Moles, 1.0, "mol").unwrap())
            .unwrap();
        solver
            .write(SSDatum::new(co2.clone(), QuantityKind::Volume, 22.414, "L").unwrap())
            .unwrap();
        solver
            .write_condition(Datum::new(QuantityKind::Temperature, 273.15, "K").unwrap())
            .unwrap();
        let rho = solver.compute_in(&co2, QuantityKind::Density, "g/L").unwrap();
        assert_relative_eq!(rho.value(), co2.molar_mass() / 22.414, epsilon = 1e-9);
        let p = solver.compute_condition(QuantityKind::Pressure).unwrap();
        assert_relative_eq!(p.value(), 101325.0, max_relative = 1e-3);
        let v0 = solver.compute_condition(QuantityKind::MolarVolume).unwrap();
        assert_relative_eq!(v0.value(), 22.414, epsilon = 1e-9);
    }

    #[test]
    fn test_written_density_replaces_molar_volume() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::new(&registry);
        solver.assume("STP").unwrap();
        let co2 = s("CO2");
        solver
            .write(SSDatum::new(co2.clone(), QuantityKind::Mass, 44.0, "g").unwrap())
            .unwrap();
        solver
            .write(SSDatum::new(co2.clone(), QuantityKind::Density, 2.0, "g/L").unwrap())
            .unwrap();
        let v = solver.compute(&co2, QuantityKind::Volume).unwrap();
        assert_relative_eq!(v.value(), 22.0, epsilon = 1e-9);
    }

    #[test]
    fn test_solution_concentration() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::new(&registry);
        let hcl = s("HCl");
        solver
            .write(SSDatum::new(hcl.clone(), QuantityKind::Concentration, 0.5, "mol/L").unwrap())
            .unwrap();
        solver
            .write(SSDatum::new(hcl.clone(), QuantityKind::SolutionVolume, 200.0, "mL").unwrap())
            .unwrap();
        let n = solver.compute(&hcl, QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), 0.1, epsilon = 1e-9);
        let m = solver.compute(&hcl, QuantityKind::Mass).unwrap();
        assert_relative_eq!(m.value(), 0.1 * hcl.molar_mass(), epsilon = 1e-9);
        assert_eq!(solver.substances(), vec![&hcl]);
    }

    #[test]
    fn test_answers_do_not_depend_on_history() {
        let registry = AssumptionRegistry::standard().unwrap();
        let sodium = || SSDatum::new(s("Na"), QuantityKind::Mass, 46.0, "g").unwrap();
        let hydrogen = || SSDatum::new(s("H2"), QuantityKind::Moles, 3.0, "mol").unwrap();

        let mut plain = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        plain.write(sodium()).unwrap();
        plain.write(hydrogen()).unwrap();
        let expected = plain.compute(&s("NaOH"), QuantityKind::Moles).unwrap();

        let mut swapped = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        swapped.write(hydrogen()).unwrap();
        swapped.write(sodium()).unwrap();
        let n = swapped.compute(&s("NaOH"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), expected.value(), epsilon = 1e-12);

        // n(H2) = 1 mol is derived here and must not block the written 3 mol
        let mut computed = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        computed.write(sodium()).unwrap();
        let derived = computed.compute(&s("H2"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(derived.value(), 1.0, epsilon = 1e-2);
        computed.write(hydrogen()).unwrap();
        let n = computed.compute(&s("NaOH"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), expected.value(), epsilon = 1e-12);
        let h2 = computed.read(&s("H2"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(h2.value(), 3.0, epsilon = 1e-12);

        // written values still conflict with each other
        assert!(matches!(
            computed.write(SSDatum::new(s("H2"), QuantityKind::Moles, 2.0, "mol").unwrap()),
            Err(ComputationError::ConflictingDatum { .. })
        ));
    }

    #[test]
    fn test_unknown_substance() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        assert!(matches!(
            solver.write(SSDatum::new(s("KOH"), QuantityKind::Mass, 1.0, "g").unwrap()),
            Err(ComputationError::UnknownSubstance(_))
        ));
        assert!(matches!(
            solver.compute(&s("KOH"), QuantityKind::Mass),
            Err(ComputationError::UnknownSubstance(_))
        ));
        assert!(matches!(
            solver.read(&s("Na"), QuantityKind::Mass),
            Err(ComputationError::ValueNotFound(_))
        ));
        assert!(matches!(
            solver.compute(&s("Na"), QuantityKind::Temperature),
            Err(ComputationError::UnknownVariable(_))
        ));
        assert!(matches!(
            solver.compute_in(&s("Na"), QuantityKind::Mass, "L"),
            Err(ComputationError::IncompatibleUnits { .. })
        ));
    }

    #[test]
    fn test_limiting_reagent() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Moles, 2.0, "mol").unwrap())
            .unwrap();
        solver
            .write(SSDatum::new(s("H2O"), QuantityKind::Mass, 90.0, "g").unwrap())
            .unwrap();
        let limiting = solver.limiting_reagent().unwrap();
        assert_eq!(limiting.substance, s("Na"));
        assert_relative_eq!(limiting.extent, 1.0, epsilon = 1e-9);
        assert_relative_eq!(limiting.moles.value(), 2.0, epsilon = 1e-9);

        let empty = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        assert!(matches!(
            empty.limiting_reagent(),
            Err(ComputationError::InsufficientData { .. })
        ));
        let free = QuantitySolver::new(&registry);
        assert!(matches!(
            free.limiting_reagent(),
            Err(ComputationError::NoReaction(_))
        ));
    }

    #[test]
    fn test_derive_moles_of() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Moles, 2.0, "mol").unwrap())
            .unwrap();
        let n = solver.derive_moles_of(&s("H2"), &s("Na")).unwrap();
        assert_relative_eq!(n.value(), 1.0, epsilon = 1e-9);
        assert_eq!(n.coefficient(), Some(1));

        solver
            .write(SSDatum::new(s("NaOH"), QuantityKind::Moles, 3.0, "mol").unwrap())
            .unwrap();
        assert!(matches!(
            solver.derive_moles_of(&s("NaOH"), &s("Na")),
            Err(ComputationError::ConflictingDatum { .. })
        ));
        assert!(matches!(
            solver.derive_moles_of(&s("KOH"), &s("Na")),
            Err(ComputationError::UnknownSubstance(_))
        ));
    }

    #[test]
    fn test_scale_and_clear() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Mass, 23.0, "g").unwrap())
            .unwrap();
        let scaled = solver.scale(&s("Na"), QuantityKind::Mass, 2.0).unwrap();
        assert_relative_eq!(scaled.value(), 46.0, epsilon = 1e-9);
        let n = solver.compute(&s("Na"), QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), 2.0, epsilon = 1e-2);

        solver.clear();
        assert!(!solver.has_value(&s("Na"), QuantityKind::Mass));
        assert!(!solver.has_value(&s("Na"), QuantityKind::Moles));
        assert!(solver.has_value(&s("Na"), QuantityKind::MolarMass));
        let m = solver.read(&s("Na"), QuantityKind::MolarMass).unwrap();
        assert_relative_eq!(m.value(), s("Na").molar_mass(), epsilon = 1e-9);
    }

    #[test]
    fn test_add_sub_div() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        let na = s("Na");
        assert!(matches!(
            solver.add(&na, QuantityKind::Mass, 1.0, false),
            Err(ComputationError::ValueNotFound(_))
        ));
        solver
            .write(SSDatum::new(na.clone(), QuantityKind::Mass, 23.0, "g").unwrap())
            .unwrap();
        let m = solver.add(&na, QuantityKind::Mass, 23.0, false).unwrap();
        assert_relative_eq!(m.value(), 46.0, epsilon = 1e-9);
        assert_eq!(m.unit().symbol, "g");
        assert_eq!(m.coefficient(), Some(2));
        let n = solver.compute(&na, QuantityKind::Moles).unwrap();
        assert_relative_eq!(n.value(), 2.0, epsilon = 1e-2);

        let m = solver.div(&na, QuantityKind::Mass, 2.0).unwrap();
        assert_relative_eq!(m.value(), 23.0, epsilon = 1e-9);
        assert!(matches!(
            solver.div(&na, QuantityKind::Mass, 0.0),
            Err(ComputationError::NonFiniteValue { .. })
        ));

        assert!(matches!(
            solver.sub(&na, QuantityKind::Mass, 50.0, false),
            Err(ComputationError::NegativeValue { .. })
        ));
        // failed operations leave the stored value alone
        let m = solver.read(&na, QuantityKind::Mass).unwrap();
        assert_relative_eq!(m.value(), 23.0, epsilon = 1e-9);

        let m = solver.sub(&na, QuantityKind::Mass, 50.0, true).unwrap();
        assert_relative_eq!(m.value(), -27.0, epsilon = 1e-9);
        let m = solver.read(&na, QuantityKind::Mass).unwrap();
        assert_relative_eq!(m.value(), -27.0, epsilon = 1e-9);
    }

    #[test]
    fn test_read_is_rounded() {
        let registry = AssumptionRegistry::standard().unwrap();
        let config = CalculatorConfig {
            round_to: Some(1),
            ..CalculatorConfig::default()
        };
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry)
            .with_config(config)
            .unwrap();
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Mass, 22.98, "g").unwrap())
            .unwrap();
        let m = solver.read(&s("Na"), QuantityKind::Mass).unwrap();
        assert_relative_eq!(m.value(), 23.0, epsilon = 1e-12);
        // the stored value stays exact
        let m = solver.scale(&s("Na"), QuantityKind::Mass, 1.0).unwrap();
        assert_relative_eq!(m.value(), 22.98, epsilon = 1e-12);
    }

    #[test]
    fn test_rounded_answers() {
        let registry = AssumptionRegistry::standard().unwrap();
        let config = CalculatorConfig {
            round_to: Some(2),
            ..CalculatorConfig::default()
        };
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry)
            .with_config(config)
            .unwrap();
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Mass, 46.0, "g").unwrap())
            .unwrap();
        let n = solver.compute(&s("Na"), QuantityKind::Moles).unwrap();
        assert_eq!(n.value(), 2.0);
    }

    #[test]
    fn test_json_export() {
        let registry = AssumptionRegistry::standard().unwrap();
        let mut solver = QuantitySolver::for_reaction(sodium_and_water(), &registry);
        solver
            .write(SSDatum::new(s("Na"), QuantityKind::Mass, 46.0, "g").unwrap())
            .unwrap();
        solver.compute(&s("H2"), QuantityKind::Moles).unwrap();
        let json: serde_json::Value = serde_json::from_str(&solver.to_json().unwrap()).unwrap();
        let records = json.as_array().unwrap();
        let mass = records
            .iter()
            .find(|r| r["owner"] == "Na" && r["variable"] == "m")
            .unwrap();
        assert_eq!(mass["origin"], "Given");
        assert_eq!(mass["unit"], "g");
        assert_relative_eq!(mass["value"].as_f64().unwrap(), 46.0, epsilon = 1e-9);
        let h2 = records
            .iter()
            .find(|r| r["owner"] == "H2" && r["variable"] == "n")
            .unwrap();
        assert_eq!(h2["origin"], "Derived");
        assert!(records.iter().any(|r| r["origin"] == "Intrinsic"));
    }
}
