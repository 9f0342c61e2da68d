use crate::Computations::assumptions::AssumptionRegistry;
use crate::Computations::datum::{Datum, QuantityKind, SSDatum};
use crate::Computations::errors::ComputationError;
use crate::Computations::quantity_solver::QuantitySolver;
use crate::Core::reaction::Reaction;
use crate::Core::substances::{Particle, Substance};
use crate::settings::CalculatorConfig;
use log::{info, warn};

pub fn stoich_examples(task: usize) -> Result<(), ComputationError> {
    //
    let registry = AssumptionRegistry::standard()?;
    match task {
        0 => {
            // PARSING AND BALANCING
            for formula in ["H2O", "Al2(SO4)3", "NH4NO3", "SO4-2", "CH3COO(-1)"] {
                let substance = Substance::parse(formula)?;
                println!(
                    "{} -> {}, M = {:.3} g/mol, class {:?}",
                    formula,
                    substance.formula(),
                    substance.molar_mass(),
                    substance.simple_class()
                );
            }
            let reactions = vec![
                "Na + H2O -> NaOH + H2",
                "KMnO4 + HCl = KCl + MnCl2 + Cl2 + H2O",
                "Cu + HNO3 -> Cu(NO3)2 + NO + H2O",
                "Fe+3 + Sn+2 -> Fe+2 + Sn+4",
            ];
            for text in reactions {
                let reaction = Reaction::from_text(text)?;
                println!("{}  ({:?})", reaction, reaction.reaction_type());
                reaction.pretty_print();
                if !reaction.mass_conservation_test(1e-6) {
                    warn!("mass is not conserved in {}", reaction);
                }
            }
        }
        1 => {
            // how much water is needed to get 25 g of NaOH and how much for 25 g of H2
            let reaction = Reaction::from_text("Na + H2O -> NaOH + H2")?;
            let water = Substance::water();
            for (product, mass) in [("NaOH", 25.0), ("H2", 25.0)] {
                let mut solver = QuantitySolver::for_reaction(reaction.clone(), &registry);
                let datum = SSDatum::new(Substance::parse(product)?, QuantityKind::Mass, mass, "g")?;
                info!("given {}", datum);
                solver.write(datum)?;
                let answer = solver.compute(&water, QuantityKind::Mass)?;
                println!("{} for {} g of {}", answer, mass, product);
            }
        }
        2 => {
            // volume of hydrogen at STP from 10 g of zinc
            let reaction = Reaction::from_text("Zn + HCl -> ZnCl2 + H2")?;
            let config = CalculatorConfig {
                default_assumptions: vec!["STP".to_string()],
                round_to: Some(3),
                ..CalculatorConfig::default()
            };
            let mut solver = QuantitySolver::for_reaction(reaction, &registry).with_config(config)?;
            let hydrogen = Substance::parse("H2")?;
            if let Err(e) = solver.compute(&hydrogen, QuantityKind::Volume) {
                println!("without data: {}", e);
            }
            solver.write(SSDatum::new(Substance::parse("Zn")?, QuantityKind::Mass, 10.0, "g")?)?;
            let volume = solver.compute_in(&hydrogen, QuantityKind::Volume, "L")?;
            println!("{}", volume);
            // same gas at room temperature
            solver.write_condition(Datum::new(QuantityKind::Temperature, 25.0, "degC")?)?;
            let volume = solver.compute_in(&hydrogen, QuantityKind::Volume, "mL")?;
            println!("at 25 degC: {}", volume);
            solver.pretty_print();
        }
        3 => {
            // limiting reagent: 4 g of H2 and 16 g of O2
            let reaction = Reaction::from_text("H2 + O2 -> H2O")?;
            let mut solver = QuantitySolver::for_reaction(reaction, &registry);
            solver.write(SSDatum::new(Substance::parse("H2")?, QuantityKind::Mass, 4.0, "g")?)?;
            solver.write(SSDatum::new(Substance::parse("O2")?, QuantityKind::Mass, 16.0, "g")?)?;
            let limiting = solver.limiting_reagent()?;
            println!(
                "limiting reagent {}, extent {:.4} mol",
                limiting.substance, limiting.extent
            );
            let water = Substance::water();
            let n = solver.derive_moles_of(&water, &limiting.substance)?;
            println!("{}", n);
            let m = solver.compute(&water, QuantityKind::Mass)?;
            println!("{}", m);
            println!("{}", solver.to_json()?);
        }
        4 => {
            // solution: 250 mL of 0.2 M NaOH neutralized by H2SO4
            let reaction = Reaction::from_text("NaOH + H2SO4 -> Na2SO4 + H2O")?;
            let mut solver = QuantitySolver::for_reaction(reaction, &registry);
            let naoh = Substance::parse("NaOH")?;
            solver.write(SSDatum::new(naoh.clone(), QuantityKind::Concentration, 0.2, "M")?)?;
            solver.write(SSDatum::new(naoh, QuantityKind::SolutionVolume, 250.0, "mL")?)?;
            let acid = solver.compute(&Substance::parse("H2SO4")?, QuantityKind::Mass)?;
            println!("{}", acid);
        }
        _ => {
            println!("no example with number {}", task);
        }
    }
    Ok(())
}
