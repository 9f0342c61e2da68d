//! Stoichiometric quantity solver.
//!
//! A solver session keeps a working set of known values keyed by (owner, quantity), where the
//! owner is either one of the participating substances or the environment (T, P, V0, R).
//! Unknown values are found by forward chaining over a fixed set of relations, each of them a
//! monomial `target = k · Π factorᵉ` that can be solved for any single unknown term:
//!
//! | relation | applies to |
//! |----------|------------|
//! | m = n·M | every substance |
//! | m = ρ·V | every substance |
//! | n = c·Vs | every substance (solutions) |
//! | V = n·V0 | gases without a known density |
//! | n_B = (ν_B/ν_A)·n_A | every pair of reaction participants |
//! | V0 = R·T/P | environment |
//!
//! Each pass fires every relation with exactly one unknown term; chaining stops as soon as the
//! requested value is known or a whole pass adds nothing. Molar masses are seeded from the
//! substances, environment constants come from activated assumptions.
use crate::Computations::assumptions::{AssumptionRegistry, GAS_CONSTANT};
use crate::Computations::datum::{Datum, QuantityKind, SSDatum};
use crate::Computations::errors::ComputationError;
use crate::Computations::units::Unit;
use crate::Core::reaction::Reaction;
use crate::Core::substances::{Particle, Phase, Substance};
use crate::settings::CalculatorConfig;
use approx::relative_eq;
use indexmap::IndexMap;
use log::{debug, info};
use prettytable::{Cell, Row, Table};
use serde::Serialize;

/// Per-substance quantities.
const SUBSTANCE_KINDS: [QuantityKind; 7] = [
    QuantityKind::Mass,
    QuantityKind::Moles,
    QuantityKind::MolarMass,
    QuantityKind::Volume,
    QuantityKind::SolutionVolume,
    QuantityKind::Concentration,
    QuantityKind::Density,
];

const ENVIRONMENT_KINDS: [QuantityKind; 4] = [
    QuantityKind::MolarVolume,
    QuantityKind::Pressure,
    QuantityKind::Temperature,
    QuantityKind::GasConstant,
];

/// Name of the water density constant in assumption presets.
const WATER_DENSITY: &str = "rho_w";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Owner {
    Substance(usize),
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    owner: Owner,
    kind: QuantityKind,
}

impl Key {
    fn of(index: usize, kind: QuantityKind) -> Self {
        Key {
            owner: Owner::Substance(index),
            kind,
        }
    }

    fn env(kind: QuantityKind) -> Self {
        Key {
            owner: Owner::Environment,
            kind,
        }
    }
}

/// Where a value in the working set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    /// written by the caller
    Given,
    /// found by the solver
    Derived,
    /// taken from an assumption preset
    Assumed,
    /// property of the substance itself (molar mass) or a universal constant
    Intrinsic,
}

#[derive(Debug, Clone)]
struct Entry {
    si: f64,
    unit: Unit,
    origin: Origin,
}

#[derive(Debug, Clone)]
struct Participant {
    substance: Substance,
    coefficient: Option<u32>,
    phase: Option<Phase>,
}

#[derive(Debug, Clone, Copy)]
enum Guard {
    Always,
    GasWithoutDensity(usize),
}

#[derive(Debug, Clone)]
struct Relation {
    target: Key,
    coefficient: f64,
    factors: Vec<(Key, i32)>,
    guard: Guard,
}

impl Relation {
    fn new(target: Key, coefficient: f64, factors: Vec<(Key, i32)>, guard: Guard) -> Self {
        Self {
            target,
            coefficient,
            factors,
            guard,
        }
    }

    /// Value of the single unknown term, if exactly one term is unknown.
    fn fire(&self, values: &IndexMap<Key, Entry>) -> Option<(Key, f64)> {
        let known = |key: &Key| values.get(key).map(|e| e.si);
        let unknown: Vec<usize> = (0..self.factors.len())
            .filter(|&i| known(&self.factors[i].0).is_none())
            .collect();
        let product_except = |skip: Option<usize>| -> f64 {
            self.factors
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .map(|(_, (key, e))| known(key).unwrap_or(f64::NAN).powi(*e))
                .product::<f64>()
                * self.coefficient
        };
        let (key, value) = match (known(&self.target), unknown.as_slice()) {
            (None, []) => (self.target, product_except(None)),
            (Some(target), [i]) => {
                let (key, e) = self.factors[*i];
                let rest = product_except(Some(*i));
                if rest == 0.0 {
                    return None;
                }
                (key, (target / rest).powf(1.0 / e as f64))
            }
            _ => return None,
        };
        (value.is_finite() && value >= 0.0).then_some((key, value))
    }
}

/// Reagent that runs out first.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitingReagent {
    pub substance: Substance,
    pub moles: SSDatum,
    /// extent of reaction, mol: n / ν of the limiting reagent
    pub extent: f64,
}

#[derive(Debug, Serialize)]
struct QuantityRecord {
    owner: String,
    variable: String,
    value: f64,
    unit: String,
    origin: Origin,
}

/// One calculation session over a set of substances, optionally bound to a reaction.
#[derive(Debug, Clone)]
pub struct QuantitySolver<'a> {
    registry: &'a AssumptionRegistry,
    config: CalculatorConfig,
    reaction: Option<Reaction>,
    participants: Vec<Participant>,
    values: IndexMap<Key, Entry>,
    water_density: Option<f64>,
    active_assumptions: Vec<String>,
}

impl<'a> QuantitySolver<'a> {
    /// Session without a reaction; substances join when data about them is written.
    pub fn new(registry: &'a AssumptionRegistry) -> Self {
        let mut values = IndexMap::new();
        values.insert(
            Key::env(QuantityKind::GasConstant),
            Entry {
                si: GAS_CONSTANT,
                unit: QuantityKind::GasConstant.default_unit(),
                origin: Origin::Intrinsic,
            },
        );
        Self {
            registry,
            config: CalculatorConfig::default(),
            reaction: None,
            participants: Vec::new(),
            values,
            water_density: None,
            active_assumptions: Vec::new(),
        }
    }

    /// Session over the participants of a balanced reaction.
    pub fn for_reaction(reaction: Reaction, registry: &'a AssumptionRegistry) -> Self {
        let mut solver = Self::new(registry);
        let substances: Vec<(Substance, u32, Option<Phase>)> = reaction
            .substances()
            .into_iter()
            .zip(reaction.coefficients())
            .map(|(s, c)| (s.clone(), *c, reaction.phase_of(s)))
            .collect();
        for (substance, coefficient, phase) in substances {
            solver.push_participant(substance, Some(coefficient), phase);
        }
        info!("solver session for {}", reaction.equation());
        solver.reaction = Some(reaction);
        solver
    }

    /// Applies a configuration and activates its default assumptions.
    pub fn with_config(mut self, config: CalculatorConfig) -> Result<Self, ComputationError> {
        let defaults = config.default_assumptions.clone();
        self.config = config;
        for symbol in &defaults {
            self.assume(symbol)?;
        }
        Ok(self)
    }

    pub fn reaction(&self) -> Option<&Reaction> {
        self.reaction.as_ref()
    }

    pub fn substances(&self) -> Vec<&Substance> {
        self.participants.iter().map(|p| &p.substance).collect()
    }

    pub fn active_assumptions(&self) -> &[String] {
        &self.active_assumptions
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    //////////////////////////////////////////////////////////////////////////////
    // participants
    //////////////////////////////////////////////////////////////////////////////

    fn push_participant(
        &mut self,
        substance: Substance,
        coefficient: Option<u32>,
        phase: Option<Phase>,
    ) -> usize {
        let index = self.participants.len();
        self.values.insert(
            Key::of(index, QuantityKind::MolarMass),
            Entry {
                si: substance.molar_mass() * 1e-3,
                unit: QuantityKind::MolarMass.default_unit(),
                origin: Origin::Intrinsic,
            },
        );
        if let Some(rho) = self.water_density {
            if substance.is_water() {
                self.set_assumed(Key::of(index, QuantityKind::Density), rho);
            }
        }
        self.participants.push(Participant {
            substance,
            coefficient,
            phase,
        });
        index
    }

    fn index_of(&self, substance: &Substance) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.substance == *substance)
    }

    fn require(&self, substance: &Substance) -> Result<usize, ComputationError> {
        self.index_of(substance)
            .ok_or_else(|| ComputationError::UnknownSubstance(substance.formula()))
    }

    /// Adds a substance to a session without a reaction; returns its position.
    pub fn add_substance(&mut self, substance: Substance) -> Result<usize, ComputationError> {
        if let Some(index) = self.index_of(&substance) {
            return Ok(index);
        }
        if self.reaction.is_some() {
            return Err(ComputationError::UnknownSubstance(substance.formula()));
        }
        Ok(self.push_participant(substance, None, None))
    }

    /// Overrides the gas heuristic for one substance.
    pub fn set_phase(&mut self, substance: &Substance, phase: Phase) -> Result<(), ComputationError> {
        let index = self.require(substance)?;
        self.participants[index].phase = Some(phase);
        self.drop_derived();
        Ok(())
    }

    fn is_gas(&self, index: usize) -> bool {
        let participant = &self.participants[index];
        match participant.phase {
            Some(phase) => phase == Phase::Gas,
            None => participant.substance.is_gas(),
        }
    }

    //////////////////////////////////////////////////////////////////////////////
    // writing
    //////////////////////////////////////////////////////////////////////////////

    fn key_name(&self, key: Key) -> String {
        match key.owner {
            Owner::Substance(i) => format!(
                "{}({})",
                key.kind.symbol(),
                self.participants[i].substance.formula()
            ),
            Owner::Environment => key.kind.symbol().to_string(),
        }
    }

    fn drop_derived(&mut self) {
        self.values.retain(|_, e| e.origin != Origin::Derived);
    }

    fn set_assumed(&mut self, key: Key, si: f64) {
        let keep_given = self
            .values
            .get(&key)
            .is_some_and(|e| e.origin == Origin::Given);
        if !keep_given {
            self.values.insert(
                key,
                Entry {
                    si,
                    unit: key.kind.default_unit(),
                    origin: Origin::Assumed,
                },
            );
        }
    }

    /// Stores a caller value. A different written or intrinsic value of the same quantity is a
    /// conflict; assumed and derived values are replaced, so the outcome does not depend on what
    /// was computed before.
    fn store(&mut self, key: Key, datum: &Datum, force: bool) -> Result<(), ComputationError> {
        let si = datum.si_value();
        if !force {
            if let Some(existing) = self.values.get(&key) {
                if matches!(existing.origin, Origin::Given | Origin::Intrinsic)
                    && !relative_eq!(
                        existing.si,
                        si,
                        epsilon = f64::EPSILON,
                        max_relative = self.config.conflict_tolerance
                    )
                {
                    return Err(ComputationError::ConflictingDatum {
                        key: self.key_name(key),
                        known: datum.unit().from_si(existing.si),
                        written: datum.value(),
                    });
                }
            }
        }
        let changed = self
            .values
            .get(&key)
            .is_none_or(|e| e.si != si || e.origin != Origin::Given);
        if force || changed {
            self.drop_derived();
        }
        if key.owner == Owner::Environment
            && matches!(
                key.kind,
                QuantityKind::Temperature | QuantityKind::Pressure | QuantityKind::GasConstant
            )
        {
            // a preset molar volume no longer matches the written conditions
            let v0 = Key::env(QuantityKind::MolarVolume);
            if self.values.get(&v0).is_some_and(|e| e.origin == Origin::Assumed) {
                self.values.shift_remove(&v0);
            }
        }
        debug!("{} = {} {} written", self.key_name(key), datum.value(), datum.unit());
        self.values.insert(
            key,
            Entry {
                si,
                unit: datum.unit().clone(),
                origin: Origin::Given,
            },
        );
        Ok(())
    }

    fn key_for(&mut self, datum: &SSDatum) -> Result<Key, ComputationError> {
        if datum.kind().is_environmental() {
            return Ok(Key::env(datum.kind()));
        }
        let index = self.add_substance(datum.substance().clone())?;
        Ok(Key::of(index, datum.kind()))
    }

    /// Records a known value about a substance.
    pub fn write(&mut self, datum: SSDatum) -> Result<(), ComputationError> {
        let key = self.key_for(&datum)?;
        self.store(key, datum.datum(), false)
    }

    /// Records a value replacing whatever is known about the same quantity.
    pub fn overwrite(&mut self, datum: SSDatum) -> Result<(), ComputationError> {
        let key = self.key_for(&datum)?;
        self.store(key, datum.datum(), true)
    }

    /// Records an environment value: T, P, V0 or R.
    pub fn write_condition(&mut self, datum: Datum) -> Result<(), ComputationError> {
        if !datum.kind().is_environmental() {
            return Err(ComputationError::UnknownVariable(format!(
                "{} is not an environment quantity",
                datum.kind().symbol()
            )));
        }
        self.store(Key::env(datum.kind()), &datum, false)
    }

    /// Activates an assumption preset. Constants of later presets replace earlier ones;
    /// values written by the caller are kept.
    pub fn assume(&mut self, symbol: &str) -> Result<(), ComputationError> {
        let registry = self.registry;
        let constants = registry.resolve(symbol)?;
        self.drop_derived();
        for (name, datum) in constants {
            if name == WATER_DENSITY {
                self.water_density = Some(datum.si_value());
                let waters: Vec<usize> = (0..self.participants.len())
                    .filter(|&i| self.participants[i].substance.is_water())
                    .collect();
                for i in waters {
                    self.set_assumed(Key::of(i, QuantityKind::Density), datum.si_value());
                }
            } else if datum.kind().is_environmental() {
                self.set_assumed(Key::env(datum.kind()), datum.si_value());
            } else {
                debug!("assumption {}: constant {} is not used by the solver", symbol, name);
            }
        }
        if !self.active_assumptions.iter().any(|s| s == symbol) {
            self.active_assumptions.push(symbol.to_string());
        }
        info!("assumption {} activated", symbol);
        Ok(())
    }

    //////////////////////////////////////////////////////////////////////////////
    // reading
    //////////////////////////////////////////////////////////////////////////////

    fn answer(&self, index: usize, kind: QuantityKind, si: f64, unit: &Unit) -> SSDatum {
        let datum = Datum::from_si(kind, si)
            .convert_to(unit)
            .unwrap_or_else(|_| Datum::from_si(kind, si));
        let datum = match self.config.round_to {
            Some(decimals) => datum.rounded(decimals),
            None => datum,
        };
        let participant = &self.participants[index];
        SSDatum::from_datum(participant.substance.clone(), datum)
            .with_coefficient(participant.coefficient)
    }

    fn substance_key(
        &self,
        substance: &Substance,
        kind: QuantityKind,
    ) -> Result<Key, ComputationError> {
        if kind.is_environmental() {
            return Err(ComputationError::UnknownVariable(format!(
                "{} belongs to the environment, not to {}",
                kind.symbol(),
                substance.formula()
            )));
        }
        Ok(Key::of(self.require(substance)?, kind))
    }

    /// Stored value, no solving.
    pub fn read(&self, substance: &Substance, kind: QuantityKind) -> Result<SSDatum, ComputationError> {
        let key = self.substance_key(substance, kind)?;
        let entry = self
            .values
            .get(&key)
            .ok_or_else(|| ComputationError::ValueNotFound(self.key_name(key)))?;
        let Owner::Substance(index) = key.owner else {
            unreachable!("substance keys have a substance owner")
        };
        Ok(self.answer(index, kind, entry.si, &entry.unit))
    }

    pub fn read_condition(&self, kind: QuantityKind) -> Result<Datum, ComputationError> {
        let key = Key::env(kind);
        let entry = self
            .values
            .get(&key)
            .ok_or_else(|| ComputationError::ValueNotFound(self.key_name(key)))?;
        Datum::from_si(kind, entry.si).convert_to(&entry.unit)
    }

    pub fn has_value(&self, substance: &Substance, kind: QuantityKind) -> bool {
        self.substance_key(substance, kind)
            .is_ok_and(|key| self.values.contains_key(&key))
    }

    /// Removes a stored value and everything derived so far.
    pub fn erase(&mut self, substance: &Substance, kind: QuantityKind) -> Result<(), ComputationError> {
        let key = self.substance_key(substance, kind)?;
        if self.values.shift_remove(&key).is_none() {
            return Err(ComputationError::ValueNotFound(self.key_name(key)));
        }
        self.drop_derived();
        Ok(())
    }

    /// Forgets written and derived values; molar masses and assumptions stay.
    pub fn clear(&mut self) {
        self.values
            .retain(|_, e| matches!(e.origin, Origin::Intrinsic | Origin::Assumed));
    }

    /// Stored value in the unit it is kept in, without rounding.
    fn stored(&self, substance: &Substance, kind: QuantityKind) -> Result<SSDatum, ComputationError> {
        let key = self.substance_key(substance, kind)?;
        let entry = self
            .values
            .get(&key)
            .ok_or_else(|| ComputationError::ValueNotFound(self.key_name(key)))?;
        let datum = Datum::from_si(kind, entry.si).convert_to(&entry.unit)?;
        let coefficient = self
            .index_of(substance)
            .and_then(|i| self.participants[i].coefficient);
        Ok(SSDatum::from_datum(substance.clone(), datum).with_coefficient(coefficient))
    }

    fn replace(&mut self, current: &SSDatum, datum: Datum) -> Result<SSDatum, ComputationError> {
        let datum = SSDatum::from_datum(current.substance().clone(), datum)
            .with_coefficient(current.coefficient());
        self.overwrite(datum.clone())?;
        Ok(datum)
    }

    /// Multiplies a known value by `factor`, replacing it.
    pub fn scale(
        &mut self,
        substance: &Substance,
        kind: QuantityKind,
        factor: f64,
    ) -> Result<SSDatum, ComputationError> {
        let current = self.stored(substance, kind)?;
        let scaled = current.datum().scale(factor)?;
        self.replace(&current, scaled)
    }

    /// Divides a known value by `divisor`, replacing it.
    pub fn div(
        &mut self,
        substance: &Substance,
        kind: QuantityKind,
        divisor: f64,
    ) -> Result<SSDatum, ComputationError> {
        self.scale(substance, kind, 1.0 / divisor)
    }

    /// Adds `amount`, given in the unit of the stored value, replacing it. A negative result is
    /// an error unless `allow_negatives` is set.
    pub fn add(
        &mut self,
        substance: &Substance,
        kind: QuantityKind,
        amount: f64,
        allow_negatives: bool,
    ) -> Result<SSDatum, ComputationError> {
        let current = self.stored(substance, kind)?;
        let value = current.value() + amount;
        let unit = current.unit().clone();
        let datum = if allow_negatives {
            Datum::signed(current.variable(), kind, value, unit)?
        } else {
            Datum::with_unit(current.variable(), kind, value, unit)?
        };
        self.replace(&current, datum)
    }

    /// Subtracts `amount`, given in the unit of the stored value, replacing it.
    pub fn sub(
        &mut self,
        substance: &Substance,
        kind: QuantityKind,
        amount: f64,
        allow_negatives: bool,
    ) -> Result<SSDatum, ComputationError> {
        self.add(substance, kind, -amount, allow_negatives)
    }

    //////////////////////////////////////////////////////////////////////////////
    // solving
    //////////////////////////////////////////////////////////////////////////////

    fn relations(&self, stoichiometry: bool) -> Vec<Relation> {
        let mut relations = Vec::new();
        let v0 = Key::env(QuantityKind::MolarVolume);
        for i in 0..self.participants.len() {
            let k = |kind| Key::of(i, kind);
            relations.push(Relation::new(
                k(QuantityKind::Mass),
                1.0,
                vec![(k(QuantityKind::Moles), 1), (k(QuantityKind::MolarMass), 1)],
                Guard::Always,
            ));
            relations.push(Relation::new(
                k(QuantityKind::Mass),
                1.0,
                vec![(k(QuantityKind::Density), 1), (k(QuantityKind::Volume), 1)],
                Guard::Always,
            ));
            relations.push(Relation::new(
                k(QuantityKind::Moles),
                1.0,
                vec![
                    (k(QuantityKind::Concentration), 1),
                    (k(QuantityKind::SolutionVolume), 1),
                ],
                Guard::Always,
            ));
            relations.push(Relation::new(
                k(QuantityKind::Volume),
                1.0,
                vec![(k(QuantityKind::Moles), 1), (v0, 1)],
                Guard::GasWithoutDensity(i),
            ));
        }
        relations.push(Relation::new(
            v0,
            1.0,
            vec![
                (Key::env(QuantityKind::GasConstant), 1),
                (Key::env(QuantityKind::Temperature), 1),
                (Key::env(QuantityKind::Pressure), -1),
            ],
            Guard::Always,
        ));
        if stoichiometry {
            for (i, a) in self.participants.iter().enumerate() {
                for (j, b) in self.participants.iter().enumerate().skip(i + 1) {
                    if let (Some(ca), Some(cb)) = (a.coefficient, b.coefficient) {
                        relations.push(Relation::new(
                            Key::of(j, QuantityKind::Moles),
                            cb as f64 / ca as f64,
                            vec![(Key::of(i, QuantityKind::Moles), 1)],
                            Guard::Always,
                        ));
                    }
                }
            }
        }
        relations
    }

    fn guard_holds(&self, guard: Guard) -> bool {
        match guard {
            Guard::Always => true,
            Guard::GasWithoutDensity(i) => {
                // only a measured or preset density switches the gas off the molar volume
                self.is_gas(i)
                    && !self
                        .values
                        .get(&Key::of(i, QuantityKind::Density))
                        .is_some_and(|e| matches!(e.origin, Origin::Given | Origin::Assumed))
            }
        }
    }

    /// Still-unknown (owner, quantity) pairs.
    pub fn unknowns(&self) -> Vec<String> {
        let substance_keys = (0..self.participants.len())
            .flat_map(|i| SUBSTANCE_KINDS.iter().map(move |kind| Key::of(i, *kind)));
        let environment_keys = ENVIRONMENT_KINDS.iter().map(|kind| Key::env(*kind));
        substance_keys
            .chain(environment_keys)
            .filter(|key| !self.values.contains_key(key))
            .map(|key| self.key_name(key))
            .collect()
    }

    fn solve(&mut self, target: Key, stoichiometry: bool) -> Result<f64, ComputationError> {
        if let Some(entry) = self.values.get(&target) {
            return Ok(entry.si);
        }
        let relations = self.relations(stoichiometry);
        for pass in 0..self.config.max_passes {
            let mut fired = false;
            for relation in &relations {
                if !self.guard_holds(relation.guard) {
                    continue;
                }
                if let Some((key, value)) = relation.fire(&self.values) {
                    debug!("pass {}: {} = {}", pass, self.key_name(key), value);
                    self.values.insert(
                        key,
                        Entry {
                            si: value,
                            unit: key.kind.default_unit(),
                            origin: Origin::Derived,
                        },
                    );
                    fired = true;
                    if key == target {
                        return Ok(value);
                    }
                }
            }
            if !fired {
                break;
            }
        }
        Err(ComputationError::InsufficientData {
            target: self.key_name(target),
            unknown: self.unknowns(),
        })
    }

    /// Resolves a quantity of a substance, answering in the unit it was written in or in the
    /// default unit of the quantity.
    pub fn compute(
        &mut self,
        substance: &Substance,
        kind: QuantityKind,
    ) -> Result<SSDatum, ComputationError> {
        let key = self.substance_key(substance, kind)?;
        let si = self.solve(key, true)?;
        let unit = self
            .values
            .get(&key)
            .map(|e| e.unit.clone())
            .unwrap_or_else(|| kind.default_unit());
        let Owner::Substance(index) = key.owner else {
            unreachable!("substance keys have a substance owner")
        };
        Ok(self.answer(index, kind, si, &unit))
    }

    /// Resolves a quantity of a substance in the requested unit.
    pub fn compute_in(
        &mut self,
        substance: &Substance,
        kind: QuantityKind,
        unit: &str,
    ) -> Result<SSDatum, ComputationError> {
        let unit = Unit::parse(unit)?;
        if unit.dimension != kind.dimension() {
            return Err(ComputationError::IncompatibleUnits {
                from: kind.dimension().to_string(),
                to: unit.symbol,
            });
        }
        let key = self.substance_key(substance, kind)?;
        let si = self.solve(key, true)?;
        let Owner::Substance(index) = key.owner else {
            unreachable!("substance keys have a substance owner")
        };
        Ok(self.answer(index, kind, si, &unit))
    }

    /// Resolves an environment quantity (V0 from T and P, ...).
    pub fn compute_condition(&mut self, kind: QuantityKind) -> Result<Datum, ComputationError> {
        if !kind.is_environmental() {
            return Err(ComputationError::UnknownVariable(format!(
                "{} is not an environment quantity",
                kind.symbol()
            )));
        }
        let si = self.solve(Key::env(kind), true)?;
        Datum::from_si(kind, si).convert_to(&kind.default_unit())
    }

    /// Moles of `target` from the moles of `using` and the reaction coefficients. The moles of
    /// `using` must follow from its own data; a written amount of `target` that disagrees is a
    /// conflict.
    pub fn derive_moles_of(
        &mut self,
        target: &Substance,
        using: &Substance,
    ) -> Result<SSDatum, ComputationError> {
        let reaction = self
            .reaction
            .as_ref()
            .ok_or_else(|| ComputationError::NoReaction("derive_moles_of".to_string()))?;
        let c_target = reaction
            .coefficient_of(target)
            .ok_or_else(|| ComputationError::UnknownSubstance(target.formula()))?;
        let c_using = reaction
            .coefficient_of(using)
            .ok_or_else(|| ComputationError::UnknownSubstance(using.formula()))?;
        let target_index = self.require(target)?;
        let using_index = self.require(using)?;

        let n_using = self.solve(Key::of(using_index, QuantityKind::Moles), false)?;
        let n_target = n_using * c_target as f64 / c_using as f64;
        let key = Key::of(target_index, QuantityKind::Moles);
        match self.values.get(&key) {
            Some(existing) if existing.origin == Origin::Given => {
                if !relative_eq!(
                    existing.si,
                    n_target,
                    epsilon = f64::EPSILON,
                    max_relative = self.config.conflict_tolerance
                ) {
                    return Err(ComputationError::ConflictingDatum {
                        key: self.key_name(key),
                        known: existing.si,
                        written: n_target,
                    });
                }
            }
            _ => {
                // values derived along other paths may disagree with this ratio
                let using_key = Key::of(using_index, QuantityKind::Moles);
                let using_entry = self.values.get(&using_key).cloned();
                self.drop_derived();
                if let Some(entry) = using_entry {
                    self.values.entry(using_key).or_insert(entry);
                }
                self.values.insert(
                    key,
                    Entry {
                        si: n_target,
                        unit: QuantityKind::Moles.default_unit(),
                        origin: Origin::Derived,
                    },
                );
            }
        }
        Ok(self.answer(
            target_index,
            QuantityKind::Moles,
            n_target,
            &QuantityKind::Moles.default_unit(),
        ))
    }

    /// Reagent with the smallest n/ν among the reagents whose moles follow from their own data.
    /// Values derived through stoichiometry are not used for the comparison.
    pub fn limiting_reagent(&self) -> Result<LimitingReagent, ComputationError> {
        let reaction = self
            .reaction
            .as_ref()
            .ok_or_else(|| ComputationError::NoReaction("limiting_reagent".to_string()))?;
        let mut scratch = self.clone();
        scratch.drop_derived();

        let mut best: Option<(usize, f64, f64)> = None;
        let mut unknown = Vec::new();
        for reagent in reaction.reagents() {
            let index = self.require(reagent)?;
            let coefficient = self.participants[index].coefficient.unwrap_or(1) as f64;
            match scratch.solve(Key::of(index, QuantityKind::Moles), false) {
                Ok(n) => {
                    let extent = n / coefficient;
                    if best.is_none_or(|(_, _, e)| extent < e) {
                        best = Some((index, n, extent));
                    }
                }
                Err(_) => unknown.push(self.key_name(Key::of(index, QuantityKind::Moles))),
            }
        }
        let (index, n, extent) = best.ok_or(ComputationError::InsufficientData {
            target: "limiting reagent".to_string(),
            unknown,
        })?;
        let moles = self.answer(index, QuantityKind::Moles, n, &QuantityKind::Moles.default_unit());
        info!("limiting reagent: {} (extent {} mol)", moles.substance(), extent);
        Ok(LimitingReagent {
            substance: self.participants[index].substance.clone(),
            moles,
            extent,
        })
    }

    //////////////////////////////////////////////////////////////////////////////
    // reporting
    //////////////////////////////////////////////////////////////////////////////

    fn records(&self) -> Vec<QuantityRecord> {
        self.values
            .iter()
            .map(|(key, entry)| QuantityRecord {
                owner: match key.owner {
                    Owner::Substance(i) => self.participants[i].substance.formula(),
                    Owner::Environment => "environment".to_string(),
                },
                variable: key.kind.symbol().to_string(),
                value: entry.unit.from_si(entry.si),
                unit: entry.unit.symbol.clone(),
                origin: entry.origin,
            })
            .collect()
    }

    /// Working set as a JSON array of {owner, variable, value, unit, origin}.
    pub fn to_json(&self) -> Result<String, ComputationError> {
        Ok(serde_json::to_string_pretty(&self.records())?)
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("owner"),
            Cell::new("quantity"),
            Cell::new("value"),
            Cell::new("unit"),
            Cell::new("origin"),
        ]));
        for record in self.records() {
            table.add_row(Row::new(vec![
                Cell::new(&record.owner),
                Cell::new(&record.variable),
                Cell::new(&format!("{:.6}", record.value)),
                Cell::new(&record.unit),
                Cell::new(&format!("{:?}", record.origin)),
            ]));
        }
        if let Some(reaction) = &self.reaction {
            println!("{}", reaction.equation());
        }
        table.printstd();
    }
}
