//! Formula text -> `Substance`.
//!
//! The body of a formula is tokenized into atom runs (`Na`, `O4`) and bracket groups with
//! multipliers (`(SO4)3`, `[NH4]2`). Charged formulas become ions. A neutral formula with one
//! element is a simple substance; any other neutral formula is split between two top-level
//! tokens into a cation part and an anion part, using oxidation states and the polyatomic ion
//! table to find a charge-balanced pair:
//!
//! `Al2(SO4)3` -> `Al` x2 (+3) and `SO4` x3 (-2)
//!
//! Accepted charge suffixes: `(+2)`, `(2-)`, `^2-`, `^-2`, `Fe+3`, `SO4-2`, `Na+`.
//! A trailing phase mark `(g)`, `(l)`, `(s)`, `(c)` or `(aq)` is stripped and reported.
use crate::Core::composition::Composition;
use crate::Core::errors::ChemistryError;
use crate::Core::periodic_table::{Element, ElementDatabase, PeriodicTable};
use crate::Core::substances::{Ion, Molecule, Particle, Phase, Simple, Substance};
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

static CHARGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(?P<body>.+)\((?P<sign>[+-])(?P<mag>\d*)\)$",
        r"^(?P<body>.+)\((?P<mag>\d*)(?P<sign>[+-])\)$",
        r"^(?P<body>.+)\^(?P<mag>\d*)(?P<sign>[+-])$",
        r"^(?P<body>.+)\^(?P<sign>[+-])(?P<mag>\d*)$",
        r"^(?P<body>.+?)(?P<sign>[+-])(?P<mag>\d*)$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("charge pattern must compile"))
    .collect()
});

const PHASE_MARKS: [(&str, Phase); 5] = [
    ("(aq)", Phase::Aqueous),
    ("(g)", Phase::Gas),
    ("(l)", Phase::Liquid),
    ("(s)", Phase::Solid),
    ("(c)", Phase::Solid),
];

#[derive(Debug, Clone)]
enum Token {
    Atom { element: Element, count: u32 },
    Group { items: Vec<Token>, count: u32 },
}

/// Parses with the built-in periodic table.
pub fn parse(text: &str) -> Result<Substance, ChemistryError> {
    parse_with(text, PeriodicTable::standard())
}

pub fn parse_with<D: ElementDatabase + ?Sized>(
    text: &str,
    db: &D,
) -> Result<Substance, ChemistryError> {
    Ok(parse_with_phase(text, db)?.0)
}

/// Parses a formula and returns the phase mark, if the text carried one.
pub fn parse_with_phase<D: ElementDatabase + ?Sized>(
    text: &str,
    db: &D,
) -> Result<(Substance, Option<Phase>), ChemistryError> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(ChemistryError::syntax(text, "empty formula"));
    }
    let (without_phase, phase) = strip_phase(&cleaned);
    let (body, charge) = split_charge(without_phase)?;
    if body.is_empty() {
        return Err(ChemistryError::syntax(text, "formula has no atoms"));
    }

    let tokens = Tokenizer::new(body, db).run()?;
    let mut pairs = Vec::new();
    flatten(text, &tokens, 1, &mut pairs)?;
    let composition = Composition::from_pairs(pairs, charge)?;

    let substance = if charge != 0 {
        Substance::Ion(Ion::new(composition)?)
    } else if composition.len() == 1 {
        let (element, count) = composition
            .iter()
            .next()
            .map(|(e, c)| (e.clone(), c))
            .ok_or_else(|| ChemistryError::syntax(text, "formula has no atoms"))?;
        Substance::Simple(Simple::new(element, count)?)
    } else {
        Substance::Molecule(split_molecule(text, &tokens, &composition, db)?)
    };
    debug!("parsed '{}' as {}", text, substance);
    Ok((substance, phase))
}

/// Removes a trailing phase mark.
pub fn strip_phase(text: &str) -> (&str, Option<Phase>) {
    for (mark, phase) in PHASE_MARKS {
        if let Some(stripped) = text.strip_suffix(mark) {
            if !stripped.is_empty() {
                return (stripped, Some(phase));
            }
        }
    }
    (text, None)
}

fn split_charge(text: &str) -> Result<(&str, i32), ChemistryError> {
    for pattern in CHARGE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let body = caps.name("body").map_or("", |m| m.as_str());
            let sign = if caps.name("sign").map_or("+", |m| m.as_str()) == "-" {
                -1
            } else {
                1
            };
            let magnitude = match caps.name("mag").map_or("", |m| m.as_str()) {
                "" => 1,
                digits => digits
                    .parse::<i32>()
                    .map_err(|_| ChemistryError::syntax(text, "charge is too large"))?,
            };
            if magnitude == 0 {
                return Err(ChemistryError::syntax(text, "zero charge in a charge suffix"));
            }
            return Ok((body, sign * magnitude));
        }
    }
    Ok((text, 0))
}

struct Tokenizer<'a, D: ?Sized> {
    formula: &'a str,
    chars: Vec<char>,
    pos: usize,
    db: &'a D,
}

impl<'a, D: ElementDatabase + ?Sized> Tokenizer<'a, D> {
    fn new(formula: &'a str, db: &'a D) -> Self {
        Self {
            formula,
            chars: formula.chars().collect(),
            pos: 0,
            db,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ChemistryError> {
        self.sequence(None)
    }

    fn sequence(&mut self, closing: Option<char>) -> Result<Vec<Token>, ChemistryError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                'A'..='Z' => {
                    let mut symbol = c.to_string();
                    self.pos += 1;
                    if let Some(&next) = self.chars.get(self.pos) {
                        if next.is_ascii_lowercase() {
                            symbol.push(next);
                            self.pos += 1;
                        }
                    }
                    let element = self.db.element(&symbol).cloned().ok_or_else(|| {
                        ChemistryError::UnknownElement {
                            symbol: symbol.clone(),
                            formula: self.formula.to_string(),
                        }
                    })?;
                    let count = self.count()?;
                    tokens.push(Token::Atom { element, count });
                }
                '(' | '[' => {
                    self.pos += 1;
                    let close = if c == '(' { ')' } else { ']' };
                    let items = self.sequence(Some(close))?;
                    if items.is_empty() {
                        return Err(ChemistryError::syntax(self.formula, "empty bracket group"));
                    }
                    let count = self.count()?;
                    tokens.push(Token::Group { items, count });
                }
                ')' | ']' => {
                    if closing == Some(c) {
                        self.pos += 1;
                        return Ok(tokens);
                    }
                    return Err(ChemistryError::syntax(
                        self.formula,
                        format!("unexpected '{}' at position {}", c, self.pos),
                    ));
                }
                _ => {
                    return Err(ChemistryError::syntax(
                        self.formula,
                        format!("unexpected character '{}' at position {}", c, self.pos),
                    ));
                }
            }
        }
        match closing {
            Some(close) => Err(ChemistryError::syntax(
                self.formula,
                format!("missing closing '{}'", close),
            )),
            None => Ok(tokens),
        }
    }

    fn count(&mut self) -> Result<u32, ChemistryError> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(1);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let count = digits
            .parse::<u32>()
            .map_err(|_| ChemistryError::syntax(self.formula, "count is too large"))?;
        if count == 0 {
            return Err(ChemistryError::syntax(self.formula, "zero count"));
        }
        Ok(count)
    }
}

fn multiply(formula: &str, count: u32, multiplier: u32) -> Result<u32, ChemistryError> {
    count
        .checked_mul(multiplier)
        .ok_or_else(|| ChemistryError::syntax(formula, "count is too large"))
}

fn flatten(
    formula: &str,
    tokens: &[Token],
    multiplier: u32,
    out: &mut Vec<(Element, u32)>,
) -> Result<(), ChemistryError> {
    for token in tokens {
        match token {
            Token::Atom { element, count } => {
                out.push((element.clone(), multiply(formula, *count, multiplier)?))
            }
            Token::Group { items, count } => {
                flatten(formula, items, multiply(formula, *count, multiplier)?, out)?
            }
        }
    }
    Ok(())
}

fn body_of(tokens: &[Token]) -> Result<Composition, ChemistryError> {
    let mut pairs = Vec::new();
    flatten("", tokens, 1, &mut pairs)?;
    Composition::from_pairs(pairs, 0)
}

/// One way to read a run of tokens as `index` copies of an ion body.
struct Side {
    body: Composition,
    index: u32,
    /// candidate charges with an optional preferred rendering
    charges: Vec<(i32, Option<String>)>,
}

fn side_options<D: ElementDatabase + ?Sized>(
    tokens: &[Token],
    cation: bool,
    db: &D,
) -> Result<Vec<Side>, ChemistryError> {
    let wanted_sign = |q: i32| if cation { q > 0 } else { q < 0 };
    let known = |body: &Composition| -> Vec<(i32, Option<String>)> {
        db.ions_matching(body)
            .into_iter()
            .filter(|ion| wanted_sign(ion.charge))
            .map(|ion| (ion.charge, Some(ion.formula.clone())))
            .collect()
    };
    let monatomic = |element: &Element| -> Vec<(i32, Option<String>)> {
        let states = if cation {
            element.positive_states()
        } else {
            element.negative_states()
        };
        states.into_iter().map(|q| (q, None)).collect()
    };

    let mut options = Vec::new();
    match tokens {
        [Token::Atom { element, count }] => {
            let single = Composition::single(element.clone(), 1)?;
            let mut charges = monatomic(element);
            charges.extend(known(&single));
            options.push(Side {
                body: single,
                index: *count,
                charges,
            });
            if *count > 1 {
                let whole = Composition::single(element.clone(), *count)?;
                let charges = known(&whole);
                options.push(Side {
                    body: whole,
                    index: 1,
                    charges,
                });
            }
        }
        [Token::Group { items, count }] => {
            let body = body_of(items)?;
            let mut charges = known(&body);
            if body.atom_count() == 1 {
                if let Some((element, _)) = body.iter().next() {
                    charges.extend(monatomic(element));
                }
            }
            options.push(Side {
                body,
                index: *count,
                charges,
            });
        }
        _ => {
            let body = body_of(tokens)?;
            let charges = known(&body);
            options.push(Side {
                body,
                index: 1,
                charges,
            });
        }
    }
    options.retain(|side| !side.charges.is_empty());
    Ok(options)
}

fn make_ion(side: &Side, charge: i32, label: &Option<String>) -> Result<Ion, ChemistryError> {
    let composition = side.body.with_charge(charge);
    match label {
        Some(label) => Ion::labelled(composition, label),
        None => Ion::new(composition),
    }
}

/// Tries every split point between top-level tokens, left to right, and returns the first
/// charge-balanced cation/anion pair that reproduces the parsed composition.
fn split_molecule<D: ElementDatabase + ?Sized>(
    text: &str,
    tokens: &[Token],
    total: &Composition,
    db: &D,
) -> Result<Molecule, ChemistryError> {
    if let [Token::Group { items, count: 1 }] = tokens {
        return split_molecule(text, items, total, db);
    }
    for k in 1..tokens.len() {
        let cations = side_options(&tokens[..k], true, db)?;
        let anions = side_options(&tokens[k..], false, db)?;
        // anion charges drive the search: O is read as -2 before -1
        for anion in &anions {
            for (q_minus, anion_label) in &anion.charges {
                for cation in &cations {
                    for (q_plus, cation_label) in &cation.charges {
                        let balance = *q_plus as i64 * cation.index as i64
                            + *q_minus as i64 * anion.index as i64;
                        if balance != 0 {
                            continue;
                        }
                        let molecule = Molecule::new(
                            make_ion(cation, *q_plus, cation_label)?,
                            make_ion(anion, *q_minus, anion_label)?,
                        )?;
                        if molecule.composition() == *total {
                            return Ok(molecule);
                        }
                    }
                }
            }
        }
    }
    Err(ChemistryError::syntax(
        text,
        "cannot be split into a charge-balanced cation and anion",
    ))
}
