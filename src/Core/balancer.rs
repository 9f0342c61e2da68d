/// Balancing of chemical equations.
///
/// The element-conservation matrix has one row per element (sorted by symbol) plus a charge
/// row, and one column per substance; product columns are negated. A balanced equation is a
/// positive integer vector of its null space. The null space is found by fraction-free integer
/// Gauss-Jordan elimination, so no rounding ever enters the coefficients.
use crate::Core::errors::ChemistryError;
use crate::Core::substances::{Particle, Substance};
use log::{debug, info};
use nalgebra::DMatrix;
use std::collections::BTreeSet;

/// Row label used for the charge-conservation row.
pub const CHARGE_ROW: &str = "charge";

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: i128, b: i128) -> i128 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b) * b).abs()
}

fn reduce(row: &mut [i128]) {
    let g = row.iter().fold(0, |acc, x| gcd(acc, *x));
    if g > 1 {
        row.iter_mut().for_each(|x| *x /= g);
    }
}

/// Element-composition matrix of a reaction: rows are the elements sorted by symbol plus the
/// charge row, columns are reagents then products (products negated).
pub fn create_elem_composition_matrix(
    reagents: &[Substance],
    products: &[Substance],
) -> (DMatrix<i64>, Vec<String>) {
    let mut symbols: BTreeSet<String> = BTreeSet::new();
    for substance in reagents.iter().chain(products.iter()) {
        for element in substance.elements() {
            symbols.insert(element.symbol);
        }
    }
    let mut labels: Vec<String> = symbols.into_iter().collect();
    labels.push(CHARGE_ROW.to_string());

    let num_rows = labels.len();
    let num_cols = reagents.len() + products.len();
    let mut matrix = DMatrix::<i64>::zeros(num_rows, num_cols);
    for (j, substance) in reagents.iter().chain(products.iter()).enumerate() {
        let sign: i64 = if j < reagents.len() { 1 } else { -1 };
        let composition = substance.composition();
        for (i, label) in labels.iter().enumerate() {
            let entry = if label == CHARGE_ROW {
                composition.charge() as i64
            } else {
                composition.count(label) as i64
            };
            matrix[(i, j)] = sign * entry;
        }
    }
    (matrix, labels)
}

/// Integer basis of the null space of `matrix`. Every basis vector is primitive (gcd 1).
pub fn integer_null_space(matrix: &DMatrix<i64>) -> Vec<Vec<i128>> {
    let (rows, cols) = matrix.shape();
    let mut a: Vec<Vec<i128>> = (0..rows)
        .map(|i| (0..cols).map(|j| matrix[(i, j)] as i128).collect())
        .collect();

    let mut pivots: Vec<usize> = Vec::new();
    let mut r = 0;
    for c in 0..cols {
        if r == rows {
            break;
        }
        let Some(p) = (r..rows).find(|&i| a[i][c] != 0) else {
            continue;
        };
        a.swap(r, p);
        if a[r][c] < 0 {
            a[r].iter_mut().for_each(|x| *x = -*x);
        }
        reduce(&mut a[r]);
        for i in 0..rows {
            if i == r || a[i][c] == 0 {
                continue;
            }
            let f = a[i][c];
            let g = a[r][c];
            for j in 0..cols {
                a[i][j] = a[i][j] * g - a[r][j] * f;
            }
            reduce(&mut a[i]);
        }
        pivots.push(c);
        r += 1;
    }

    let free: Vec<usize> = (0..cols).filter(|c| !pivots.contains(c)).collect();
    let mut basis = Vec::with_capacity(free.len());
    for &f in &free {
        // pivot rows are 0..pivots.len() in order; each holds zeros in the other pivot columns
        let scale = pivots
            .iter()
            .enumerate()
            .fold(1, |acc, (row, &pc)| lcm(acc, a[row][pc]));
        let mut x = vec![0i128; cols];
        x[f] = scale;
        for (row, &pc) in pivots.iter().enumerate() {
            x[pc] = -a[row][f] * (scale / a[row][pc]);
        }
        reduce(&mut x);
        basis.push(x);
    }
    basis
}

fn scheme_of(reagents: &[Substance], products: &[Substance]) -> String {
    let side = |list: &[Substance]| {
        list.iter()
            .map(|s| s.formula())
            .collect::<Vec<_>>()
            .join(" + ")
    };
    format!("{} -> {}", side(reagents), side(products))
}

/// Minimal positive integer coefficients (reagents then products) conserving every element and
/// the charge. Fails when no such vector exists or when it is not unique up to scaling.
pub fn balance(reagents: &[Substance], products: &[Substance]) -> Result<Vec<u32>, ChemistryError> {
    let scheme = scheme_of(reagents, products);
    if reagents.is_empty() || products.is_empty() {
        return Err(ChemistryError::InvalidReaction(format!(
            "'{}' needs at least one reagent and one product",
            scheme
        )));
    }
    let (matrix, labels) = create_elem_composition_matrix(reagents, products);
    debug!("composition matrix of {} (rows {:?}):\n{}", scheme, labels, matrix);

    let basis = integer_null_space(&matrix);
    let mut vector = match basis.len() {
        0 => {
            return Err(ChemistryError::Unbalanceable {
                scheme,
                reason: "only the trivial solution conserves all elements".to_string(),
            });
        }
        1 => basis.into_iter().next().unwrap_or_default(),
        dimension => {
            return Err(ChemistryError::AmbiguousReaction { scheme, dimension });
        }
    };

    if vector.iter().all(|x| *x <= 0) {
        vector.iter_mut().for_each(|x| *x = -*x);
    }
    if vector.iter().any(|x| *x <= 0) {
        return Err(ChemistryError::Unbalanceable {
            scheme,
            reason: "balancing requires a non-positive coefficient".to_string(),
        });
    }
    reduce(&mut vector);

    let coefficients = vector
        .into_iter()
        .map(|x| u32::try_from(x))
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|_| ChemistryError::Unbalanceable {
            scheme: scheme.clone(),
            reason: "coefficients are too large".to_string(),
        })?;
    info!("balanced {} with coefficients {:?}", scheme, coefficients);
    Ok(coefficients)
}
