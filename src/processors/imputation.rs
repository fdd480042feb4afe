//! Fill strategies for a column of optional values in timestamp order.

/// Linear interpolation by position. Interior gaps are filled on the straight
/// line between their neighbours, trailing gaps repeat the last value and
/// leading gaps stay missing.
pub fn interpolate_linear(column: &mut [Option<f64>]) {
    let mut last_known: Option<(usize, f64)> = None;

    for i in 0..column.len() {
        let Some(current) = column[i] else {
            continue;
        };

        if let Some((start, start_value)) = last_known {
            let span = (i - start) as f64;
            for (offset, slot) in column[start + 1..i].iter_mut().enumerate() {
                let step = (offset + 1) as f64;
                *slot = Some(start_value + (current - start_value) * step / span);
            }
        }
        last_known = Some((i, current));
    }

    if let Some((last, value)) = last_known {
        for slot in column[last + 1..].iter_mut() {
            *slot = Some(value);
        }
    }
}

pub fn forward_fill(column: &mut [Option<f64>]) {
    let mut carry = None;
    for slot in column.iter_mut() {
        match slot {
            Some(v) => carry = Some(*v),
            None => *slot = carry,
        }
    }
}

pub fn backward_fill(column: &mut [Option<f64>]) {
    let mut carry = None;
    for slot in column.iter_mut().rev() {
        match slot {
            Some(v) => carry = Some(*v),
            None => *slot = carry,
        }
    }
}

/// Replace every missing cell with `value`, returning how many were filled.
pub fn fill_constant(column: &mut [Option<f64>], value: f64) -> usize {
    let mut filled = 0;
    for slot in column.iter_mut().filter(|s| s.is_none()) {
        *slot = Some(value);
        filled += 1;
    }
    filled
}

/// Euclidean distance over coordinates present in both rows, scaled up by
/// the share of coordinates that could be compared. `None` when the rows
/// share no present coordinate.
fn nan_euclidean<const N: usize>(a: &[Option<f64>; N], b: &[Option<f64>; N]) -> Option<f64> {
    let mut sum = 0.0;
    let mut present = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        if let (Some(x), Some(y)) = (x, y) {
            sum += (x - y).powi(2);
            present += 1;
        }
    }
    if present == 0 {
        return None;
    }
    Some((sum * N as f64 / present as f64).sqrt())
}

/// k-nearest-neighbour imputation over all columns jointly.
///
/// Each missing cell is replaced by the mean of that column over the `k`
/// nearest rows that have it present. Distances are computed against the
/// original (pre-imputation) rows. Cells without any donor stay missing.
/// Returns the number of cells filled.
pub fn knn_impute<const N: usize>(rows: &mut [[Option<f64>; N]], k: usize) -> usize {
    if k == 0 {
        return 0;
    }

    let original: Vec<[Option<f64>; N]> = rows.to_vec();
    let mut filled = 0;

    for (i, row) in rows.iter_mut().enumerate() {
        if row.iter().all(|v| v.is_some()) {
            continue;
        }

        let mut neighbours: Vec<(f64, usize)> = original
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .filter_map(|(j, other)| nan_euclidean(&original[i], other).map(|d| (d, j)))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for col in 0..N {
            if row[col].is_some() {
                continue;
            }

            let donors: Vec<f64> = neighbours
                .iter()
                .filter_map(|(_, j)| original[*j][col])
                .take(k)
                .collect();

            if !donors.is_empty() {
                row[col] = Some(donors.iter().sum::<f64>() / donors.len() as f64);
                filled += 1;
            }
        }
    }

    filled
}
