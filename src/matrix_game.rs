//! Equilibrium solver: one state's payoff matrix and its zero-sum LP pair.
//!
//! For an in-progress state the available chairs define a square matrix
//! game; each entry is the Player-1-perspective value of the position the
//! chair pair leads to. Terminal outcomes contribute their terminal value
//! directly, in-progress outcomes contribute the stored value of the
//! successor, which must already be solved. Both players' linear programs
//! are solved independently and their objectives cross-checked.

use std::collections::HashMap;

use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::SolverError;
use crate::rules::{selector_is_a, step};
use crate::state::{chairs_of, present_chairs, status_of, to_hex, turn_of, Status};

/// A solved state as persisted: full-width probability vectors (entry `i`
/// is chair `i + 1`, zero where the chair is gone) and the game value in
/// `[-1, 1]`, Player-1 perspective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub p1_probs: Vec<f64>,
    pub p2_probs: Vec<f64>,
    pub value: f64,
    pub is_calculated: bool,
}

/// Terminal payoff, Player-1 perspective.
#[inline(always)]
pub fn terminal_value(status: Status, draw_value: f64) -> f64 {
    match status {
        Status::AWins => WIN_VALUE,
        Status::BWins => LOSS_VALUE,
        Status::Draw => draw_value,
        Status::InProgress => panic!("terminal_value on in-progress status"),
    }
}

/// Strategy record stored for a terminal state: zero vectors, no choices.
pub fn terminal_strategy(status: Status, draw_value: f64, precision: u32) -> Strategy {
    Strategy {
        p1_probs: vec![0.0; NUM_CHAIRS],
        p2_probs: vec![0.0; NUM_CHAIRS],
        value: round_to(terminal_value(status, draw_value), precision),
        is_calculated: true,
    }
}

/// Build the payoff matrix for an in-progress state.
///
/// Returns the available chairs in ascending order and the matrix indexed
/// `[row][col]`, row = Player A's chair, column = Player B's chair. The
/// role mapping follows turn parity: on even turns A selects, on odd turns
/// B selects and A sets.
pub fn build_payoff_matrix(
    code: u32,
    successor_values: &HashMap<u32, f64>,
    draw_value: f64,
) -> Result<(Vec<u8>, Vec<Vec<f64>>), SolverError> {
    let chairs = present_chairs(chairs_of(code));
    let selector_a = selector_is_a(turn_of(code));
    let n = chairs.len();

    let mut matrix = vec![vec![0.0f64; n]; n];
    for (i, &a) in chairs.iter().enumerate() {
        for (j, &b) in chairs.iter().enumerate() {
            let (selector, setter) = if selector_a { (a, b) } else { (b, a) };
            let outcome = step(code, selector, setter)?;
            matrix[i][j] = match status_of(outcome.next) {
                Status::InProgress => *successor_values.get(&outcome.next).ok_or(
                    SolverError::SuccessorNotSolved {
                        state: code,
                        successor: outcome.next,
                    },
                )?,
                terminal => terminal_value(terminal, draw_value),
            };
        }
    }
    Ok((chairs, matrix))
}

/// Solve a zero-sum matrix game exactly.
///
/// Returns the row player's mixed strategy, the column player's mixed
/// strategy, and the game value. The matrix is shifted elementwise to be
/// non-negative before both LPs; the value is recovered as the midpoint of
/// the two objectives minus the shift. An objective gap beyond the scaled
/// tolerance is reported on stderr but the midpoint is still accepted.
pub fn solve_matrix_game(matrix: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>, f64), SolverError> {
    let rows = matrix.len();
    let cols = matrix[0].len();
    if rows == 1 && cols == 1 {
        return Ok((vec![1.0], vec![1.0], matrix[0][0]));
    }

    let min_entry = matrix
        .iter()
        .flatten()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let shift = if min_entry < 0.0 { -min_entry } else { 0.0 };

    // Row player: maximize v s.t. for every column j, sum_i x_i M'[i][j] >= v.
    let mut row_lp = Problem::new(OptimizationDirection::Maximize);
    let v = row_lp.add_var(1.0, (f64::NEG_INFINITY, f64::INFINITY));
    let xs: Vec<Variable> = (0..rows).map(|_| row_lp.add_var(0.0, (0.0, 1.0))).collect();
    for j in 0..cols {
        let mut expr = LinearExpr::empty();
        for (i, &x) in xs.iter().enumerate() {
            expr.add(x, matrix[i][j] + shift);
        }
        expr.add(v, -1.0);
        row_lp.add_constraint(expr, ComparisonOp::Ge, 0.0);
    }
    let mut simplex = LinearExpr::empty();
    for &x in &xs {
        simplex.add(x, 1.0);
    }
    row_lp.add_constraint(simplex, ComparisonOp::Eq, 1.0);
    let row_solution = row_lp.solve().map_err(|e| SolverError::LpFailure {
        state: 0,
        detail: format!("row problem: {}", e),
    })?;

    // Column player: minimize u s.t. for every row i, sum_j y_j M'[i][j] <= u.
    let mut col_lp = Problem::new(OptimizationDirection::Minimize);
    let u = col_lp.add_var(1.0, (f64::NEG_INFINITY, f64::INFINITY));
    let ys: Vec<Variable> = (0..cols).map(|_| col_lp.add_var(0.0, (0.0, 1.0))).collect();
    for row in matrix {
        let mut expr = LinearExpr::empty();
        for (j, &y) in ys.iter().enumerate() {
            expr.add(y, row[j] + shift);
        }
        expr.add(u, -1.0);
        col_lp.add_constraint(expr, ComparisonOp::Le, 0.0);
    }
    let mut simplex = LinearExpr::empty();
    for &y in &ys {
        simplex.add(y, 1.0);
    }
    col_lp.add_constraint(simplex, ComparisonOp::Eq, 1.0);
    let col_solution = col_lp.solve().map_err(|e| SolverError::LpFailure {
        state: 0,
        detail: format!("column problem: {}", e),
    })?;

    let v_obj = row_solution.objective();
    let u_obj = col_solution.objective();
    let tolerance = VALUE_AGREEMENT_EPS * f64::max(1.0, shift + 1.0);
    if (v_obj - u_obj).abs() > tolerance {
        eprintln!(
            "Warning: LP objectives disagree beyond tolerance: v={:.12} u={:.12} (gap {:.3e})",
            v_obj,
            u_obj,
            (v_obj - u_obj).abs()
        );
    }

    let row_probs: Vec<f64> = xs.iter().map(|&x| row_solution[x]).collect();
    let col_probs: Vec<f64> = ys.iter().map(|&y| col_solution[y]).collect();
    let value = (v_obj + u_obj) / 2.0 - shift;

    Ok((row_probs, col_probs, value))
}

/// Clip to [0, 1] and renormalize to sum 1; if essentially no mass
/// survives clipping, fall back to the uniform distribution.
fn normalize(mut probs: Vec<f64>) -> Vec<f64> {
    for p in probs.iter_mut() {
        *p = p.clamp(0.0, 1.0);
    }
    let total: f64 = probs.iter().sum();
    if total < RENORM_EPS {
        let uniform = 1.0 / probs.len() as f64;
        probs.iter_mut().for_each(|p| *p = uniform);
    } else {
        probs.iter_mut().for_each(|p| *p /= total);
    }
    probs
}

/// Round to a fixed number of decimal digits for storage.
#[inline(always)]
pub fn round_to(x: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (x * factor).round() / factor
}

/// Scatter a compact per-chair vector back to full board width.
fn scatter(chairs: &[u8], compact: &[f64]) -> Vec<f64> {
    let mut full = vec![0.0; NUM_CHAIRS];
    for (&chair, &p) in chairs.iter().zip(compact) {
        full[chair as usize - 1] = p;
    }
    full
}

/// Compute the stored equilibrium strategy for one in-progress state.
///
/// `successor_values` must contain every in-progress successor; a miss is
/// an ordering bug and fails the state. On LP failure the payoff matrix is
/// dumped to stderr so the position can be replayed.
pub fn solve_state(
    code: u32,
    successor_values: &HashMap<u32, f64>,
    draw_value: f64,
    precision: u32,
) -> Result<Strategy, SolverError> {
    let (chairs, matrix) = build_payoff_matrix(code, successor_values, draw_value)?;

    let (row_raw, col_raw, value) = match solve_matrix_game(&matrix) {
        Ok(result) => result,
        Err(SolverError::LpFailure { detail, .. }) => {
            eprintln!("LP failure for state {}:", to_hex(code));
            for row in &matrix {
                eprintln!("  {:?}", row);
            }
            return Err(SolverError::LpFailure {
                state: code,
                detail,
            });
        }
        Err(e) => return Err(e),
    };

    let row_probs: Vec<f64> = normalize(row_raw)
        .into_iter()
        .map(|p| round_to(p, precision))
        .collect();
    let col_probs: Vec<f64> = normalize(col_raw)
        .into_iter()
        .map(|p| round_to(p, precision))
        .collect();

    Ok(Strategy {
        p1_probs: scatter(&chairs, &row_probs),
        p2_probs: scatter(&chairs, &col_probs),
        value: round_to(value, precision),
        is_calculated: true,
    })
}

/// Check the best-response property of a claimed equilibrium: no pure row
/// beats `value` against the column mix, no pure column undercuts it
/// against the row mix, both within [`NASH_EPS`] (loosened by the rounding
/// granularity of the stored vectors).
pub fn verify_equilibrium(
    code: u32,
    matrix: &[Vec<f64>],
    row_probs: &[f64],
    col_probs: &[f64],
    value: f64,
    slack: f64,
) -> Result<(), SolverError> {
    let tolerance = NASH_EPS + slack;
    for row in matrix {
        let payoff: f64 = row.iter().zip(col_probs).map(|(m, y)| m * y).sum();
        if payoff > value + tolerance {
            return Err(SolverError::NashTolerance {
                state: code,
                excess: payoff - value,
            });
        }
    }
    for j in 0..matrix[0].len() {
        let payoff: f64 = matrix.iter().zip(row_probs).map(|(row, x)| row[j] * x).sum();
        if payoff < value - tolerance {
            return Err(SolverError::NashTolerance {
                state: code,
                excess: value - payoff,
            });
        }
    }
    Ok(())
}
