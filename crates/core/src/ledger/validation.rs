//! Business rule validation for journal lines.

use corebook_shared::types::rounding_tolerance;
use rust_decimal::Decimal;

use super::error::ValidationError;
use super::types::JournalLine;

/// Entry-currency totals of a validated journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    /// Total debit.
    pub debit: Decimal,
    /// Total credit.
    pub credit: Decimal,
}

/// Validates the double-entry rules of a journal's lines.
///
/// Lines must be at least two, numbered densely from 1 (in any order), set exactly one
/// positive side each, and balance in entry currency.
///
/// # Errors
///
/// Returns the first rule violation found.
pub fn validate_lines(lines: &[JournalLine]) -> Result<LineTotals, ValidationError> {
    if lines.len() < 2 {
        return Err(ValidationError::InsufficientLines { count: lines.len() });
    }

    let mut numbers: Vec<u32> = lines.iter().map(|l| l.line_number).collect();
    numbers.sort_unstable();
    for (expected, found) in (1u32..).zip(numbers) {
        if expected != found {
            return Err(ValidationError::LineNumbering { expected, found });
        }
    }

    let mut debit = Decimal::ZERO;
    let mut credit = Decimal::ZERO;

    for line in lines {
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(ValidationError::NegativeAmount {
                line_number: line.line_number,
            });
        }
        match (line.debit.is_zero(), line.credit.is_zero()) {
            (false, false) => {
                return Err(ValidationError::BothSides {
                    line_number: line.line_number,
                });
            }
            (true, true) => {
                return Err(ValidationError::ZeroAmount {
                    line_number: line.line_number,
                });
            }
            _ => {}
        }
        debit += line.debit;
        credit += line.credit;
    }

    if debit != credit {
        return Err(ValidationError::Unbalanced { debit, credit });
    }

    Ok(LineTotals { debit, credit })
}

/// Checks that converted functional amounts still balance within rounding tolerance.
///
/// # Errors
///
/// Returns `FunctionalImbalance` when the residue exceeds half a unit per line.
pub fn validate_functional_balance(lines: &[JournalLine]) -> Result<(), ValidationError> {
    let debit: Decimal = lines.iter().map(|l| l.functional_debit).sum();
    let credit: Decimal = lines.iter().map(|l| l.functional_credit).sum();
    let tolerance = rounding_tolerance(lines.len());

    if (debit - credit).abs() > tolerance {
        return Err(ValidationError::FunctionalImbalance {
            debit,
            credit,
            tolerance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebook_shared::types::{AccountId, JournalId};
    use rust_decimal_macros::dec;

    fn line(line_number: u32, debit: Decimal, credit: Decimal) -> JournalLine {
        let mut line = JournalLine::debit(JournalId::new(), line_number, AccountId::new(), debit, "USD");
        line.credit = credit;
        line
    }

    #[test]
    fn test_balanced_lines() {
        let lines = vec![line(1, dec!(100.00), dec!(0)), line(2, dec!(0), dec!(100.00))];
        let totals = validate_lines(&lines).unwrap();
        assert_eq!(totals.debit, dec!(100.00));
        assert_eq!(totals.credit, dec!(100.00));
    }

    #[test]
    fn test_unbalanced_lines() {
        let lines = vec![line(1, dec!(100.00), dec!(0)), line(2, dec!(0), dec!(50.00))];
        assert!(matches!(
            validate_lines(&lines),
            Err(ValidationError::Unbalanced { .. })
        ));
    }

    #[test]
    fn test_single_line_rejected() {
        let lines = vec![line(1, dec!(100.00), dec!(0))];
        assert_eq!(
            validate_lines(&lines),
            Err(ValidationError::InsufficientLines { count: 1 })
        );
    }

    #[test]
    fn test_both_sides_rejected() {
        let lines = vec![line(1, dec!(100.00), dec!(100.00)), line(2, dec!(0), dec!(0))];
        assert_eq!(
            validate_lines(&lines),
            Err(ValidationError::BothSides { line_number: 1 })
        );
    }

    #[test]
    fn test_zero_line_rejected() {
        let lines = vec![
            line(1, dec!(100.00), dec!(0)),
            line(2, dec!(0), dec!(0)),
            line(3, dec!(0), dec!(100.00)),
        ];
        assert_eq!(
            validate_lines(&lines),
            Err(ValidationError::ZeroAmount { line_number: 2 })
        );
    }

    #[test]
    fn test_negative_rejected() {
        let lines = vec![line(1, dec!(-10), dec!(0)), line(2, dec!(-10), dec!(0))];
        assert_eq!(
            validate_lines(&lines),
            Err(ValidationError::NegativeAmount { line_number: 1 })
        );
    }

    #[test]
    fn test_gap_in_numbering_rejected() {
        let lines = vec![line(1, dec!(10), dec!(0)), line(3, dec!(0), dec!(10))];
        assert_eq!(
            validate_lines(&lines),
            Err(ValidationError::LineNumbering {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_unordered_dense_numbering_accepted() {
        let lines = vec![line(2, dec!(10), dec!(0)), line(1, dec!(0), dec!(10))];
        assert!(validate_lines(&lines).is_ok());
    }

    #[test]
    fn test_functional_residue_within_tolerance() {
        let mut lines = vec![
            line(1, dec!(1), dec!(0)),
            line(2, dec!(1), dec!(0)),
            line(3, dec!(0), dec!(2)),
        ];
        lines[0].functional_debit = dec!(0.3333);
        lines[1].functional_debit = dec!(0.3333);
        lines[2].functional_credit = dec!(0.6667);
        assert!(validate_functional_balance(&lines).is_ok());

        lines[2].functional_credit = dec!(0.6700);
        assert!(matches!(
            validate_functional_balance(&lines),
            Err(ValidationError::FunctionalImbalance { .. })
        ));
    }
}
