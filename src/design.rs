//! Factor levels and effect selection for an M-way repeated-measures design.
//!
//! Effects are enumerated in hierarchical order, the same order
//! `mne.stats.f_mway_rm` returns them in:
//!
//! ```text
//! effect #  1  2  3    4  5    6    7
//! name      A  B  A:B  C  A:C  B:C  A:B:C
//! ```
//!
//! Effect number `k` (1-based) contains factor `i` iff bit `i` of `k` is set,
//! so the selection index `k - 1` doubles as a dispatch key for the
//! statistical routine.
//!
//! Effect strings use the R formula notation:
//!
//! | spec      | selects                                         |
//! |-----------|-------------------------------------------------|
//! | `"all"`   | every effect                                    |
//! | `"A"`     | main effect of A                                |
//! | `"A:B"`   | the A×B interaction only                        |
//! | `"A+B"`   | the listed effects, in the order given          |
//! | `"A*B"`   | every effect up to and including `A:B`          |
use std::fmt;

use crate::error::DesignError;

const FACTOR_NAMES: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of levels of each experimental factor, e.g. `[2, 2]`.
///
/// The product of the levels is the size of the conditions axis of the
/// observation tensor. Conditions are ordered with the *last* factor varying
/// fastest: for `[2, 2]` the order is `A1B1, A1B2, A2B1, A2B2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorLevels(Vec<usize>);

impl FactorLevels {
    pub fn new(levels: Vec<usize>) -> Result<Self, DesignError> {
        if levels.is_empty() {
            return Err(DesignError::NoFactors);
        }
        if levels.len() > FACTOR_NAMES.len() {
            return Err(DesignError::TooManyFactors(levels.len()));
        }
        if let Some(index) = levels.iter().position(|&l| l == 0) {
            return Err(DesignError::ZeroLevels { index });
        }
        if levels.iter().try_fold(1usize, |acc, &l| acc.checked_mul(l)).is_none() {
            return Err(DesignError::ConditionOverflow(levels));
        }
        Ok(Self(levels))
    }

    /// Number of factors.
    pub fn n_factors(&self) -> usize {
        self.0.len()
    }

    /// Product of all factor levels; checked against overflow on
    /// construction.
    pub fn n_conditions(&self) -> usize {
        self.0.iter().product()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for FactorLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|l| l.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Name of the effect with 0-based hierarchical index `index`.
fn effect_name(index: usize) -> String {
    let code = index + 1;
    (0..FACTOR_NAMES.len())
        .filter(|bit| code & (1 << bit) != 0)
        .map(|bit| (FACTOR_NAMES[bit] as char).to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// All effect names for `n_factors` factors, in hierarchical order.
pub fn effect_names(n_factors: usize) -> Vec<String> {
    let n_factors = n_factors.min(FACTOR_NAMES.len());
    (0..(1usize << n_factors) - 1).map(effect_name).collect()
}

/// A parsed effect selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effects {
    spec:      String,
    n_factors: usize,
    /// 0-based hierarchical effect indices, in output order.
    selection: Vec<usize>,
    names:     Vec<String>,
}

impl Effects {
    /// Parse an effect string for a design with `n_factors` factors.
    pub fn parse(spec: &str, n_factors: usize) -> Result<Self, DesignError> {
        if n_factors == 0 {
            return Err(DesignError::NoFactors);
        }
        if n_factors > FACTOR_NAMES.len() {
            return Err(DesignError::TooManyFactors(n_factors));
        }
        let spec = spec.trim();
        for op in ['*', '+'] {
            if spec.contains(op) && spec.contains(':') {
                return Err(DesignError::MixedOperators(spec.to_string(), op));
            }
        }

        let all = effect_names(n_factors);
        let lookup = |name: &str| -> Result<usize, DesignError> {
            let name = name.trim();
            all.iter().position(|n| n == name).ok_or_else(|| DesignError::UnknownEffect {
                name:  name.to_string(),
                valid: all.clone(),
            })
        };

        let selection: Vec<usize> = if spec == "all" {
            (0..all.len()).collect()
        } else if spec.len() == 1 || spec.contains(':') {
            vec![lookup(spec)?]
        } else if spec.contains('+') {
            spec.split('+').map(lookup).collect::<Result<_, _>>()?
        } else if spec.contains('*') {
            // Hierarchical: everything up to the fully crossed term.
            let stop = lookup(&spec.replace('*', ":"))?;
            (0..=stop).collect()
        } else {
            return Err(DesignError::InvalidEffects(spec.to_string()));
        };

        let names = selection.iter().map(|&i| all[i].clone()).collect();
        Ok(Self { spec: spec.to_string(), n_factors, selection, names })
    }

    /// The original effect string.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    pub fn len(&self) -> usize {
        self.selection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// 0-based hierarchical indices of the selected effects.
    pub fn indices(&self) -> &[usize] {
        &self.selection
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Factor indices taking part in the `i`-th selected effect.
    pub fn factors(&self, i: usize) -> Vec<usize> {
        let code = self.selection[i] + 1;
        (0..self.n_factors).filter(|bit| code & (1 << bit) != 0).collect()
    }
}

impl fmt::Display for Effects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.spec, self.names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_hierarchical_order() {
        assert_eq!(effect_names(2), vec!["A", "B", "A:B"]);
        assert_eq!(
            effect_names(3),
            vec!["A", "B", "A:B", "C", "A:C", "B:C", "A:B:C"],
        );
    }

    #[test]
    fn level_product_overflow_rejected() {
        let huge = vec![usize::MAX / 2, 3];
        assert_eq!(FactorLevels::new(huge.clone()), Err(DesignError::ConditionOverflow(huge)));
        assert_eq!(FactorLevels::new(vec![2, 3, 4]).unwrap().n_conditions(), 24);
    }

    #[test]
    fn star_selects_up_to_interaction() {
        let e = Effects::parse("A*B", 2).unwrap();
        assert_eq!(e.indices(), &[0, 1, 2]);
        assert_eq!(e.names(), &["A", "B", "A:B"]);

        // A*B in a 3-factor design stops before C.
        let e = Effects::parse("A*B", 3).unwrap();
        assert_eq!(e.names(), &["A", "B", "A:B"]);
    }

    #[test]
    fn colon_selects_single_interaction() {
        let e = Effects::parse("A:B", 2).unwrap();
        assert_eq!(e.indices(), &[2]);
        assert_eq!(e.factors(0), vec![0, 1]);
    }

    #[test]
    fn plus_keeps_given_order() {
        let e = Effects::parse("B+A", 2).unwrap();
        assert_eq!(e.names(), &["B", "A"]);
    }

    #[test]
    fn mixed_operators_rejected() {
        assert!(matches!(
            Effects::parse("A*B:C", 3),
            Err(DesignError::MixedOperators(_, '*'))
        ));
        assert!(matches!(
            Effects::parse("A+B:C", 3),
            Err(DesignError::MixedOperators(_, '+'))
        ));
    }

    #[test]
    fn unknown_factor_rejected() {
        assert!(matches!(
            Effects::parse("C", 2),
            Err(DesignError::UnknownEffect { .. })
        ));
        assert!(matches!(
            Effects::parse("AB", 2),
            Err(DesignError::InvalidEffects(_))
        ));
    }

    #[test]
    fn factor_levels_validate() {
        assert_eq!(FactorLevels::new(vec![2, 3]).unwrap().n_conditions(), 6);
        assert_eq!(FactorLevels::new(vec![]), Err(DesignError::NoFactors));
        assert_eq!(
            FactorLevels::new(vec![2, 0]),
            Err(DesignError::ZeroLevels { index: 1 })
        );
    }
}
