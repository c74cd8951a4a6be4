//! Permutation builder: expand a parameter selection into concrete job specs.
//!
//! Fixed parameters are copied into every spec; choice parameters drive a
//! cartesian expansion. The first choice parameter varies slowest, each
//! parameter's values are enumerated in the order the caller supplied them.

use std::collections::BTreeMap;

use crate::run::JobSpec;

/// Errors reported synchronously to the caller; they never reach the executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermutationError {
    #[error("choice parameter {name} has no selected values")]
    EmptyChoice { name: String },
    #[error("generated {count} permutations, max allowed is {max}")]
    TooMany { count: usize, max: usize },
}

/// One choice-style parameter and the candidate values selected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceParam {
    pub name: String,
    pub values: Vec<String>,
}

/// Caller-supplied selection: fixed values plus ordered choice parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSelection {
    pub fixed: BTreeMap<String, String>,
    pub choices: Vec<ChoiceParam>,
}

impl ParameterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value applied unchanged to every permutation.
    pub fn fixed(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fixed.insert(name.into(), value.into());
        self
    }

    /// Append a choice dimension. Later calls nest inside earlier ones.
    pub fn choice<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices.push(ChoiceParam {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Number of permutations this selection expands to, saturating on overflow.
    pub fn permutation_count(&self) -> usize {
        self.choices
            .iter()
            .fold(1usize, |acc, c| acc.saturating_mul(c.values.len()))
    }
}

/// Expand `selection` into job specs, failing when more than `max_count`
/// would be generated. Never returns a truncated list.
pub fn build(selection: &ParameterSelection, max_count: usize) -> Result<Vec<JobSpec>, PermutationError> {
    if let Some(empty) = selection.choices.iter().find(|c| c.values.is_empty()) {
        return Err(PermutationError::EmptyChoice {
            name: empty.name.clone(),
        });
    }

    if selection.choices.is_empty() {
        return Ok(vec![JobSpec::new(selection.fixed.clone())]);
    }

    let count = selection.permutation_count();
    if count > max_count {
        return Err(PermutationError::TooMany {
            count,
            max: max_count,
        });
    }

    let mut out = Vec::with_capacity(count);
    // Odometer over value indices; the last dimension ticks fastest.
    let mut cursor = vec![0usize; selection.choices.len()];
    loop {
        let mut params = selection.fixed.clone();
        for (choice, &i) in selection.choices.iter().zip(&cursor) {
            params.insert(choice.name.clone(), choice.values[i].clone());
        }
        out.push(JobSpec::new(params));

        let mut dim = cursor.len();
        loop {
            if dim == 0 {
                return Ok(out);
            }
            dim -= 1;
            cursor[dim] += 1;
            if cursor[dim] < selection.choices[dim].values.len() {
                break;
            }
            cursor[dim] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pairs: &[(&str, &str)]) -> JobSpec {
        JobSpec::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn no_choices_yields_single_fixed_spec() {
        let sel = ParameterSelection::new().fixed("REASON", "maintenance");
        let specs = build(&sel, 20).unwrap();
        assert_eq!(specs, vec![spec(&[("REASON", "maintenance")])]);
    }

    #[test]
    fn empty_selection_yields_one_empty_spec() {
        let specs = build(&ParameterSelection::new(), 0).unwrap();
        assert_eq!(specs.len(), 1);
        assert!(specs[0].params().is_empty());
    }

    #[test]
    fn region_action_scenario_order() {
        let sel = ParameterSelection::new()
            .fixed("REASON", "maintenance")
            .choice("REGION", ["US", "EU"])
            .choice("ACTION", ["drain", "reload"]);
        let specs = build(&sel, 20).unwrap();
        assert_eq!(
            specs,
            vec![
                spec(&[("REGION", "US"), ("ACTION", "drain"), ("REASON", "maintenance")]),
                spec(&[("REGION", "US"), ("ACTION", "reload"), ("REASON", "maintenance")]),
                spec(&[("REGION", "EU"), ("ACTION", "drain"), ("REASON", "maintenance")]),
                spec(&[("REGION", "EU"), ("ACTION", "reload"), ("REASON", "maintenance")]),
            ]
        );
    }

    #[test]
    fn product_size_and_fixed_values_everywhere() {
        let sel = ParameterSelection::new()
            .fixed("A", "1")
            .fixed("B", "2")
            .choice("X", ["x1", "x2", "x3"])
            .choice("Y", ["y1", "y2"])
            .choice("Z", ["z1", "z2"]);
        let specs = build(&sel, 100).unwrap();
        assert_eq!(specs.len(), 12);
        for s in &specs {
            assert_eq!(s.get("A"), Some("1"));
            assert_eq!(s.get("B"), Some("2"));
            assert_eq!(s.params().len(), 5);
        }
    }

    #[test]
    fn values_keep_caller_order() {
        let sel = ParameterSelection::new().choice("ENV", ["zeta", "alpha", "mid"]);
        let specs = build(&sel, 10).unwrap();
        let envs: Vec<_> = specs.iter().map(|s| s.get("ENV").unwrap()).collect();
        assert_eq!(envs, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn choice_value_wins_over_fixed() {
        let sel = ParameterSelection::new()
            .fixed("MODE", "fixed")
            .choice("MODE", ["a", "b"]);
        let specs = build(&sel, 10).unwrap();
        assert_eq!(specs[0].get("MODE"), Some("a"));
        assert_eq!(specs[1].get("MODE"), Some("b"));
    }

    #[test]
    fn over_limit_fails_without_partial_result() {
        let sel = ParameterSelection::new()
            .choice("A", ["1", "2", "3"])
            .choice("B", ["1", "2", "3"]);
        let err = build(&sel, 8).unwrap_err();
        assert_eq!(err, PermutationError::TooMany { count: 9, max: 8 });
        let msg = err.to_string();
        assert!(msg.contains('9') && msg.contains('8'), "{msg}");
    }

    #[test]
    fn exactly_at_limit_is_allowed() {
        let sel = ParameterSelection::new().choice("A", ["1", "2", "3", "4"]);
        assert_eq!(build(&sel, 4).unwrap().len(), 4);
    }

    #[test]
    fn huge_product_saturates_instead_of_overflowing() {
        let values: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
        let mut sel = ParameterSelection::new();
        for n in 0..10 {
            sel = sel.choice(format!("P{n}"), values.clone());
        }
        assert_eq!(sel.permutation_count(), usize::MAX);
        assert!(matches!(build(&sel, 20), Err(PermutationError::TooMany { .. })));
    }

    #[test]
    fn empty_choice_names_parameter() {
        let sel = ParameterSelection::new()
            .choice("REGION", ["US"])
            .choice("ACTION", Vec::<String>::new());
        let err = build(&sel, 20).unwrap_err();
        assert_eq!(
            err,
            PermutationError::EmptyChoice {
                name: "ACTION".into()
            }
        );
        assert!(err.to_string().contains("ACTION"));
    }

    #[test]
    fn repeated_builds_are_identical() {
        let sel = ParameterSelection::new()
            .fixed("F", "v")
            .choice("B", ["2", "1"])
            .choice("A", ["y", "x"]);
        assert_eq!(build(&sel, 20).unwrap(), build(&sel, 20).unwrap());
    }
}
