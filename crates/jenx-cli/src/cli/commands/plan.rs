//! `jenx plan` – print the permutation table for a selection.

use anyhow::Result;
use jenx_core::config::JenxConfig;
use jenx_core::run::JobSpec;

use crate::cli::{args, SelectionArgs};

pub fn run_plan(cfg: &JenxConfig, selection: &SelectionArgs) -> Result<()> {
    let specs = args::build_specs(selection, cfg.max_permutations)?;
    print_specs(&specs);
    println!("{} permutation(s)", specs.len());
    Ok(())
}

/// One row per spec, one column per parameter name.
pub(super) fn print_specs(specs: &[JobSpec]) {
    let Some(first) = specs.first() else {
        return;
    };
    let names: Vec<&String> = first.params().keys().collect();
    let widths: Vec<usize> = names
        .iter()
        .map(|name| {
            specs
                .iter()
                .filter_map(|s| s.get(name))
                .map(str::len)
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut header = format!("{:>4}", "#");
    for (name, w) in names.iter().zip(&widths) {
        header.push_str(&format!("  {:<w$}", name, w = *w));
    }
    println!("{}", header.trim_end());
    for (i, spec) in specs.iter().enumerate() {
        let mut row = format!("{:>4}", i + 1);
        for (name, w) in names.iter().zip(&widths) {
            row.push_str(&format!("  {:<w$}", spec.get(name).unwrap_or(""), w = *w));
        }
        println!("{}", row.trim_end());
    }
}
