use std::env;
use std::process::ExitCode;

use itertools::Itertools;
use serde::Serialize;

use ks_cssd::build;
use ks_cssd::check;
use ks_cssd::serialize;
use ks_cssd::validate;
use ks_structure::Constraint;
use ks_structure::Model;

#[derive(Serialize)]
struct Summary {
    cssd: String,
    pos_var: String,
    canonical: String,
    canonical_pos_var: String,
    elements: usize,
    constraints: Vec<&'static str>,
    round_trip: bool,
    limits: Option<LimitsSummary>,
}

#[derive(Serialize)]
struct LimitsSummary {
    fp_lead_span: (u32, u32),
    stack_size: (u8, u8),
    stack_idist: (u32, u32),
    tp_trail_span: (u32, u32),
}

fn constraint_names(model: &Model) -> Vec<&'static str> {
    model
        .constraints()
        .map(|(_, c)| match c {
            Constraint::Pseudoknot(_) => "pseudoknot",
            Constraint::BaseTriple(_) => "base triple",
        })
        .collect()
}

fn main() -> ExitCode {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    args.retain(|a| a != "--json");

    let Some(cssd) = args.first() else {
        eprintln!("usage: cssd_check <cssd> [pos_var] [--json]");
        return ExitCode::FAILURE;
    };
    let pos_var = args.get(1).cloned().unwrap_or_default();

    if let Err(err) = validate(cssd, &pos_var) {
        eprintln!("invalid CSSD: {err}");
        return ExitCode::FAILURE;
    }

    let model = match build(cssd, &pos_var) {
        Ok(model) => model,
        Err(err) => {
            eprintln!("cannot build model: {err}");
            return ExitCode::FAILURE;
        }
    };

    let (canonical, canonical_pos_var) = match serialize(&model) {
        Ok(strings) => strings,
        Err(err) => {
            eprintln!("cannot stringify model: {err}");
            return ExitCode::FAILURE;
        }
    };

    let round_trip = check(cssd, &pos_var, &model);
    let limits = model.limits();

    if json {
        let summary = Summary {
            cssd: cssd.clone(),
            pos_var: pos_var.clone(),
            canonical,
            canonical_pos_var,
            elements: model.element_count(),
            constraints: constraint_names(&model),
            round_trip,
            limits: limits.map(|l| LimitsSummary {
                fp_lead_span: (l.fp_lead_min_span, l.fp_lead_max_span),
                stack_size: (l.stack_min_size, l.stack_max_size),
                stack_idist: (l.stack_min_idist, l.stack_max_idist),
                tp_trail_span: (l.tp_trail_min_span, l.tp_trail_max_span),
            }),
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{out}"),
            Err(err) => {
                eprintln!("cannot serialize summary: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{canonical}");
        if canonical_pos_var.trim_end().is_empty() {
            println!();
        } else {
            println!("{canonical_pos_var}");
        }
        println!(
            "{} elements, {} constraints [{}]",
            model.element_count(),
            model.constraint_count(),
            constraint_names(&model).iter().join(", ")
        );
        if let Some(l) = limits {
            println!(
                "lead {}..{}, stack {}..{}, idist {}..{}, trail {}..{}",
                l.fp_lead_min_span,
                l.fp_lead_max_span,
                l.stack_min_size,
                l.stack_max_size,
                l.stack_min_idist,
                l.stack_max_idist,
                l.tp_trail_min_span,
                l.tp_trail_max_span
            );
        }
    }

    if round_trip {
        ExitCode::SUCCESS
    } else {
        eprintln!("round-trip check failed: model does not reproduce its input");
        ExitCode::FAILURE
    }
}
