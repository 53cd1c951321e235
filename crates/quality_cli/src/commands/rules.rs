use anyhow::Result;
use colored::*;
use quality_core::EXIT_PASSED;
use quality_engine::{RuleFamily, RuleRegistry, global};

pub fn execute() -> Result<i32> {
    let registry = global();
    print_catalogue(&registry);
    Ok(EXIT_PASSED)
}

fn print_catalogue(registry: &RuleRegistry) {
    let groups = [
        (Some(RuleFamily::Row), "Row rules (checked per record)"),
        (Some(RuleFamily::Aggregate), "Aggregate rules (checked over the whole file)"),
        (Some(RuleFamily::CrossSource), "Cross-source rules (need a reference file)"),
        (None, "Custom rules"),
    ];

    for (family, title) in groups {
        let names: Vec<&str> = registry
            .names()
            .into_iter()
            .filter(|name| registry.family(name) == family)
            .collect();
        if names.is_empty() {
            continue;
        }
        println!("{}", title.bold());
        for name in names {
            println!("  {}", name);
        }
        println!();
    }
    println!("{} rule type(s) registered", registry.len());
}
