//! Terminal output utilities.

use crate::engine::Plan;
use colored::Colorize;
use itertools::Itertools;

/// Format a value as a quoted, right-aligned field.
///
/// # Arguments
/// * `value` - The value to format
/// * `width` - The minimum width of the field
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let value_str = value.to_string();
    let quoted = format!("\"{value_str}\"");
    if quoted.len() >= width {
        quoted
    } else {
        format!("{quoted:>width$}")
    }
}

/// One line per resource: index, type, name, parent.
pub fn summary_lines(plan: &Plan) -> Vec<String> {
    plan.resources
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{j},{type_token},{name},{parent}",
                j = format_field(i, 5),
                type_token = format_field(&r.type_token, 58),
                name = format_field(&r.name, 40),
                parent = format_field(r.parent.as_deref().unwrap_or("-"), 26),
            )
        })
        .collect()
}

/// Print the plan summary and outputs to stdout.
pub fn print_summary(plan: &Plan) {
    println!(
        "{} stack '{}' with {} resources",
        "PLAN".on_blue(),
        plan.stack,
        plan.resources.len()
    );
    for line in summary_lines(plan) {
        println!("{line}");
    }

    let counts = plan
        .resources
        .iter()
        .map(|r| r.type_token.as_str())
        .counts();
    let by_type = counts
        .iter()
        .sorted()
        .map(|(token, n)| format!("{n}x {token}"))
        .join(", ");
    log::info!("resource types: {by_type}");

    for (name, value) in &plan.outputs {
        println!("{} {name} = {value}", "OUTPUT".on_green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{props, ResourceOptions, ResourceType, Stack};

    #[test]
    fn test_format_field_short() {
        assert_eq!(format_field("test", 10), "    \"test\"");
    }

    #[test]
    fn test_format_field_long() {
        assert_eq!(format_field("long_value", 5), "\"long_value\"");
    }

    #[test]
    fn test_summary_lines() {
        let mut stack = Stack::new("test");
        let vpc = stack
            .declare(ResourceType::Vpc, "vpc-a", props([]), ResourceOptions::new())
            .unwrap();
        stack
            .declare(
                ResourceType::Subnet,
                "subnet-a",
                props([]),
                ResourceOptions::new().parent(vpc.id),
            )
            .unwrap();
        let lines = summary_lines(&stack.plan());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\"-\""));
        assert!(lines[1].contains("\"subnet-a\""));
        assert!(lines[1].ends_with("\"vpc-a\""));
    }
}
