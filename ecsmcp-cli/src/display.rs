//! Terminal rendering of plans, apply results and diffs

use std::path::Path;

use colored::{ColoredString, Colorize};
use similar::{ChangeTag, TextDiff};

use ecsmcp_aws::nag::NagReport;
use ecsmcp_aws::routing::Action;
use ecsmcp_core::differ::find_changed_attributes;
use ecsmcp_core::effect::Effect;
use ecsmcp_core::interpreter::{ApplyResult, EffectOutcome};
use ecsmcp_core::plan::{GroupedPlan, Plan};
use ecsmcp_core::resource::{Resource, Value};

pub fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    let grouped = GroupedPlan::from_plan(plan.clone());
    for group in grouped.group_names() {
        println!("  {}", group.bold());
        for effect in grouped.effects_in(group) {
            print_effect(effect);
        }
        println!();
    }

    let summary = plan.summary();
    let mut line = format!(
        "Plan: {} to add, {} to change, {} to destroy",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.delete.to_string().red()
    );
    if summary.retain > 0 {
        line.push_str(&format!(", {} to retain", summary.retain.to_string().blue()));
    }
    println!("{}.", line);
}

fn effect_symbol(effect: &Effect) -> ColoredString {
    match effect {
        Effect::Create(_) => "+".green().bold(),
        Effect::Update { .. } => "~".yellow().bold(),
        Effect::Delete { retain: true, .. } => "=".blue().bold(),
        Effect::Delete { .. } => "-".red().bold(),
        Effect::Read(_) => "?".normal(),
    }
}

fn print_effect(effect: &Effect) {
    let id = effect.resource_id();
    println!(
        "    {} {} {}",
        effect_symbol(effect),
        id.resource_type.cyan(),
        id.name.bold()
    );

    let attr_prefix = "        ";
    match effect {
        Effect::Create(resource) => {
            for (key, value) in sorted_attributes(resource) {
                println!("{}{}: {}", attr_prefix, key, format_value(value).green());
            }
        }
        Effect::Update { from, to, .. } => {
            for key in find_changed_attributes(&to.attributes, &from.attributes) {
                let old = from
                    .attributes
                    .get(&key)
                    .map(format_value)
                    .unwrap_or_else(|| "(none)".to_string());
                let new = to.attributes.get(&key).map(format_value).unwrap_or_default();
                println!("{}{}: {} → {}", attr_prefix, key, old.red(), new.green());
            }
        }
        Effect::Delete {
            identifier, retain, ..
        } => {
            let note = if *retain {
                "released, physical resource kept".blue()
            } else {
                identifier.red()
            };
            println!("{}{}", attr_prefix, note);
        }
        Effect::Read(_) => {}
    }
}

fn sorted_attributes(resource: &Resource) -> Vec<(&String, &Value)> {
    let mut attributes: Vec<_> = resource.provider_attributes().collect();
    attributes.sort_by(|a, b| a.0.cmp(b.0));
    attributes
}

pub fn format_effect(effect: &Effect) -> String {
    let verb = match effect {
        Effect::Create(_) => "Create",
        Effect::Update { .. } => "Update",
        Effect::Delete { retain: true, .. } => "Retain",
        Effect::Delete { .. } => "Delete",
        Effect::Read(_) => "Read",
    };
    format!("{} {}", verb, effect.resource_id())
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(target, attr) => format!("{}.{}", target, attr),
        Value::Join(parts) => {
            let strs: Vec<_> = parts.iter().map(format_value).collect();
            format!("join({})", strs.join(", "))
        }
    }
}

/// One line per effect, then the totals
pub fn print_apply_result(plan: &Plan, result: &ApplyResult, verb: &str) {
    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(EffectOutcome::Skipped { reason, .. }) => {
                println!("  {} {} ({})", "·".dimmed(), format_effect(effect), reason.dimmed());
            }
            Ok(_) => println!("  {} {}", "✓".green(), format_effect(effect)),
            Err(e) => println!("  {} {} - {}", "✗".red(), format_effect(effect), e),
        }
    }

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!(
                "{} complete! {} succeeded, {} skipped.",
                verb, result.success_count, result.skipped_count
            )
            .green()
            .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "{} failed. {} succeeded, {} failed, {} skipped.",
                verb, result.success_count, result.failure_count, result.skipped_count
            )
            .red()
            .bold()
        );
    }
}

pub fn print_suppressions(report: &NagReport) {
    let suppressed = report.suppressed();
    if suppressed.is_empty() {
        return;
    }
    println!("{}", format!("{} suppressed findings:", suppressed.len()).yellow());
    for finding in suppressed {
        println!(
            "  • {} ({})",
            finding,
            finding.suppressed.as_deref().unwrap_or_default().dimmed()
        );
    }
}

pub fn print_action(action: &Action) {
    match action {
        Action::Forward { target_group } => {
            println!("{} {}", "forward →".green().bold(), target_group);
        }
        Action::FixedResponse {
            status_code,
            content_type,
            body,
        } => {
            println!("{} {}", "fixed-response".yellow().bold(), status_code);
            if let Some(content_type) = content_type {
                println!("  Content-Type: {}", content_type);
            }
            if let Some(body) = body {
                println!("  {}", body);
            }
        }
    }
}

pub fn print_diff(file: &Path, original: &str, current: &str) {
    println!("{} {}:", "Diff against".cyan().bold(), file.display());

    let diff = TextDiff::from_lines(original, current);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("{}{}", sign, change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsmcp_core::resource::ResourceId;

    #[test]
    fn values_render_deterministically() {
        let value = Value::map([
            ("b", Value::Int(2)),
            ("a", Value::List(vec![Value::string("x"), Value::Bool(true)])),
        ]);
        assert_eq!(format_value(&value), r#"{a: ["x", true], b: 2}"#);
        assert_eq!(format_value(&Value::attr_of("LoadBalancer", "dns_name")), "LoadBalancer.dns_name");
        assert_eq!(
            format_value(&Value::Join(vec![Value::string("a"), Value::ref_of("B")])),
            r#"join("a", B.ref)"#
        );
    }

    #[test]
    fn retained_deletes_read_as_retain() {
        let effect = Effect::Delete {
            id: ResourceId::new("s3.bucket", "StorageAccessLogs"),
            identifier: "bucket-name".to_string(),
            retain: true,
            path: None,
        };
        assert_eq!(format_effect(&effect), "Retain s3.bucket.StorageAccessLogs");
    }
}
