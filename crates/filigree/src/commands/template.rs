//! `filigree template` -- read-only workflow introspection over the
//! template registry (spec §4.3/C3, §6 tool-call surface).

use anyhow::{Result, anyhow};
use filigree_core::issue::IssueBuilder;
use filigree_templates::transition::get_valid_transitions;

use crate::cli::{TemplateArgs, TemplateCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &TemplateArgs) -> Result<()> {
    match &args.command {
        TemplateCommands::ListTypes => run_list_types(ctx),
        TemplateCommands::TypeInfo { type_name } => run_type_info(ctx, type_name),
        TemplateCommands::ValidTransitions { type_name, state } => run_valid_transitions(ctx, type_name, state),
        TemplateCommands::ExplainState { type_name, state } => run_explain_state(ctx, type_name, state),
        TemplateCommands::WorkflowGuide { type_name } => run_workflow_guide(ctx, type_name),
        TemplateCommands::WorkflowStates { type_name } => run_workflow_states(ctx, type_name),
    }
}

fn run_list_types(ctx: &RuntimeContext) -> Result<()> {
    let registry = ctx.load_registry()?;
    let snapshot = registry.current();
    let types = snapshot.known_types();

    if ctx.json {
        output_json(&types);
    } else {
        for t in &types {
            println!("{t}");
        }
    }
    Ok(())
}

fn run_type_info(ctx: &RuntimeContext, type_name: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let snapshot = registry.current();
    let template = snapshot
        .get_template(type_name)
        .ok_or_else(|| anyhow!("unknown type: {type_name:?}"))?;

    if ctx.json {
        output_json(template);
    } else {
        println!("{} ({})", template.display_name, template.type_name);
        println!("{}", template.description);
        println!("initial state: {}", template.initial_state);
        println!("states:");
        for s in &template.states {
            println!("  {} [{}]", s.name, s.category.as_str());
        }
        println!("transitions:");
        for t in &template.transitions {
            println!(
                "  {} -> {} ({:?}) requires {:?}",
                t.from_state, t.to_state, t.enforcement, t.requires_fields
            );
        }
    }
    Ok(())
}

/// A stand-in issue used purely to evaluate `requires_fields` readiness
/// against an arbitrary state, since `get_valid_transitions` is normally
/// evaluated against a real issue's current field values.
fn probe_issue(type_name: &str, state: &str) -> filigree_core::issue::Issue {
    IssueBuilder::new("(probe)").issue_type(type_name).status(state).build()
}

fn run_valid_transitions(ctx: &RuntimeContext, type_name: &str, state: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let snapshot = registry.current();
    let template = snapshot
        .get_template(type_name)
        .ok_or_else(|| anyhow!("unknown type: {type_name:?}"))?;
    let issue = probe_issue(type_name, state);
    let transitions = get_valid_transitions(template, &issue);

    if ctx.json {
        output_json(&serde_json::json!(
            transitions
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "to": t.to,
                        "category": t.category.as_str(),
                        "enforcement": format!("{:?}", t.enforcement).to_lowercase(),
                        "requires_fields": t.requires_fields,
                        "missing_fields": t.missing_fields,
                        "ready": t.ready,
                    })
                })
                .collect::<Vec<_>>()
        ));
    } else if transitions.is_empty() {
        println!("No outbound transitions from {state:?}.");
    } else {
        for t in &transitions {
            println!(
                "{} -> {} [{}] requires {:?} (ready: {})",
                state,
                t.to,
                t.category.as_str(),
                t.requires_fields,
                t.ready
            );
        }
    }
    Ok(())
}

fn run_explain_state(ctx: &RuntimeContext, type_name: &str, state: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let snapshot = registry.current();
    let template = snapshot
        .get_template(type_name)
        .ok_or_else(|| anyhow!("unknown type: {type_name:?}"))?;
    let category = template.category_of(state);
    let issue = probe_issue(type_name, state);
    let outbound = get_valid_transitions(template, &issue);
    let required_here: Vec<&str> = template
        .field_schema
        .iter()
        .filter(|f| f.required_at.as_deref() == Some(state))
        .map(|f| f.name.as_str())
        .collect();

    if ctx.json {
        output_json(&serde_json::json!({
            "type": type_name,
            "state": state,
            "category": category.as_str(),
            "required_fields": required_here,
            "reachable_states": outbound.iter().map(|t| t.to.clone()).collect::<Vec<_>>(),
        }));
    } else {
        println!("{type_name}.{state} [{}]", category.as_str());
        if !required_here.is_empty() {
            println!("  required fields here: {required_here:?}");
        }
        println!(
            "  reachable states: {:?}",
            outbound.iter().map(|t| t.to.as_str()).collect::<Vec<_>>()
        );
    }
    Ok(())
}

fn run_workflow_guide(ctx: &RuntimeContext, type_name: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let snapshot = registry.current();
    let template = snapshot
        .get_template(type_name)
        .ok_or_else(|| anyhow!("unknown type: {type_name:?}"))?;

    let mut guide = String::new();
    guide.push_str(&format!("# {}\n\n{}\n\n", template.display_name, template.description));
    guide.push_str(&format!("Initial state: `{}`\n\n", template.initial_state));
    guide.push_str("## States\n\n");
    for s in &template.states {
        guide.push_str(&format!("- `{}` ({})\n", s.name, s.category.as_str()));
    }
    guide.push_str("\n## Transitions\n\n");
    for t in &template.transitions {
        let enforcement = if t.enforcement == filigree_core::template::Enforcement::Hard {
            "hard"
        } else {
            "soft"
        };
        guide.push_str(&format!("- `{}` → `{}` ({enforcement}", t.from_state, t.to_state));
        if !t.requires_fields.is_empty() {
            guide.push_str(&format!(", requires {:?}", t.requires_fields));
        }
        guide.push_str(")\n");
    }

    if ctx.json {
        output_json(&serde_json::json!({ "type": type_name, "guide": guide }));
    } else {
        println!("{guide}");
    }
    Ok(())
}

fn run_workflow_states(ctx: &RuntimeContext, type_name: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let snapshot = registry.current();
    let template = snapshot
        .get_template(type_name)
        .ok_or_else(|| anyhow!("unknown type: {type_name:?}"))?;

    if ctx.json {
        output_json(&template.states);
    } else {
        for s in &template.states {
            println!("{} [{}]", s.name, s.category.as_str());
        }
    }
    Ok(())
}
