//! `filigree doctor` -- cheap project health check: the same
//! schema-version lookup `init_schema` performs at startup, plus config
//! parseability and template self-checks (spec §12 "doctor-lite").

use anyhow::Result;
use filigree_storage::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

use crate::context::RuntimeContext;
use crate::output::output_json;

#[derive(Debug, Serialize)]
struct DoctorReport {
    filigree_dir: String,
    config_ok: bool,
    schema_version: i64,
    schema_current: i64,
    schema_drift: bool,
    template_problems: Vec<String>,
    healthy: bool,
}

pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let root = ctx.project_root()?;
    let filigree_dir = root.join(".filigree");

    let config_ok = filigree_config::load_config(&root).is_ok();

    let store = ctx.open_store()?;
    let schema_version = store.schema_version_impl().map_err(filigree_core::error::FiligreeError::from)?;
    let schema_drift = schema_version != CURRENT_SCHEMA_VERSION;

    let mut template_problems = Vec::new();
    match ctx.load_registry() {
        Ok(registry) => {
            let snapshot = registry.current();
            for type_name in snapshot.known_types() {
                if let Some(template) = snapshot.get_template(type_name) {
                    for problem in template.self_check() {
                        template_problems.push(format!("{type_name}: {problem}"));
                    }
                }
            }
        }
        Err(e) => template_problems.push(format!("failed to load template registry: {e}")),
    }

    let healthy = config_ok && !schema_drift && template_problems.is_empty();

    let report = DoctorReport {
        filigree_dir: filigree_dir.display().to_string(),
        config_ok,
        schema_version,
        schema_current: CURRENT_SCHEMA_VERSION,
        schema_drift,
        template_problems,
        healthy,
    };

    if ctx.json {
        output_json(&report);
    } else {
        println!("filigree_dir: {}", report.filigree_dir);
        println!("config: {}", if report.config_ok { "ok" } else { "INVALID" });
        println!(
            "schema: {} (current: {}){}",
            report.schema_version,
            report.schema_current,
            if report.schema_drift { " DRIFT" } else { "" }
        );
        if report.template_problems.is_empty() {
            println!("templates: ok");
        } else {
            println!("templates:");
            for p in &report.template_problems {
                println!("  {p}");
            }
        }
        println!("healthy: {}", report.healthy);
    }

    if !healthy {
        anyhow::bail!("doctor found issues");
    }
    Ok(())
}
