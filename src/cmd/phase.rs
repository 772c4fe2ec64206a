//! Phase listing, status, transition and completeness commands.

use anyhow::{Result, anyhow};
use auditflow::completeness::Completeness;
use auditflow::config::AuditflowConfig;
use auditflow::errors::TransitionError;
use auditflow::phase::{Phase, PhaseId};
use auditflow::store::PhaseStore;
use auditflow::workflow::{PhaseController, TransitionRequest, WorkflowView};
use serde::Serialize;

use super::{fatal, load_controller, open_db, print_json};

#[derive(Serialize)]
struct TransitionOutput<'a> {
    project_id: i64,
    from: &'a Phase,
    to: &'a Phase,
}

#[derive(Serialize)]
struct CompletenessOutput {
    project_id: i64,
    phase: PhaseId,
    completeness: Completeness,
}

pub fn cmd_phases(config: &AuditflowConfig, json: bool) -> Result<()> {
    let registry = config.registry();
    if json {
        return print_json(&registry.phases());
    }

    println!("{:<4} {:<12} {:<14} Completeness field", "#", "ID", "Name");
    println!(
        "{:<4} {:<12} {:<14} ------------------",
        "----", "------------", "--------------"
    );
    for phase in registry.phases() {
        println!(
            "{:<4} {:<12} {:<14} {}",
            phase.ordinal + 1,
            phase.id,
            phase.display_name,
            phase.completeness_field_key
        );
    }
    Ok(())
}

pub async fn cmd_status(config: &AuditflowConfig, project_id: i64, json: bool) -> Result<()> {
    let controller = load_controller(config, project_id).await?;
    let view = controller.view().await.map_err(fatal)?;

    if json {
        return print_json(&view);
    }
    print_view(&view);
    Ok(())
}

fn print_view(view: &WorkflowView) {
    println!();
    println!(
        "{}",
        console::style(format!("Audit project {}", view.project_id))
            .bold()
            .cyan()
    );
    println!("Current phase: {}", view.current.display_name);
    println!();

    for status in &view.phases {
        let marker = if status.is_current { "▶" } else { " " };
        let access = if status.is_accessible() {
            console::style("accessible").green()
        } else {
            console::style("locked").dim()
        };
        println!(
            "  {} {:<14} {:>5}  {}",
            marker,
            status.phase.display_name,
            status.completeness.to_string(),
            access
        );
    }
    println!();

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("Can advance: {}", yes_no(view.can_advance));
    println!("Can retreat: {}", yes_no(view.can_retreat));
    println!();
}

pub async fn cmd_advance(
    config: &AuditflowConfig,
    project_id: i64,
    expected: Option<&str>,
    json: bool,
) -> Result<()> {
    let expected = parse_expected(expected)?;
    let controller = load_controller(config, project_id).await?;
    let from = controller.current_phase().clone();
    let to = match expected {
        Some(target) => controller.apply(TransitionRequest::advance_to(target)).await,
        None => controller.advance().await,
    }
    .map_err(rejected)?;
    report_transition(&controller, &from, &to, json)
}

pub async fn cmd_retreat(
    config: &AuditflowConfig,
    project_id: i64,
    expected: Option<&str>,
    json: bool,
) -> Result<()> {
    let expected = parse_expected(expected)?;
    let controller = load_controller(config, project_id).await?;
    let from = controller.current_phase().clone();
    let to = match expected {
        Some(target) => controller.apply(TransitionRequest::retreat_to(target)).await,
        None => controller.retreat().await,
    }
    .map_err(rejected)?;
    report_transition(&controller, &from, &to, json)
}

fn parse_expected(expected: Option<&str>) -> Result<Option<PhaseId>> {
    expected
        .map(|id| id.parse::<PhaseId>().map_err(fatal))
        .transpose()
}

pub async fn cmd_jump(
    config: &AuditflowConfig,
    project_id: i64,
    phase: &str,
    json: bool,
) -> Result<()> {
    let target: PhaseId = phase.parse().map_err(fatal)?;
    let controller = load_controller(config, project_id).await?;
    let from = controller.current_phase().clone();
    let to = controller.jump_to(target).await.map_err(rejected)?;
    report_transition(&controller, &from, &to, json)
}

pub async fn cmd_completeness_set(
    config: &AuditflowConfig,
    project_id: i64,
    phase: &str,
    value: i64,
    json: bool,
) -> Result<()> {
    let phase: PhaseId = phase.parse().map_err(fatal)?;
    config.registry().get(phase).map_err(fatal)?;
    let completeness = u8::try_from(value)
        .map_err(|_| TransitionError::InvalidCompleteness { value })
        .and_then(Completeness::new)
        .map_err(fatal)?;

    let store = open_db(config)?;
    store
        .write_completeness(project_id, phase, completeness)
        .await?;

    if json {
        return print_json(&CompletenessOutput {
            project_id,
            phase,
            completeness,
        });
    }
    println!(
        "{} is now {} complete",
        phase.default_display_name(),
        completeness
    );
    Ok(())
}

fn report_transition(
    controller: &PhaseController,
    from: &Phase,
    to: &Phase,
    json: bool,
) -> Result<()> {
    if json {
        return print_json(&TransitionOutput {
            project_id: controller.project_id(),
            from,
            to,
        });
    }
    if from.id == to.id {
        println!("Already in {}", to.display_name);
    } else {
        println!(
            "{} {} → {}",
            console::style("Moved").green().bold(),
            from.display_name,
            to.display_name
        );
    }
    Ok(())
}

/// Business-rule rejections print the notification text and exit 1.
fn rejected(err: TransitionError) -> anyhow::Error {
    anyhow!("{}", err.user_message())
}
