// src/config/validate.rs

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveTime, Weekday};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, ProjectConfig, TaskConfig, TriggerConfig};

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one project, each with at least one task
/// - `poll_interval_secs` and trigger intervals are `>= 1`
/// - schedule times/days parse
/// - project triggers refer to existing projects
/// - the project-trigger dependency graph has no cycles
/// - `queue_group` references exist and group limits are `>= 1`
/// - exec commands are non-empty; parallel tasks contain only exec children
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_projects(cfg)?;
    validate_server(cfg)?;
    validate_groups(cfg)?;
    for (name, project) in cfg.projects.iter() {
        validate_project(cfg, name, project)
            .with_context(|| format!("in [project.{name}]"))?;
    }
    validate_dependency_graph(cfg)?;
    Ok(())
}

fn ensure_has_projects(cfg: &ConfigFile) -> Result<()> {
    if cfg.projects.is_empty() {
        return Err(anyhow!(
            "config must contain at least one [project.<name>] section"
        ));
    }
    Ok(())
}

fn validate_server(cfg: &ConfigFile) -> Result<()> {
    if cfg.server.poll_interval_secs == 0 {
        return Err(anyhow!("[server].poll_interval_secs must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_groups(cfg: &ConfigFile) -> Result<()> {
    for (name, group) in cfg.groups.iter() {
        if group.max_concurrent == 0 {
            return Err(anyhow!(
                "[group.{name}].max_concurrent must be >= 1 (got 0)"
            ));
        }
    }
    Ok(())
}

fn validate_project(cfg: &ConfigFile, name: &str, project: &ProjectConfig) -> Result<()> {
    if project.tasks.is_empty() {
        return Err(anyhow!("project must define at least one task"));
    }

    if let Some(group) = &project.queue_group {
        if !cfg.groups.contains_key(group) {
            return Err(anyhow!("unknown queue group '{group}'"));
        }
    }

    for trigger in project.trigger.iter() {
        validate_trigger(cfg, name, trigger)?;
    }
    for task in project.tasks.iter() {
        validate_task(task)?;
    }
    for task in project.publishers.iter() {
        validate_task(task)?;
    }

    Ok(())
}

fn validate_trigger(cfg: &ConfigFile, project: &str, trigger: &TriggerConfig) -> Result<()> {
    match trigger {
        TriggerConfig::Interval { interval_secs } => {
            if *interval_secs == 0 {
                return Err(anyhow!("interval trigger requires interval_secs >= 1"));
            }
        }
        TriggerConfig::Schedule { time, days } => {
            parse_schedule_time(time).map_err(|e| anyhow!(e))?;
            parse_schedule_days(days).map_err(|e| anyhow!(e))?;
        }
        TriggerConfig::Project { project: target } => {
            if !cfg.projects.contains_key(target) {
                return Err(anyhow!(
                    "project trigger refers to unknown project '{target}'"
                ));
            }
            if target == project {
                return Err(anyhow!("project trigger cannot refer to its own project"));
            }
        }
        TriggerConfig::Multi { triggers, .. } => {
            if triggers.is_empty() {
                return Err(anyhow!("multi trigger requires at least one nested trigger"));
            }
            for nested in triggers {
                validate_trigger(cfg, project, nested)?;
            }
        }
    }
    Ok(())
}

fn validate_task(task: &TaskConfig) -> Result<()> {
    match task {
        TaskConfig::Exec { cmd, .. } => {
            if cmd.trim().is_empty() {
                return Err(anyhow!("exec task requires a non-empty cmd"));
            }
        }
        TaskConfig::Sequence { tasks, .. } | TaskConfig::Conditional { tasks, .. } => {
            if tasks.is_empty() {
                return Err(anyhow!("task requires at least one nested task"));
            }
            for nested in tasks {
                validate_task(nested)?;
            }
        }
        TaskConfig::Parallel { tasks, .. } => {
            if tasks.is_empty() {
                return Err(anyhow!("parallel task requires at least one nested task"));
            }
            for nested in tasks {
                match nested {
                    TaskConfig::Exec { .. } => validate_task(nested)?,
                    _ => {
                        return Err(anyhow!(
                            "parallel task may only contain exec tasks"
                        ))
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_dependency_graph(cfg: &ConfigFile) -> Result<()> {
    // Edge direction: dependency -> dependent. A cycle here would mean two
    // projects each waiting on the other's success, which can never settle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.projects.keys() {
        graph.add_node(name.as_str());
    }

    for (name, project) in cfg.projects.iter() {
        let mut deps = Vec::new();
        for trigger in project.trigger.iter() {
            collect_project_deps(trigger, &mut deps);
        }
        for dep in deps {
            graph.add_edge(dep, name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(anyhow!(
                "cycle detected in project-trigger dependencies involving '{}'",
                node
            ))
        }
    }
}

fn collect_project_deps<'a>(trigger: &'a TriggerConfig, out: &mut Vec<&'a str>) {
    match trigger {
        TriggerConfig::Project { project } => out.push(project.as_str()),
        TriggerConfig::Multi { triggers, .. } => {
            for nested in triggers {
                collect_project_deps(nested, out);
            }
        }
        _ => {}
    }
}

/// Parse a `"HH:MM"` schedule time.
pub fn parse_schedule_time(time: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|e| format!("invalid schedule time '{time}' (expected HH:MM): {e}"))
}

/// Parse weekday names like `"mon"` or `"monday"`. An empty list means
/// every day.
pub fn parse_schedule_days(days: &[String]) -> std::result::Result<Vec<Weekday>, String> {
    days.iter()
        .map(|day| {
            day.parse::<Weekday>()
                .map_err(|_| format!("invalid schedule day '{day}'"))
        })
        .collect()
}
