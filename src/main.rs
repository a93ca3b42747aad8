mod activity;
mod agent;
mod ansi;
mod cli;
mod completion;
mod config;
mod error;
mod filters;
mod instance;
mod lock;
mod paths;
mod project;
mod registry;
mod tmux;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use tracing::{debug, info};

use cli::{Cli, Command, ProjectCommand};
use config::Config;
use filters::FilterTable;
use instance::Instance;
use lock::ProjectLock;
use project::ProjectsFile;
use registry::Store;

/// Capture depth for activity classification. Deep enough for the
/// separator-window lookback, shallow enough to stay cheap per poll.
const ACTIVITY_DEPTH: usize = 60;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "agentmux=info",
        1 => "agentmux=debug",
        _ => "agentmux=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Completions touch no state and need no lock.
    if let Command::Completions { shell } = &cli.command {
        return completion::print(*shell);
    }

    let root = paths::config_root()?;
    std::fs::create_dir_all(&root)
        .with_context(|| format!("failed to create config directory {}", root.display()))?;

    let config = Config::load(&root)?;
    let filters = FilterTable::load(&root)?;
    let mut projects = ProjectsFile::load(&root)?;

    let project_id = match &cli.project {
        Some(name) => projects.resolve(name)?,
        None => projects.last_or_default(),
    };
    debug!(project = %projects.name_of(&project_id), "active project");

    let lock_path = paths::lock_file(&root, &project_id);
    let mut held = ProjectLock::acquire(&lock_path).with_context(|| {
        format!(
            "another agentmux is managing project '{}'",
            projects.name_of(&project_id)
        )
    })?;

    // The lock file must not survive Ctrl-C; Drop does not run then.
    let ctrlc_path = lock_path.clone();
    ctrlc::set_handler(move || {
        let _ = std::fs::remove_file(&ctrlc_path);
        std::process::exit(130);
    })
    .ok();

    let store = Store::new(&root, &project_id);

    let result = match cli.command {
        Command::List => cmd_list(&store, &config, &filters),
        Command::Add {
            name,
            path,
            agent,
            command,
            auto_yes,
            start,
        } => cmd_add(&store, &config, name, path, agent, command, auto_yes, start),
        Command::Remove { target, yes } => cmd_remove(&store, &target, yes),
        Command::Rename { target, new_name } => {
            let inst = store.find(&target)?;
            store.rename(&inst.id, &new_name)?;
            println!("renamed '{}' to '{new_name}'", inst.name);
            Ok(())
        }
        Command::Start { target, resume } => cmd_start(&store, &config, &target, resume.as_deref()),
        Command::Stop { target } => {
            let mut inst = store.find(&target)?;
            inst.stop()?;
            store.update(inst.clone())?;
            println!("stopped '{}'", inst.name);
            Ok(())
        }
        Command::Attach { target } => {
            tmux::check_tmux()?;
            let inst = store.find(&target)?;
            inst.attach()?;
            Ok(())
        }
        Command::Send {
            target,
            text,
            no_enter,
        } => {
            let inst = store.find(&target)?;
            inst.send_keys(&text, !no_enter)?;
            Ok(())
        }
        Command::Preview { target, lines } => {
            let inst = store.find(&target)?;
            let preview = inst.capture_preview(lines, filters.for_agent(inst.agent), &config)?;
            println!("{preview}");
            Ok(())
        }
        Command::Status { target } => cmd_status(&store, &config, &filters, &target),
        Command::Import { from } => cmd_import(&root, &projects, &store, &from),
        Command::Projects { command } => {
            cmd_projects(&root, &mut projects, &project_id, command)
        }
        Command::Completions { .. } => unreachable!("handled before lock acquisition"),
    };

    held.release();
    result
}

fn cmd_list(store: &Store, config: &Config, filters: &FilterTable) -> Result<()> {
    let registry = store.load()?;
    if registry.instances.is_empty() {
        println!("no instances (try 'agentmux add <name>')");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<8} {:<8} LAST LINE",
        "NAME", "AGENT", "STATUS", "ACTIVITY"
    );
    for inst in &registry.instances {
        let activity = if inst.is_alive() {
            inst.activity(ACTIVITY_DEPTH)
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "-".to_string())
        } else {
            "-".to_string()
        };
        let last = inst.last_line(filters.for_agent(inst.agent), config);
        println!(
            "{:<20} {:<10} {:<8} {:<8} {}",
            inst.name,
            inst.agent.label(),
            inst.status,
            activity,
            last
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    store: &Store,
    config: &Config,
    name: String,
    path: Option<String>,
    agent: agent::AgentKind,
    command: Option<String>,
    auto_yes: bool,
    start: bool,
) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => std::env::current_dir()
            .context("failed to get current directory")?
            .to_string_lossy()
            .to_string(),
    };

    let inst = Instance::new(&name, &path, agent, command, auto_yes)?;
    let id = inst.id.clone();
    store.add(inst)?;
    info!(id = %id, "instance registered");

    if start {
        tmux::check_tmux()?;
        let mut inst = store.find(&id)?;
        inst.start(None, config)?;
        store.update(inst)?;
    }
    println!("added '{name}' ({id})");
    Ok(())
}

fn cmd_remove(store: &Store, target: &str, yes: bool) -> Result<()> {
    let inst = store.find(target)?;
    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Remove instance '{}'?", inst.name))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("aborted");
            return Ok(());
        }
    }
    let removed = store.remove(&inst.id)?;
    println!("removed '{}'", removed.name);
    Ok(())
}

fn cmd_start(store: &Store, config: &Config, target: &str, resume: Option<&str>) -> Result<()> {
    let version = tmux::check_tmux()?;
    debug!(%version, "tmux available");

    let mut inst = store.find(target)?;
    inst.start(resume, config)?;
    store.update(inst.clone())?;
    println!("started '{}' in session {}", inst.name, inst.session());
    Ok(())
}

fn cmd_status(store: &Store, config: &Config, filters: &FilterTable, target: &str) -> Result<()> {
    let inst = store.find(target)?;
    println!("name:     {}", inst.name);
    println!("id:       {}", inst.id);
    println!("agent:    {}", inst.agent.label());
    println!("path:     {}", inst.path);
    println!("session:  {}", inst.session());
    println!("status:   {}", inst.status);
    if inst.is_alive() {
        if let Ok(activity) = inst.activity(ACTIVITY_DEPTH) {
            println!("activity: {activity}");
        }
    }
    println!("last:     {}", inst.last_line(filters.for_agent(inst.agent), config));
    Ok(())
}

fn cmd_import(root: &Path, projects: &ProjectsFile, store: &Store, from: &str) -> Result<()> {
    let from_id = projects.resolve(from)?;
    if from_id == store.project_id() {
        bail!("cannot import the active project into itself");
    }

    // Exclude a concurrent host on the source side too.
    let _source_lock = ProjectLock::acquire(&paths::lock_file(root, &from_id))
        .with_context(|| format!("project '{}' is in use", projects.name_of(&from_id)))?;

    registry::import(root, &from_id, store.project_id())?;
    println!(
        "imported '{}' into '{}'",
        projects.name_of(&from_id),
        projects.name_of(store.project_id())
    );
    Ok(())
}

fn cmd_projects(
    root: &Path,
    projects: &mut ProjectsFile,
    active_id: &str,
    command: ProjectCommand,
) -> Result<()> {
    match command {
        ProjectCommand::List => {
            let marker = |id: &str| if id == active_id { "*" } else { " " };
            println!("{} {}", marker(""), project::DEFAULT_PROJECT_NAME);
            for p in &projects.projects {
                println!("{} {} ({})", marker(&p.id), p.name, p.id);
            }
            Ok(())
        }
        ProjectCommand::Add { name } => {
            let id = projects.create(&name)?.id.clone();
            std::fs::create_dir_all(paths::project_dir(root, &id))?;
            projects.save(root)?;
            println!("created project '{name}' ({id})");
            Ok(())
        }
        ProjectCommand::Use { name } => {
            let id = projects.resolve(&name)?;
            projects.last_project = if id.is_empty() { None } else { Some(id.clone()) };
            projects.save(root)?;
            println!("switched to project '{}'", projects.name_of(&id));
            Ok(())
        }
        ProjectCommand::Remove { name, yes } => {
            let id = projects.resolve(&name)?;
            if id == active_id {
                bail!("cannot remove the active project; switch projects first");
            }

            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Delete project '{}' and all its instances?",
                        projects.name_of(&id)
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("aborted");
                    return Ok(());
                }
            }

            let _victim_lock = ProjectLock::acquire(&paths::lock_file(root, &id))
                .with_context(|| format!("project '{}' is in use", projects.name_of(&id)))?;

            // Kill the project's sessions before its files go away.
            let victim_store = Store::new(root, &id);
            let mut registry = victim_store.load()?;
            for inst in &mut registry.instances {
                let _ = inst.stop();
            }

            let removed = projects.remove(&id)?;
            projects.save(root)?;
            let dir = paths::project_dir(root, &id);
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("failed to delete {}", dir.display()))?;
            println!("removed project '{}'", removed.name);
            Ok(())
        }
    }
}
