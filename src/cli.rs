use clap::{Parser, Subcommand, ValueEnum};

use crate::agent::AgentKind;

#[derive(Parser, Debug)]
#[command(
    name = "agentmux",
    about = "Run AI coding agents in detached tmux sessions",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Operate on a named project instead of the last-used one
    #[arg(short, long, global = true)]
    pub project: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List instances with status and activity
    List,

    /// Register a new instance
    Add {
        /// Instance name, unique within the project
        name: String,

        /// Working directory for the agent (defaults to the current directory)
        #[arg(long)]
        path: Option<String>,

        /// Agent to run
        #[arg(long, value_enum, default_value_t = AgentKind::Claude)]
        agent: AgentKind,

        /// Full command line, required when --agent custom
        #[arg(long)]
        command: Option<String>,

        /// Pass the agent its skip-confirmations flag
        #[arg(long)]
        auto_yes: bool,

        /// Start the session immediately after registering
        #[arg(long)]
        start: bool,
    },

    /// Stop and delete an instance
    Remove {
        /// Instance name or id
        target: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Rename an instance
    Rename {
        /// Instance name or id
        target: String,
        new_name: String,
    },

    /// Start an instance's tmux session
    Start {
        /// Instance name or id
        target: String,

        /// Resume token passed to agents that support resuming
        #[arg(long)]
        resume: Option<String>,
    },

    /// Kill an instance's tmux session
    Stop {
        /// Instance name or id
        target: String,
    },

    /// Attach the terminal to a running instance (C-q detaches)
    Attach {
        /// Instance name or id
        target: String,
    },

    /// Send literal keys to a running instance
    Send {
        /// Instance name or id
        target: String,

        /// Text to type into the session
        text: String,

        /// Do not press Enter after the text
        #[arg(long)]
        no_enter: bool,
    },

    /// Print a cleaned capture of an instance's pane
    Preview {
        /// Instance name or id
        target: String,

        /// Number of lines to show
        #[arg(long, default_value = "20")]
        lines: usize,
    },

    /// Show one instance's status, activity and last output line
    Status {
        /// Instance name or id
        target: String,
    },

    /// Move every instance from another project into this one
    Import {
        /// Source project name or id
        from: String,
    },

    /// Manage projects
    Projects {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// List projects, marking the active one
    List,

    /// Create a named project
    Add { name: String },

    /// Switch the active project
    Use {
        /// Project name or id ("default" for the unnamed project)
        name: String,
    },

    /// Delete a named project and its files
    Remove {
        /// Project name or id
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_defaults_to_claude() {
        let cli = Cli::parse_from(["agentmux", "add", "worker"]);
        match cli.command {
            Command::Add { name, agent, auto_yes, .. } => {
                assert_eq!(name, "worker");
                assert!(matches!(agent, AgentKind::Claude));
                assert!(!auto_yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["agentmux", "list", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn agent_labels_parse() {
        for label in ["claude", "gemini", "aider", "codex", "amazonq", "opencode", "custom"] {
            let cli = Cli::parse_from(["agentmux", "add", "x", "--agent", label]);
            assert!(matches!(cli.command, Command::Add { .. }));
        }
    }
}
