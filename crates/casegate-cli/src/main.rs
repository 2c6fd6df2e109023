//! Casegate CLI
//!
//! Command-line front end for the case-management repository:
//! - Rewriting ad-hoc DQL the way the query endpoint would (offline)
//! - Running bounded DQL queries as the user or the service account
//! - Case, group, user-profile and workflow lookups
//! - Credential and login-ticket checks

use anyhow::{Context, Result};
use casegate_dql::{QueryRewriter, RequiredColumns};
use casegate_rest::{
    AuthScope, Credentials, PageSlice, RestConfig, Row, ServiceContext, ServiceCredential,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod output;

#[derive(Parser)]
#[command(name = "casegate")]
#[command(author, version, about = "Casegate: case-management repository client")]
struct Cli {
    /// JSON configuration file (defaults to CASEGATE_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a DQL statement would be rewritten (no network)
    Rewrite {
        query: String,
        /// Row bound used when the statement carries none
        #[arg(long, default_value_t = casegate_dql::DEFAULT_RETURN_TOP)]
        limit: u32,
        /// Also require r_object_type in the projection
        #[arg(long)]
        with_type: bool,
    },

    /// Run a DQL statement and print every row up to its bound
    Query {
        query: String,
        /// Row bound used when the statement carries none
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
        /// Run with the service account's credentials
        #[arg(long)]
        service: bool,
        #[arg(long)]
        json: bool,
    },

    /// Search case folders (recent cases when no number is given)
    Cases {
        #[arg(long)]
        number: Option<String>,
        #[command(flatten)]
        paging: Paging,
    },

    /// Search groups by name prefix
    Groups {
        /// Group name prefix
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        paging: Paging,
    },

    /// Search user profiles
    Users {
        /// Matched against name, UIN, email, mobile and other profile fields
        #[arg(long)]
        query: Option<String>,
        #[command(flatten)]
        paging: Paging,
    },

    /// List enabled repository accounts
    ActiveUsers {
        #[arg(long)]
        json: bool,
    },

    /// Update editable properties of a user profile
    ProfileUpdate {
        object_id: String,
        /// Property to change; the value is read as JSON, else as text
        #[arg(long = "set", value_name = "KEY=VALUE", required = true, value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
        #[arg(long)]
        json: bool,
    },

    /// Mint a login ticket for a user via the service account
    UserTicket {
        /// Defaults to the configured user
        username: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Workflow templates and instances
    Workflows {
        #[command(subcommand)]
        command: WorkflowCommands,
    },

    /// Check a username/password against the repository
    Login {
        /// Defaults to the configured user
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long)]
        json: bool,
    },

    /// Obtain (or reuse) the service account login ticket
    Ticket,
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Configured process templates
    Templates {
        #[arg(long)]
        json: bool,
    },
    /// Instances started from a process template
    Running {
        process_id: String,
        #[command(flatten)]
        paging: Paging,
    },
    /// Workflows attached to a case
    ForCase {
        case_id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct Paging {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 20)]
    items_per_page: u32,
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Rewrite {
            query,
            limit,
            with_type,
        } => cmd_rewrite(&query, limit, with_type),
        Commands::Query {
            query,
            limit,
            page_size,
            service,
            json,
        } => {
            let context = connect(cli.config.as_ref())?;
            cmd_query(&context, &query, limit, page_size, service, json)
        }
        Commands::Cases { number, paging } => {
            let context = connect(cli.config.as_ref())?;
            let slice = context
                .cases()
                .search(number.as_deref(), paging.page, paging.items_per_page)
                .context("case search failed")?;
            print_slice(&slice, paging.json)
        }
        Commands::Groups { name, paging } => {
            let context = connect(cli.config.as_ref())?;
            let slice = context
                .groups()
                .search(name.as_deref(), paging.page, paging.items_per_page)
                .context("group search failed")?;
            print_slice(&slice, paging.json)
        }
        Commands::Users { query, paging } => {
            let context = connect(cli.config.as_ref())?;
            let slice = context
                .users()
                .search(query.as_deref(), paging.page, paging.items_per_page)
                .context("user search failed")?;
            print_slice(&slice, paging.json)
        }
        Commands::ActiveUsers { json } => {
            let context = connect(cli.config.as_ref())?;
            cmd_active_users(&context, json)
        }
        Commands::ProfileUpdate {
            object_id,
            set,
            json,
        } => {
            let context = connect(cli.config.as_ref())?;
            let changes: Row = set.into_iter().collect();
            let updated = context
                .users()
                .update_profile(&object_id, &changes)
                .with_context(|| format!("updating profile {object_id} failed"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&updated)?);
            } else {
                println!("{} updated {}", "ok".green().bold(), object_id.bold());
            }
            Ok(())
        }
        Commands::UserTicket { username, json } => {
            let context = connect(cli.config.as_ref())?;
            let ticket = context
                .session()
                .issue_user_ticket(username.as_deref())
                .context("issuing user login ticket failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ticket)?);
            } else {
                println!("{}", ticket.ticket);
                eprintln!(
                    "{} ticket for {} valid for {} minutes",
                    "ok".green().bold(),
                    ticket.username.bold(),
                    ticket.valid_for_minutes
                );
            }
            Ok(())
        }
        Commands::Workflows { command } => {
            let context = connect(cli.config.as_ref())?;
            cmd_workflows(&context, command)
        }
        Commands::Login {
            username,
            password,
            json,
        } => {
            let context = connect(cli.config.as_ref())?;
            let user = context
                .session()
                .authenticate(&Credentials::new(&username, &password))
                .context("login failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("{} authenticated as {}", "ok".green().bold(), user.username.bold());
            }
            Ok(())
        }
        Commands::Ticket => {
            let context = connect(cli.config.as_ref())?;
            cmd_ticket(&context)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("casegate=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("casegate=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn connect(config_path: Option<&PathBuf>) -> Result<ServiceContext> {
    let config = match config_path {
        Some(path) => RestConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RestConfig::from_env().context("failed to load config from CASEGATE_* environment")?,
    };
    ServiceContext::connect(config).context("failed to set up repository client")
}

fn cmd_rewrite(query: &str, limit: u32, with_type: bool) -> Result<()> {
    let required = if with_type {
        RequiredColumns::IdentifierAndType
    } else {
        RequiredColumns::IdentifierOnly
    };
    let rewritten = QueryRewriter::new()
        .with_required_columns(required)
        .rewrite(query, limit);

    println!("{}", rewritten.text());
    eprintln!(
        "{} shape={:?} limit={}",
        "info:".yellow().bold(),
        rewritten.shape(),
        rewritten.effective_limit()
    );
    Ok(())
}

fn cmd_query(
    context: &ServiceContext,
    query: &str,
    limit: Option<u32>,
    page_size: Option<u32>,
    service: bool,
    json: bool,
) -> Result<()> {
    let mut runner = context.query();
    if let Some(limit) = limit {
        runner = runner.with_default_limit(limit);
    }
    if let Some(page_size) = page_size {
        runner = runner.with_page_size(page_size);
    }
    if service {
        runner = runner.with_scope(AuthScope::Service);
    }

    let outcome = runner.execute(query).context("query failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print!("{}", output::render_table(&outcome.result.columns, &outcome.result.rows));
    let mut summary = format!("{} row(s)", outcome.result.total_count());
    if outcome.result.truncated {
        summary.push_str(&format!(", truncated at {}", outcome.result.limit));
    }
    eprintln!("{} {}", "ok".green().bold(), summary);
    Ok(())
}

fn cmd_workflows(context: &ServiceContext, command: WorkflowCommands) -> Result<()> {
    let workflows = context.workflows();
    match command {
        WorkflowCommands::Templates { json } => {
            let templates = workflows.process_templates();
            if json {
                println!("{}", serde_json::to_string_pretty(&templates)?);
            } else {
                for template in &templates {
                    println!("{}", template.get("title").map(output::cell).unwrap_or_default());
                }
            }
        }
        WorkflowCommands::Running { process_id, paging } => {
            let slice = workflows
                .running(&process_id, paging.page, paging.items_per_page)
                .context("listing running workflows failed")?;
            print_slice(&slice, paging.json)?;
        }
        WorkflowCommands::ForCase { case_id, json } => {
            let found = workflows
                .for_case(&case_id)
                .with_context(|| format!("workflow lookup for case {case_id} failed"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                let columns: Vec<String> = found
                    .first()
                    .map(|row| row.keys().cloned().collect())
                    .unwrap_or_default();
                print!("{}", output::render_table(&columns, &found));
                eprintln!("{} {} workflow(s)", "ok".green().bold(), found.len());
            }
        }
    }
    Ok(())
}

fn cmd_ticket(context: &ServiceContext) -> Result<()> {
    let broker = context.broker();
    if !broker.is_privileged_configured() {
        anyhow::bail!("no service account configured (CASEGATE_SERVICE_USERNAME)");
    }
    match broker.get_or_refresh_ticket() {
        ServiceCredential::Ticket(_) => {
            let expiry = broker
                .ticket_expiry()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            println!("{} login ticket valid until {}", "ok".green().bold(), expiry);
        }
        ServiceCredential::Fallback(_) => {
            println!(
                "{} ticket unavailable, service calls fall back to basic credentials",
                "warn:".yellow().bold()
            );
        }
    }
    Ok(())
}

fn cmd_active_users(context: &ServiceContext, json: bool) -> Result<()> {
    let users = context.users().active_users().context("listing active users failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }
    for user in &users {
        let marker = if user.is_superuser { " (superuser)".yellow().to_string() } else { String::new() };
        println!(
            "{}\t{}{}",
            user.username,
            user.email.as_deref().unwrap_or("-"),
            marker
        );
    }
    eprintln!("{} {} active user(s)", "ok".green().bold(), users.len());
    Ok(())
}

/// `KEY=VALUE` for `profile-update --set`.
fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing property name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_slice(slice: &PageSlice, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(slice)?);
        return Ok(());
    }
    print!("{}", output::render_table(&slice.columns, &slice.rows));
    eprintln!(
        "{} page {} ({} row(s){})",
        "ok".green().bold(),
        slice.page,
        slice.rows.len(),
        if slice.has_next { ", more available" } else { "" }
    );
    Ok(())
}
