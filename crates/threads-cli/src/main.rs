//! `threads` command line interface. Parses arguments, runs one operation
//! against the store, and prints the result. Expected validation failures
//! (bad references, bad values, no-op updates) print a message and exit
//! cleanly; store failures propagate and exit non-zero.

mod render;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use threads_core::config;
use threads_core::criteria::{BatchAction, BatchReport, ImportanceFilter};
use threads_core::model::{
    parse_importance, short_id, Size, Status, Temperature, Thread,
};
use threads_core::ops::{
    self, BatchRequest, ContainerPatch, DependencyMeta, GroupPatch, NewContainer, NewThread,
    OpError, RefChange, StrategyArg, ThreadPatch,
};
use threads_core::resolve::{self, ResolveError};
use threads_core::store::Store;
use threads_core::views::{self, ChildView, ShowReport, ThreadFilter, ThreadRow, TreeNode};

#[derive(Parser)]
#[command(
    name = "threads",
    version,
    about = "Track threads of work in a local JSON document"
)]
struct Cli {
    /// Directory holding threads.json (default: $THREADS_HOME, else ~/.threads)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a thread
    New {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Parent thread or container
        #[arg(short, long, value_name = "REF")]
        parent: Option<String>,
        /// Group to file the thread under (inherits the parent's group if omitted)
        #[arg(short, long, value_name = "REF")]
        group: Option<String>,
        /// Initial status (default: active)
        #[arg(short, long)]
        status: Option<String>,
        /// Importance 1-5 (default from config, else 3)
        #[arg(short, long)]
        importance: Option<String>,
        #[arg(short, long)]
        temperature: Option<String>,
        #[arg(long)]
        size: Option<String>,
        /// May repeat
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Create a child thread under an existing entity
    Spawn {
        /// Parent thread or container
        parent: String,
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Group override; the child inherits the parent's group otherwise
        #[arg(short, long, value_name = "REF")]
        group: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        importance: Option<String>,
        #[arg(short, long)]
        temperature: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// List threads
    List {
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        temperature: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(short, long, value_name = "REF")]
        group: Option<String>,
        /// Importance filter: N, N+ (at least), N- (at most)
        #[arg(short, long)]
        importance: Option<String>,
        /// Include archived threads
        #[arg(short, long)]
        all: bool,
    },
    /// Show one thread or container in full
    Show { reference: String },
    /// Edit thread fields
    Update {
        reference: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        temperature: Option<String>,
        #[arg(short, long)]
        importance: Option<String>,
        #[arg(long)]
        size: Option<String>,
        /// Move under a new parent
        #[arg(short, long, value_name = "REF")]
        parent: Option<String>,
        /// Move to the top level
        #[arg(long)]
        root_parent: bool,
        /// Assign a group (applies to the whole subtree)
        #[arg(short, long, value_name = "REF")]
        group: Option<String>,
        /// Remove from its group (applies to the whole subtree)
        #[arg(long)]
        no_group: bool,
        /// May repeat
        #[arg(long = "add-tag", value_name = "TAG")]
        add_tags: Vec<String>,
        /// May repeat
        #[arg(long = "remove-tag", value_name = "TAG")]
        remove_tags: Vec<String>,
    },
    /// Archive a thread (sets status archived, temperature frozen)
    Archive { reference: String },
    /// Delete a thread or container
    Delete {
        reference: String,
        /// Delete the whole subtree
        #[arg(long)]
        cascade: bool,
        /// Promote children to the deleted node's parent
        #[arg(long)]
        orphan: bool,
        /// Move children under another entity
        #[arg(long, value_name = "TARGET")]
        move_to: Option<String>,
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Append a progress note to a thread
    Log { reference: String, note: String },
    /// Show the current detail, or append a new version
    Detail {
        reference: String,
        content: Option<String>,
    },
    /// Add or remove a link on a thread
    Link {
        reference: String,
        url: String,
        #[arg(long)]
        remove: bool,
    },
    /// Record that one thread depends on another
    Depend {
        reference: String,
        /// The thread depended on
        on: String,
        #[arg(long)]
        why: Option<String>,
        #[arg(long)]
        what: Option<String>,
        #[arg(long)]
        how: Option<String>,
        #[arg(long)]
        when: Option<String>,
        #[arg(long)]
        remove: bool,
    },
    /// Fold one thread into another
    Merge {
        source: String,
        target: String,
        /// Keep the source active instead of archiving it
        #[arg(short, long)]
        keep: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        force: bool,
    },
    /// Apply one action to every entity matching the filters
    Batch {
        /// All descendants of this entity
        #[arg(long, value_name = "REF")]
        under: Option<String>,
        /// Direct children of this entity
        #[arg(long, value_name = "REF")]
        children_of: Option<String>,
        #[arg(short, long, value_name = "REF")]
        group: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        temperature: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Importance filter: N, N+ (at least), N- (at most)
        #[arg(short, long)]
        importance: Option<String>,
        #[arg(long)]
        archive: bool,
        #[arg(long, value_name = "TAG")]
        add_tag: Option<String>,
        #[arg(long, value_name = "TAG")]
        remove_tag: Option<String>,
        #[arg(long, value_name = "STATUS")]
        set_status: Option<String>,
        #[arg(long, value_name = "TEMP")]
        set_temperature: Option<String>,
        #[arg(long, value_name = "N")]
        set_importance: Option<String>,
        #[arg(long, value_name = "SIZE")]
        set_size: Option<String>,
        /// Append the same progress note to every matched thread
        #[arg(long, value_name = "TEXT")]
        note: Option<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        force: bool,
    },
    /// Manage containers
    Container {
        #[command(subcommand)]
        command: ContainerCommand,
    },
    /// Manage groups
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },
    /// Search names, descriptions, tags, progress, and details
    Search { query: String },
    /// Progress notes across all threads, newest first
    Timeline {
        /// Only notes from the last N days
        #[arg(long, value_name = "N")]
        days: Option<u32>,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Recommend what to work on next
    Next {
        /// How many threads to show (default from config, else 5)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Show the hierarchy, whole or under one entity
    Tree { reference: Option<String> },
    /// Entity counts by status and temperature
    Stats,
    /// Re-derive temperatures from actual activity
    Chill {
        /// Also warm threads up, not just cool them down
        #[arg(long)]
        warm: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum ContainerCommand {
    /// Create a container
    New {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_name = "REF")]
        parent: Option<String>,
        #[arg(short, long, value_name = "REF")]
        group: Option<String>,
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// List containers
    List,
    /// Show one container in full
    Show { reference: String },
    /// Edit container fields
    Update {
        reference: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_name = "REF")]
        parent: Option<String>,
        #[arg(long)]
        root_parent: bool,
        #[arg(short, long, value_name = "REF")]
        group: Option<String>,
        #[arg(long)]
        no_group: bool,
        #[arg(long = "add-tag", value_name = "TAG")]
        add_tags: Vec<String>,
        #[arg(long = "remove-tag", value_name = "TAG")]
        remove_tags: Vec<String>,
    },
    /// Delete a container
    Delete {
        reference: String,
        #[arg(long)]
        cascade: bool,
        #[arg(long)]
        orphan: bool,
        #[arg(long, value_name = "TARGET")]
        move_to: Option<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    /// Create a group
    New {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List groups with member counts
    List,
    /// Show a group and its members
    Show { reference: String },
    /// Rename or re-describe a group
    Update {
        reference: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a group; members stay but lose their membership
    Delete {
        reference: String,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let store = match cli.home.as_deref() {
        Some(home) => Store::at(home),
        None => Store::discover()?,
    };
    run(cli.command, &store, cli.json)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("THREADS_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Expected failures print a message and exit 0; store failures bubble up.
fn finish<T>(result: Result<T, OpError>, json: bool) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(OpError::Store(err)) => Err(err.into()),
        Err(err) => {
            print_failure(&err, json);
            Ok(None)
        }
    }
}

fn print_failure(err: &OpError, json: bool) {
    if let OpError::Resolve(ResolveError::Ambiguous { candidates, .. }) = err {
        if json {
            let listed: Vec<serde_json::Value> = candidates
                .iter()
                .map(|candidate| {
                    json!({
                        "id": candidate.id,
                        "name": candidate.name,
                        "kind": candidate.kind,
                    })
                })
                .collect();
            println!(
                "{}",
                json!({ "ok": false, "error": err.to_string(), "candidates": listed })
            );
        } else {
            println!("{err}:");
            for candidate in candidates {
                println!(
                    "  {:<10} {} [{}]",
                    short_id(&candidate.id),
                    candidate.name,
                    candidate.kind
                );
            }
        }
        return;
    }
    if json {
        println!("{}", json!({ "ok": false, "error": err.to_string() }));
    } else {
        println!("{err}");
    }
}

/// Invalid flag combinations take the same clean-exit path as other
/// expected failures.
fn refuse(json: bool, message: &str) {
    if json {
        println!("{}", json!({ "ok": false, "error": message }));
    } else {
        println!("{message}");
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn parse_opt_status(raw: Option<&str>) -> Result<Option<Status>, OpError> {
    Ok(raw.map(str::parse).transpose()?)
}

fn parse_opt_temperature(raw: Option<&str>) -> Result<Option<Temperature>, OpError> {
    Ok(raw.map(str::parse).transpose()?)
}

fn parse_opt_size(raw: Option<&str>) -> Result<Option<Size>, OpError> {
    Ok(raw.map(str::parse).transpose()?)
}

fn parse_opt_importance(raw: Option<&str>) -> Result<Option<u8>, OpError> {
    Ok(raw.map(parse_importance).transpose()?)
}

/// At most one deletion strategy may be given.
fn pick_strategy(
    cascade: bool,
    orphan: bool,
    move_to: Option<String>,
) -> Result<Option<StrategyArg>, String> {
    let mut picked = Vec::new();
    if cascade {
        picked.push(StrategyArg::Cascade);
    }
    if orphan {
        picked.push(StrategyArg::Orphan);
    }
    if let Some(target) = move_to {
        picked.push(StrategyArg::MoveTo(target));
    }
    if picked.len() > 1 {
        return Err("pass at most one of --cascade, --orphan, --move-to".to_string());
    }
    Ok(picked.pop())
}

struct DeleteFlags {
    strategy: Option<StrategyArg>,
    dry_run: bool,
    force: bool,
}

fn delete_entity(store: &Store, json: bool, reference: &str, flags: DeleteFlags) -> Result<()> {
    let planned = ops::plan_entity_delete(store, reference, flags.strategy.as_ref());
    let Some(plan) = finish(planned, json)? else {
        return Ok(());
    };
    if flags.dry_run {
        render::print_delete_plan(&plan, json, false);
        return Ok(());
    }
    let multi = plan.removed.len() > 1 || !plan.reparented.is_empty();
    if multi && !flags.force {
        render::print_delete_plan(&plan, false, false);
        if !confirm("Delete?")? {
            println!("Aborted.");
            return Ok(());
        }
    }
    let applied = ops::apply_entity_delete(store, reference, flags.strategy.as_ref());
    if let Some(plan) = finish(applied, json)? {
        render::print_delete_plan(&plan, json, true);
    }
    Ok(())
}

fn thread_ack(json: bool, verb: &str, thread: &Thread) {
    render::ack(
        json,
        format!("{verb} thread {} '{}'.", short_id(&thread.id), thread.name),
        json!({ "ok": true, "thread": thread }),
    );
}

fn run(command: Command, store: &Store, json: bool) -> Result<()> {
    match command {
        Command::New {
            name,
            description,
            parent,
            group,
            status,
            importance,
            temperature,
            size,
            tags,
        } => {
            let result = (|| -> Result<Thread, OpError> {
                let request = NewThread {
                    name,
                    description,
                    parent,
                    group,
                    status: parse_opt_status(status.as_deref())?,
                    importance: parse_opt_importance(importance.as_deref())?,
                    temperature: parse_opt_temperature(temperature.as_deref())?,
                    size: parse_opt_size(size.as_deref())?,
                    tags,
                };
                ops::create_thread(store, request)
            })();
            if let Some(thread) = finish(result, json)? {
                thread_ack(json, "Created", &thread);
            }
        }
        Command::Spawn {
            parent,
            name,
            description,
            group,
            status,
            importance,
            temperature,
            size,
            tags,
        } => {
            let result = (|| -> Result<Thread, OpError> {
                let request = NewThread {
                    name,
                    description,
                    parent: Some(parent),
                    group,
                    status: parse_opt_status(status.as_deref())?,
                    importance: parse_opt_importance(importance.as_deref())?,
                    temperature: parse_opt_temperature(temperature.as_deref())?,
                    size: parse_opt_size(size.as_deref())?,
                    tags,
                };
                ops::create_thread(store, request)
            })();
            if let Some(thread) = finish(result, json)? {
                thread_ack(json, "Spawned", &thread);
            }
        }
        Command::List {
            status,
            temperature,
            tag,
            group,
            importance,
            all,
        } => {
            let result = (|| -> Result<Vec<ThreadRow>, OpError> {
                let doc = store.load()?;
                let group = match group.as_deref() {
                    Some(reference) => Some(resolve::resolve_group(&doc, reference)?),
                    None => None,
                };
                let filter = ThreadFilter {
                    status: parse_opt_status(status.as_deref())?,
                    temperature: parse_opt_temperature(temperature.as_deref())?,
                    tag,
                    group,
                    importance: importance
                        .as_deref()
                        .map(ImportanceFilter::parse)
                        .transpose()?,
                    include_archived: all,
                };
                Ok(views::list_threads(&doc, &filter))
            })();
            if let Some(rows) = finish(result, json)? {
                render::print_threads(&rows, json);
            }
        }
        Command::Show { reference } => {
            let result = show_report(store, &reference, Scope::Entity);
            if let Some(report) = finish(result, json)? {
                render::print_show(&report, json);
            }
        }
        Command::Update {
            reference,
            name,
            description,
            status,
            temperature,
            importance,
            size,
            parent,
            root_parent,
            group,
            no_group,
            add_tags,
            remove_tags,
        } => {
            if parent.is_some() && root_parent {
                refuse(json, "pass either --parent or --root-parent, not both");
                return Ok(());
            }
            if group.is_some() && no_group {
                refuse(json, "pass either --group or --no-group, not both");
                return Ok(());
            }
            let result = (|| -> Result<Thread, OpError> {
                let patch = ThreadPatch {
                    name,
                    description,
                    status: parse_opt_status(status.as_deref())?,
                    temperature: parse_opt_temperature(temperature.as_deref())?,
                    importance: parse_opt_importance(importance.as_deref())?,
                    size: parse_opt_size(size.as_deref())?,
                    parent: ref_change(parent, root_parent),
                    group: ref_change(group, no_group),
                    add_tags,
                    remove_tags,
                };
                ops::update_thread(store, &reference, patch)
            })();
            if let Some(thread) = finish(result, json)? {
                thread_ack(json, "Updated", &thread);
            }
        }
        Command::Archive { reference } => {
            let result = ops::archive_thread(store, &reference);
            if let Some(thread) = finish(result, json)? {
                thread_ack(json, "Archived", &thread);
            }
        }
        Command::Delete {
            reference,
            cascade,
            orphan,
            move_to,
            dry_run,
            force,
        } => {
            let strategy = match pick_strategy(cascade, orphan, move_to) {
                Ok(strategy) => strategy,
                Err(message) => {
                    refuse(json, &message);
                    return Ok(());
                }
            };
            delete_entity(
                store,
                json,
                &reference,
                DeleteFlags {
                    strategy,
                    dry_run,
                    force,
                },
            )?;
        }
        Command::Log { reference, note } => {
            let result = ops::log_progress(store, &reference, &note);
            if let Some(thread) = finish(result, json)? {
                render::ack(
                    json,
                    format!("Logged progress on '{}'.", thread.name),
                    json!({ "ok": true, "thread": thread }),
                );
            }
        }
        Command::Detail { reference, content } => match content {
            Some(content) => {
                let result = ops::set_detail(store, &reference, &content);
                if let Some(name) = finish(result, json)? {
                    render::ack(
                        json,
                        format!("Recorded a new detail on '{name}'."),
                        json!({ "ok": true, "name": name }),
                    );
                }
            }
            None => {
                let result = (|| -> Result<(String, Option<String>), OpError> {
                    let doc = store.load()?;
                    let id = resolve::resolve_entity(&doc, &reference)?;
                    let entity = doc
                        .entity(&id)
                        .ok_or_else(|| not_found("entity", &reference))?;
                    let detail = entity
                        .current_detail()
                        .map(|entry| entry.content.clone());
                    Ok((entity.name().to_string(), detail))
                })();
                if let Some((name, detail)) = finish(result, json)? {
                    if json {
                        println!("{}", json!({ "name": name, "detail": detail }));
                    } else {
                        match detail {
                            Some(text) => println!("{text}"),
                            None => println!("No detail recorded on '{name}'."),
                        }
                    }
                }
            }
        },
        Command::Link {
            reference,
            url,
            remove,
        } => {
            let result = if remove {
                ops::remove_link(store, &reference, &url)
            } else {
                ops::add_link(store, &reference, &url)
            };
            if let Some(thread) = finish(result, json)? {
                let message = if remove {
                    format!("Removed link from '{}'.", thread.name)
                } else {
                    format!("Added link to '{}'.", thread.name)
                };
                render::ack(json, message, json!({ "ok": true, "thread": thread }));
            }
        }
        Command::Depend {
            reference,
            on,
            why,
            what,
            how,
            when,
            remove,
        } => {
            let result = if remove {
                ops::remove_dependency(store, &reference, &on)
            } else {
                let meta = DependencyMeta {
                    why,
                    what,
                    how,
                    when,
                };
                ops::add_dependency(store, &reference, &on, meta)
            };
            if let Some(thread) = finish(result, json)? {
                let message = if remove {
                    format!("Removed dependency from '{}'.", thread.name)
                } else {
                    format!("Recorded dependency for '{}'.", thread.name)
                };
                render::ack(json, message, json!({ "ok": true, "thread": thread }));
            }
        }
        Command::Merge {
            source,
            target,
            keep,
            dry_run,
            force,
        } => {
            let planned = ops::plan_merge_op(store, &source, &target, keep);
            let Some(plan) = finish(planned, json)? else {
                return Ok(());
            };
            if dry_run {
                render::print_merge(&plan, json, false);
                return Ok(());
            }
            if !force {
                render::print_merge(&plan, false, false);
                let prompt = format!("Merge '{}' into '{}'?", plan.source_name, plan.target_name);
                if !confirm(&prompt)? {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let applied = ops::apply_merge_op(store, &source, &target, keep);
            if let Some(plan) = finish(applied, json)? {
                render::print_merge(&plan, json, true);
            }
        }
        Command::Batch {
            under,
            children_of,
            group,
            status,
            temperature,
            size,
            tag,
            importance,
            archive,
            add_tag,
            remove_tag,
            set_status,
            set_temperature,
            set_importance,
            set_size,
            note,
            dry_run,
            force,
        } => {
            let action_count = usize::from(archive)
                + usize::from(add_tag.is_some())
                + usize::from(remove_tag.is_some())
                + usize::from(set_status.is_some())
                + usize::from(set_temperature.is_some())
                + usize::from(set_importance.is_some())
                + usize::from(set_size.is_some())
                + usize::from(note.is_some());
            if action_count != 1 {
                refuse(
                    json,
                    "pass exactly one action: --archive, --add-tag, --remove-tag, --set-status, \
                     --set-temperature, --set-importance, --set-size, or --note",
                );
                return Ok(());
            }
            let parsed = (|| -> Result<(BatchAction, BatchRequest), OpError> {
                let action = if archive {
                    BatchAction::Archive
                } else if let Some(tag) = add_tag {
                    BatchAction::AddTag(tag)
                } else if let Some(tag) = remove_tag {
                    BatchAction::RemoveTag(tag)
                } else if let Some(raw) = set_status {
                    BatchAction::SetStatus(raw.parse()?)
                } else if let Some(raw) = set_temperature {
                    BatchAction::SetTemperature(raw.parse()?)
                } else if let Some(raw) = set_importance {
                    BatchAction::SetImportance(parse_importance(&raw)?)
                } else if let Some(raw) = set_size {
                    BatchAction::SetSize(raw.parse()?)
                } else {
                    BatchAction::Note(note.unwrap_or_default())
                };
                let request = BatchRequest {
                    under,
                    children_of,
                    group,
                    status: parse_opt_status(status.as_deref())?,
                    temperature: parse_opt_temperature(temperature.as_deref())?,
                    size: parse_opt_size(size.as_deref())?,
                    tag,
                    importance,
                };
                Ok((action, request))
            })();
            let Some((action, request)) = finish(parsed, json)? else {
                return Ok(());
            };
            let previewed = ops::run_batch(store, &request, &action, true);
            let Some(preview) = finish(previewed, json)? else {
                return Ok(());
            };
            if dry_run {
                render::print_batch(&preview, json);
                return Ok(());
            }
            if preview.matched == 0 {
                render::ack(
                    json,
                    "No entities matched.".to_string(),
                    json!({ "ok": true, "batch": preview }),
                );
                return Ok(());
            }
            if !force {
                println!(
                    "About to {} on {} matched entities.",
                    action.describe(),
                    preview.matched
                );
                if !confirm("Proceed?")? {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let applied: Result<BatchReport, OpError> =
                ops::run_batch(store, &request, &action, false);
            if let Some(report) = finish(applied, json)? {
                render::print_batch(&report, json);
            }
        }
        Command::Container { command } => run_container(command, store, json)?,
        Command::Group { command } => run_group(command, store, json)?,
        Command::Search { query } => {
            let result = store.load().map_err(OpError::from);
            if let Some(doc) = finish(result, json)? {
                render::print_search(&views::search(&doc, &query), json);
            }
        }
        Command::Timeline { days, limit } => {
            let result = store.load().map_err(OpError::from);
            if let Some(doc) = finish(result, json)? {
                let mut entries = views::timeline(&doc, usize::MAX);
                if let Some(days) = days {
                    let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
                    entries.retain(|entry| entry.timestamp >= cutoff);
                }
                entries.truncate(limit);
                render::print_timeline(&entries, json);
            }
        }
        Command::Next { count } => {
            let result = store.load().map_err(OpError::from);
            if let Some(doc) = finish(result, json)? {
                let count = count.unwrap_or_else(|| config::next_count(store.config()));
                render::print_next(&views::next_threads(&doc, count, Utc::now()), json);
            }
        }
        Command::Tree { reference } => {
            let result = (|| -> Result<Vec<TreeNode>, OpError> {
                let doc = store.load()?;
                let root = match reference.as_deref() {
                    Some(reference) => Some(resolve::resolve_entity(&doc, reference)?),
                    None => None,
                };
                Ok(views::tree_view(&doc, root.as_deref()))
            })();
            if let Some(nodes) = finish(result, json)? {
                render::print_tree(&nodes, json);
            }
        }
        Command::Stats => {
            let result = store.load().map_err(OpError::from);
            if let Some(doc) = finish(result, json)? {
                render::print_stats(&views::stats(&doc), json);
            }
        }
        Command::Chill { warm, dry_run } => {
            let result = ops::chill(store, warm, dry_run);
            if let Some(report) = finish(result, json)? {
                render::print_chill(&report, json);
            }
        }
        Command::Version => {
            println!("threads {}", threads_core::version());
        }
    }
    Ok(())
}

fn run_container(command: ContainerCommand, store: &Store, json: bool) -> Result<()> {
    match command {
        ContainerCommand::New {
            name,
            description,
            parent,
            group,
            tags,
        } => {
            let request = NewContainer {
                name,
                description,
                parent,
                group,
                tags,
            };
            let result = ops::create_container(store, request);
            if let Some(container) = finish(result, json)? {
                render::ack(
                    json,
                    format!(
                        "Created container {} '{}'.",
                        short_id(&container.id),
                        container.name
                    ),
                    json!({ "ok": true, "container": container }),
                );
            }
        }
        ContainerCommand::List => {
            let result = store.load().map_err(OpError::from);
            if let Some(doc) = finish(result, json)? {
                render::print_containers(&views::list_containers(&doc), json);
            }
        }
        ContainerCommand::Show { reference } => {
            let result = show_report(store, &reference, Scope::Container);
            if let Some(report) = finish(result, json)? {
                render::print_show(&report, json);
            }
        }
        ContainerCommand::Update {
            reference,
            name,
            description,
            parent,
            root_parent,
            group,
            no_group,
            add_tags,
            remove_tags,
        } => {
            if parent.is_some() && root_parent {
                refuse(json, "pass either --parent or --root-parent, not both");
                return Ok(());
            }
            if group.is_some() && no_group {
                refuse(json, "pass either --group or --no-group, not both");
                return Ok(());
            }
            let patch = ContainerPatch {
                name,
                description,
                parent: ref_change(parent, root_parent),
                group: ref_change(group, no_group),
                add_tags,
                remove_tags,
            };
            let result = ops::update_container(store, &reference, patch);
            if let Some(container) = finish(result, json)? {
                render::ack(
                    json,
                    format!(
                        "Updated container {} '{}'.",
                        short_id(&container.id),
                        container.name
                    ),
                    json!({ "ok": true, "container": container }),
                );
            }
        }
        ContainerCommand::Delete {
            reference,
            cascade,
            orphan,
            move_to,
            dry_run,
            force,
        } => {
            let strategy = match pick_strategy(cascade, orphan, move_to) {
                Ok(strategy) => strategy,
                Err(message) => {
                    refuse(json, &message);
                    return Ok(());
                }
            };
            // Resolve in container scope first so a fuzzy reference cannot
            // land on a thread.
            let resolved = (|| -> Result<String, OpError> {
                let doc = store.load()?;
                Ok(resolve::resolve_container(&doc, &reference)?)
            })();
            let Some(id) = finish(resolved, json)? else {
                return Ok(());
            };
            delete_entity(
                store,
                json,
                &id,
                DeleteFlags {
                    strategy,
                    dry_run,
                    force,
                },
            )?;
        }
    }
    Ok(())
}

fn run_group(command: GroupCommand, store: &Store, json: bool) -> Result<()> {
    match command {
        GroupCommand::New { name, description } => {
            let result = ops::create_group(store, &name, description.as_deref());
            if let Some(group) = finish(result, json)? {
                render::ack(
                    json,
                    format!("Created group {} '{}'.", short_id(&group.id), group.name),
                    json!({ "ok": true, "group": group }),
                );
            }
        }
        GroupCommand::List => {
            let result = store.load().map_err(OpError::from);
            if let Some(doc) = finish(result, json)? {
                render::print_groups(&views::list_groups(&doc), json);
            }
        }
        GroupCommand::Show { reference } => {
            let result = (|| -> Result<(threads_core::model::Group, Vec<ChildView>), OpError> {
                let doc = store.load()?;
                let id = resolve::resolve_group(&doc, &reference)?;
                let group = doc
                    .group(&id)
                    .ok_or_else(|| not_found("group", &reference))?
                    .clone();
                let members = doc
                    .entities()
                    .filter(|entity| entity.group_id() == Some(id.as_str()))
                    .map(|entity| ChildView {
                        id: entity.id().to_string(),
                        name: entity.name().to_string(),
                        kind: entity.kind(),
                    })
                    .collect();
                Ok((group, members))
            })();
            if let Some((group, members)) = finish(result, json)? {
                render::print_group_show(&group, &members, json);
            }
        }
        GroupCommand::Update {
            reference,
            name,
            description,
        } => {
            let patch = GroupPatch { name, description };
            let result = ops::update_group(store, &reference, patch);
            if let Some(group) = finish(result, json)? {
                render::ack(
                    json,
                    format!("Updated group {} '{}'.", short_id(&group.id), group.name),
                    json!({ "ok": true, "group": group }),
                );
            }
        }
        GroupCommand::Delete {
            reference,
            dry_run,
            force,
        } => {
            let planned = ops::plan_group_delete(store, &reference);
            let Some(plan) = finish(planned, json)? else {
                return Ok(());
            };
            if dry_run {
                render::print_group_delete(&plan, json, false);
                return Ok(());
            }
            if plan.members > 0 && !force {
                render::print_group_delete(&plan, false, false);
                if !confirm("Delete this group?")? {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let applied = ops::apply_group_delete(store, &reference);
            if let Some(plan) = finish(applied, json)? {
                render::print_group_delete(&plan, json, true);
            }
        }
    }
    Ok(())
}

enum Scope {
    Entity,
    Container,
}

fn show_report(store: &Store, reference: &str, scope: Scope) -> Result<ShowReport, OpError> {
    let doc = store.load()?;
    let id = match scope {
        Scope::Entity => resolve::resolve_entity(&doc, reference)?,
        Scope::Container => resolve::resolve_container(&doc, reference)?,
    };
    views::show_entity(&doc, &id, Utc::now()).ok_or_else(|| not_found("entity", reference))
}

fn ref_change(set: Option<String>, clear: bool) -> Option<RefChange> {
    if clear {
        Some(RefChange::Clear)
    } else {
        set.map(RefChange::Set)
    }
}

fn not_found(kind: &'static str, reference: &str) -> OpError {
    OpError::Resolve(ResolveError::NotFound {
        kind,
        reference: reference.to_string(),
    })
}
