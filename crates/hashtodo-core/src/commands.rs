use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::TaskPersistence;
use crate::filter::ViewCategory;
use crate::render::Renderer;
use crate::store::{StoreError, TaskStore};
use crate::task::TaskId;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "toggle", "delete", "clear", "list", "shell", "show", "help", "version",
    ]
}

fn shell_command_names() -> Vec<&'static str> {
    vec![
        "add", "toggle", "delete", "clear", "list", "tab", "all", "active", "completed", "help",
        "quit", "exit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        "add" => cmd_add(store, &mut out, &inv.command_args),
        "toggle" => cmd_toggle(store, &mut out, &inv.command_args),
        "delete" => cmd_delete(store, &mut out, &inv.command_args),
        "clear" => cmd_clear(store, renderer, &mut out),
        "list" => cmd_list(store, renderer, &mut out, &inv.command_args),
        "shell" => {
            let stdin = io::stdin();
            run_shell(store, renderer, stdin.lock(), &mut out)
        }
        "show" => cmd_show(cfg, &mut out),
        "help" => cmd_help(&mut out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Maps lenient store rejections to `Ok(None)`; storage failures stay errors.
fn lenient<T>(result: Result<T, StoreError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_silent() => {
            debug!(reason = %err, "ignored request");
            Ok(None)
        }
        Err(StoreError::Storage(err)) => Err(err),
        Err(err) => Err(err.into()),
    }
}

fn parse_id(args: &[String], command: &str) -> anyhow::Result<TaskId> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("{command} requires a task id"))?;
    raw.parse::<TaskId>()
}

#[instrument(skip(store, out, args))]
fn cmd_add<P: TaskPersistence, W: Write>(
    store: &mut TaskStore<P>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command add");
    let text = args.join(" ");
    if let Some(task) = lenient(store.add(&text, Utc::now()))? {
        writeln!(out, "Created task {}.", task.id)?;
    }
    Ok(())
}

#[instrument(skip(store, out, args))]
fn cmd_toggle<P: TaskPersistence, W: Write>(
    store: &mut TaskStore<P>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command toggle");
    let id = parse_id(args, "toggle")?;
    if lenient(store.toggle(id))?.is_some()
        && let Some(task) = store.get(id)
    {
        let state = if task.is_completed() { "completed" } else { "active" };
        writeln!(out, "Task {id} is now {state}.")?;
    }
    Ok(())
}

#[instrument(skip(store, out, args))]
fn cmd_delete<P: TaskPersistence, W: Write>(
    store: &mut TaskStore<P>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");
    let id = parse_id(args, "delete")?;
    if lenient(store.delete(id))?.is_some() {
        writeln!(out, "Deleted task {id}.")?;
    }
    Ok(())
}

#[instrument(skip(store, renderer, out))]
fn cmd_clear<P: TaskPersistence, W: Write>(
    store: &mut TaskStore<P>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command clear");
    let now = Utc::now();
    let removed = store.delete_completed(now)?;
    debug!(removed, "cleared completed tasks");
    if let Some(message) = store.notifier().message_at(now) {
        renderer.write_notice(out, message)?;
    }
    Ok(())
}

#[instrument(skip(store, renderer, out, args))]
fn cmd_list<P: TaskPersistence, W: Write>(
    store: &TaskStore<P>,
    renderer: &Renderer,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    let category = args
        .first()
        .map(|raw| ViewCategory::parse_lenient(raw))
        .unwrap_or_default();
    renderer.write_tabs(out, category)?;
    renderer.write_task_table(out, category, &store.view(category))
}

fn cmd_show<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    for (key, value) in cfg.iter() {
        writeln!(out, "{key}={value}")?;
    }
    if let Some(path) = cfg.source() {
        writeln!(out, "# loaded {}", path.display())?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "usage: todo [--data DIR] [--todorc FILE] [--rc KEY=VALUE] <command> [args]\n\
         \n\
         commands:\n  \
           add <text>                  add a task\n  \
           toggle <id>                 mark a task done or not done\n  \
           delete <id>                 remove a task\n  \
           clear                       remove every completed task\n  \
           list [all|active|completed] show tasks\n  \
           shell                       interactive session\n  \
           show                        print configuration\n  \
           version                     print version"
    )?;
    Ok(())
}

/// Interactive session: one command per line, a selected tab, and the
/// notice banner redrawn until it expires.
#[instrument(skip_all)]
pub fn run_shell<P: TaskPersistence, R: BufRead, W: Write>(
    store: &mut TaskStore<P>,
    renderer: &Renderer,
    input: R,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut selected = ViewCategory::default();
    redraw(store, renderer, out, selected)?;

    for line in input.lines() {
        let line = line.context("failed reading input")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            redraw(store, renderer, out, selected)?;
            continue;
        }

        let (head, rest) = trimmed
            .split_once(char::is_whitespace)
            .map(|(head, rest)| (head, rest.trim()))
            .unwrap_or((trimmed, ""));

        let Some(command) = expand_command_abbrev(head, &shell_command_names()) else {
            writeln!(out, "unknown command: {head} (try help)")?;
            continue;
        };
        debug!(command, %selected, "shell command");

        let now = Utc::now();
        match command {
            "quit" | "exit" => break,
            "help" => {
                writeln!(
                    out,
                    "add <text>, toggle <id>, delete <id>, clear, \
                     tab <all|active|completed>, list, quit"
                )?;
                continue;
            }
            "all" | "active" | "completed" => {
                selected = ViewCategory::parse_lenient(command);
            }
            "tab" => {
                selected = ViewCategory::parse_lenient(rest);
            }
            "list" => {}
            "add" => {
                if selected.accepts_new_tasks() {
                    lenient(store.add(rest, now))?;
                } else {
                    writeln!(out, "switch to the All or Active tab to add tasks")?;
                }
            }
            "toggle" => match rest.parse::<TaskId>() {
                Ok(id) if listed_in(store, selected, id) => {
                    lenient(store.toggle(id))?;
                }
                Ok(id) => debug!(%id, %selected, "toggle ignored, task not in tab"),
                Err(err) => writeln!(out, "{err}")?,
            },
            "delete" => {
                if !selected.allows_delete() {
                    writeln!(out, "switch to the Completed tab to delete tasks")?;
                    continue;
                }
                match rest.parse::<TaskId>() {
                    Ok(id) if listed_in(store, selected, id) => {
                        lenient(store.delete(id))?;
                    }
                    Ok(id) => debug!(%id, %selected, "delete ignored, task not in tab"),
                    Err(err) => writeln!(out, "{err}")?,
                }
            }
            "clear" => {
                if !selected.allows_delete() {
                    writeln!(out, "switch to the Completed tab to clear tasks")?;
                    continue;
                }
                store.delete_completed(now)?;
            }
            other => return Err(anyhow!("unhandled shell command: {other}")),
        }

        redraw(store, renderer, out, selected)?;
    }

    Ok(())
}

/// Rows can only be acted on from the tab that lists them.
fn listed_in<P: TaskPersistence>(
    store: &TaskStore<P>,
    selected: ViewCategory,
    id: TaskId,
) -> bool {
    store.get(id).is_some_and(|task| selected.includes(task))
}

fn redraw<P: TaskPersistence, W: Write>(
    store: &mut TaskStore<P>,
    renderer: &Renderer,
    out: &mut W,
    selected: ViewCategory,
) -> anyhow::Result<()> {
    let now = Utc::now();
    store.notifier_mut().tick(now);
    let notice = store.notifier().message_at(now);
    renderer.write_view(out, selected, &store.view(selected), notice)?;
    out.flush()?;
    Ok(())
}
