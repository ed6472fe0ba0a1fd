use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use timeline_history::{
    HeadState, HistoryConfig, HistoryDocument, SnapshotId, SnapshotNode, SnapshotStore,
};

use crate::cli::*;
use crate::diff::{diff_payloads, PayloadChange};
use crate::doc_file::{load_document, save_document};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let mut doc = load_document(&cli.file)?;
    let tree_was_missing = !HistoryDocument::has_tree(&doc, &config);
    let mut store = HistoryDocument::load(&doc, &config)
        .with_context(|| format!("load history from {}", cli.file.display()))?;
    let out = Output { format: cli.format };

    let dirty = match cli.command {
        Command::Status(_) => cmd_status(&store, &out)?,
        Command::Log(args) => cmd_log(&store, args, &out)?,
        Command::Show(args) => cmd_show(&store, args, &out)?,
        Command::Commit(args) => cmd_commit(&mut store, &doc, &config, args, &out)?,
        Command::Checkout(args) => cmd_checkout(&mut store, &mut doc, &config, args, &out)?,
        Command::Diff(args) => cmd_diff(&store, &doc, &config, args, &out)?,
        Command::Rename(args) => cmd_rename(&mut store, args, &out)?,
        Command::Delete(args) => cmd_delete(&mut store, args, &out)?,
        Command::Branches(_) => cmd_branches(&store, &out)?,
        Command::Migrate(_) => cmd_migrate(&store, tree_was_missing, &out)?,
        Command::Verify(_) => cmd_verify(&store, &out)?,
    };

    if dirty {
        HistoryDocument::store_into(&store, &mut doc, &config)?;
        save_document(&cli.file, &doc)?;
        tracing::debug!(path = %cli.file.display(), "document saved");
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<HistoryConfig> {
    let Some(path) = path else {
        return Ok(HistoryConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    HistoryConfig::from_toml_str(&text).with_context(|| format!("parse {}", path.display()))
}

/// Resolve a full id or unique prefix.
fn resolve(store: &SnapshotStore, prefix: &str) -> anyhow::Result<SnapshotId> {
    match store.resolve_prefix(prefix).as_slice() {
        [] => bail!("no snapshot matches {prefix:?}"),
        [id] => Ok((*id).clone()),
        many => bail!(
            "{prefix:?} is ambiguous: {}",
            many.iter().map(|id| id.short()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Fields of the document that make up a snapshot: everything but history.
fn document_payload(doc: &Value, config: &HistoryConfig) -> Value {
    match doc {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(k, _)| **k != config.tree_key && **k != config.legacy_key)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

struct Output {
    format: OutputFormat,
}

impl Output {
    fn json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    fn emit<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotSummary {
    id: String,
    parent: Option<String>,
    timestamp: f64,
    note: String,
    branches: Vec<String>,
    head: bool,
}

impl SnapshotSummary {
    fn of(store: &SnapshotStore, node: &SnapshotNode) -> Self {
        Self {
            id: node.id.to_string(),
            parent: node.parent.as_ref().map(ToString::to_string),
            timestamp: node.timestamp.as_secs(),
            note: node.note.clone(),
            branches: branches_at(store, &node.id),
            head: store.head() == Some(&node.id),
        }
    }
}

fn branches_at(store: &SnapshotStore, id: &SnapshotId) -> Vec<String> {
    store
        .branches()
        .iter()
        .filter(|(_, tip)| *tip == Some(id))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn format_time(node: &SnapshotNode) -> String {
    let secs = node.timestamp.as_secs();
    DateTime::<Utc>::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| node.timestamp.to_string())
}

fn decorations(store: &SnapshotStore, node: &SnapshotNode) -> String {
    let mut parts = Vec::new();
    if store.head() == Some(&node.id) {
        parts.push("HEAD".cyan().bold().to_string());
    }
    for name in branches_at(store, &node.id) {
        parts.push(name.green().to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn cmd_status(store: &SnapshotStore, out: &Output) -> anyhow::Result<bool> {
    let state = store.head_state();
    if out.json() {
        let (state_name, at) = match &state {
            HeadState::Empty => ("empty", None),
            HeadState::OnTip(branch) => ("on_tip", Some(branch.clone())),
            HeadState::Detached(id) => ("detached", Some(id.to_string())),
        };
        out.emit(&serde_json::json!({
            "state": state_name,
            "at": at,
            "head": store.head().map(ToString::to_string),
            "snapshots": store.len(),
            "branches": store.branches().len(),
        }))?;
        return Ok(false);
    }

    match state {
        HeadState::Empty => println!("No snapshots yet."),
        HeadState::OnTip(branch) => println!("On branch {}", branch.yellow().bold()),
        HeadState::Detached(id) => {
            println!("HEAD detached at {}", id.short().yellow().bold());
            println!("  {}", "Committing now forks a new branch.".dimmed());
        }
    }
    if let Some(node) = store.current() {
        println!("  {} {}", node.id.short().yellow(), node.note);
    }
    println!(
        "Snapshots: {}, branches: {}",
        store.len().to_string().bold(),
        store.branches().len().to_string().bold()
    );
    Ok(false)
}

fn cmd_log(store: &SnapshotStore, args: LogArgs, out: &Output) -> anyhow::Result<bool> {
    let nodes: Vec<&SnapshotNode> = if args.all {
        store.nodes_newest_first()
    } else {
        store.head().map(|h| store.lineage(h)).unwrap_or_default()
    };
    let nodes = nodes.into_iter().take(args.limit);

    if out.json() {
        let summaries: Vec<SnapshotSummary> = nodes.map(|n| SnapshotSummary::of(store, n)).collect();
        out.emit(&summaries)?;
        return Ok(false);
    }

    let mut any = false;
    for node in nodes {
        any = true;
        if args.oneline {
            println!("{}{} {}", node.id.short().yellow(), decorations(store, node), node.note);
        } else {
            println!("{}{}", node.id.to_string().yellow().bold(), decorations(store, node));
            println!("  Date: {}", format_time(node).dimmed());
            println!("  {}", node.note);
            println!();
        }
    }
    if !any {
        println!("No snapshots yet.");
    }
    Ok(false)
}

fn cmd_show(store: &SnapshotStore, args: ShowArgs, out: &Output) -> anyhow::Result<bool> {
    let id = resolve(store, &args.id)?;
    let Some(node) = store.get(&id) else {
        bail!("no snapshot {id}");
    };

    if out.json() {
        out.emit(node)?;
        return Ok(false);
    }

    println!("Snapshot {}{}", node.id.to_string().yellow().bold(), decorations(store, node));
    println!("  Note:   {}", node.note);
    println!("  Date:   {}", format_time(node));
    match &node.parent {
        Some(parent) => println!("  Parent: {}", parent.short().yellow()),
        None => println!("  Parent: {}", "(root)".dimmed()),
    }
    println!("{}", serde_json::to_string_pretty(&node.payload)?);
    Ok(false)
}

fn cmd_commit(
    store: &mut SnapshotStore,
    doc: &Value,
    config: &HistoryConfig,
    args: CommitArgs,
    out: &Output,
) -> anyhow::Result<bool> {
    let payload = match (&args.payload, &args.payload_file) {
        (Some(text), _) => serde_json::from_str(text).context("parse --payload")?,
        (None, Some(path)) => {
            let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?
        }
        (None, None) => document_payload(doc, config),
    };
    let note = args.message.unwrap_or_else(|| config.default_note.clone());

    let id = store.commit(payload, note)?;
    let branch = store.tip_branch(&id).unwrap_or_default().to_string();

    if out.json() {
        out.emit(&serde_json::json!({ "id": id.to_string(), "branch": branch }))?;
    } else {
        println!("{} Snapshot {} on {}", "✓".green().bold(), id.short().yellow(), branch.green());
    }
    Ok(true)
}

fn cmd_checkout(
    store: &mut SnapshotStore,
    doc: &mut Value,
    config: &HistoryConfig,
    args: CheckoutArgs,
    out: &Output,
) -> anyhow::Result<bool> {
    let id = resolve(store, &args.id)?;
    let Some(payload) = store.checkout(&id).cloned() else {
        bail!("no snapshot {id}");
    };

    if args.restore {
        if let (Value::Object(fields), Value::Object(snapshot)) = (&mut *doc, &payload) {
            for (k, v) in snapshot {
                if *k != config.tree_key && *k != config.legacy_key {
                    fields.insert(k.clone(), v.clone());
                }
            }
        }
    }

    if out.json() {
        out.emit(&serde_json::json!({ "head": id.to_string(), "restored": args.restore }))?;
    } else {
        let state = match store.head_state() {
            HeadState::OnTip(branch) => format!("tip of {}", branch.green()),
            _ => "detached".yellow().to_string(),
        };
        println!("HEAD is now {} ({state})", id.short().yellow().bold());
        if args.restore {
            println!("  {} document fields restored", "✓".green());
        }
    }
    Ok(true)
}

fn cmd_diff(
    store: &SnapshotStore,
    doc: &Value,
    config: &HistoryConfig,
    args: DiffArgs,
    out: &Output,
) -> anyhow::Result<bool> {
    let id = resolve(store, &args.id)?;
    let Some(node) = store.get(&id) else {
        bail!("no snapshot {id}");
    };
    let (Value::Object(then), Value::Object(now)) = (&node.payload, doc) else {
        bail!("snapshot {} does not hold document fields", id.short());
    };
    let diff = diff_payloads(then, now, config);

    if out.json() {
        out.emit(&serde_json::json!({ "id": id.to_string(), "changes": diff.changes }))?;
        return Ok(false);
    }

    if diff.is_empty() {
        println!("{} Identical to {}", "✓".green().bold(), id.short().yellow());
        return Ok(false);
    }
    println!(
        "Document vs {}: {} changed, {} added, {} removed",
        id.short().yellow().bold(),
        diff.modifications(),
        diff.additions(),
        diff.removals()
    );
    for change in &diff.changes {
        match change {
            PayloadChange::Modified { key, old, new } => {
                println!("  {} {}", "~".yellow(), key.bold());
                println!("    {} {}", "-".red(), clip(old).red());
                println!("    {} {}", "+".green(), clip(new).green());
            }
            PayloadChange::Added { key, value } => {
                println!("  {} {} {}", "+".green(), key.bold(), clip(value).green());
            }
            PayloadChange::Removed { key, value } => {
                println!("  {} {} {}", "-".red(), key.bold(), clip(value).red());
            }
        }
    }
    Ok(false)
}

/// One-line rendering of a value, cut to 60 characters.
fn clip(value: &Value) -> String {
    const MAX: usize = 60;
    let text = value.to_string();
    match text.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text,
    }
}

fn cmd_rename(store: &mut SnapshotStore, args: RenameArgs, out: &Output) -> anyhow::Result<bool> {
    let id = resolve(store, &args.id)?;
    if !store.rename(&id, args.note.clone()) {
        bail!("no snapshot {id}");
    }
    if out.json() {
        out.emit(&serde_json::json!({ "id": id.to_string(), "note": args.note }))?;
    } else {
        println!("Renamed {} to {}", id.short().yellow(), args.note.bold());
    }
    Ok(true)
}

fn cmd_delete(store: &mut SnapshotStore, args: DeleteArgs, out: &Output) -> anyhow::Result<bool> {
    let id = resolve(store, &args.id)?;
    let pruned = branches_at(store, &id);
    let orphans = store.children(&id).len();
    if !store.delete(&id) {
        bail!("no snapshot {id}");
    }

    if out.json() {
        out.emit(&serde_json::json!({
            "deleted": id.to_string(),
            "pruned_branches": pruned,
            "orphaned_children": orphans,
            "head": store.head().map(ToString::to_string),
        }))?;
        return Ok(true);
    }

    println!("Deleted {}", id.short().yellow());
    for name in &pruned {
        println!("  {} branch {}", "pruned".red(), name);
    }
    if orphans > 0 {
        println!("  {} {orphans} child snapshot(s) now orphaned", "warning:".yellow());
    }
    Ok(true)
}

fn cmd_branches(store: &SnapshotStore, out: &Output) -> anyhow::Result<bool> {
    let current = match store.head_state() {
        HeadState::OnTip(branch) => Some(branch),
        _ => None,
    };

    if out.json() {
        let map: serde_json::Map<String, Value> = store
            .branches()
            .iter()
            .map(|(name, tip)| {
                let tip = tip.map_or(Value::Null, |t| Value::String(t.to_string()));
                (name.to_string(), tip)
            })
            .collect();
        out.emit(&map)?;
        return Ok(false);
    }

    for (name, tip) in store.branches().iter() {
        let marker = if current.as_deref() == Some(name) { "*" } else { " " };
        let tip = tip.map_or_else(|| "(empty)".dimmed().to_string(), |t| t.short().yellow().to_string());
        println!("{marker} {} {tip}", name.green());
    }
    Ok(false)
}

fn cmd_migrate(store: &SnapshotStore, tree_was_missing: bool, out: &Output) -> anyhow::Result<bool> {
    let imported = if tree_was_missing { store.len() } else { 0 };
    if out.json() {
        out.emit(&serde_json::json!({ "imported": imported }))?;
    } else if imported > 0 {
        println!("{} Imported {imported} legacy snapshot(s)", "✓".green().bold());
    } else {
        println!("Nothing to migrate.");
    }
    Ok(imported > 0)
}

fn cmd_verify(store: &SnapshotStore, out: &Output) -> anyhow::Result<bool> {
    let report = store.validate();
    if out.json() {
        let violations: Vec<Value> = report
            .violations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "kind": format!("{:?}", v.kind),
                    "subject": v.subject,
                    "description": v.description,
                })
            })
            .collect();
        out.emit(&serde_json::json!({
            "valid": report.is_valid(),
            "snapshots": report.snapshot_count,
            "branches": report.branch_count,
            "violations": violations,
        }))?;
    } else if report.is_valid() {
        println!(
            "{} {} snapshots, {} branches, no broken links",
            "✓".green().bold(),
            report.snapshot_count,
            report.branch_count
        );
    } else {
        for v in &report.violations {
            println!("{} {:?} {}: {}", "✗".red().bold(), v.kind, v.subject.yellow(), v.description);
        }
    }
    if !report.is_valid() {
        bail!("{} violation(s) found", report.violations.len());
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serde_json::json;

    use super::*;

    fn run(path: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["timeline", "--file", path.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    fn tree(path: &Path) -> SnapshotStore {
        let doc = load_document(path).unwrap();
        HistoryDocument::load(&doc, &HistoryConfig::default()).unwrap()
    }

    #[test]
    fn commit_snapshots_document_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        save_document(&path, &json!({"seed": 5, "camera": "pan"})).unwrap();

        run(&path, &["commit", "-m", "first"]).unwrap();

        let store = tree(&path);
        let head = store.current().unwrap();
        assert_eq!(head.note, "first");
        assert_eq!(head.payload, json!({"seed": 5, "camera": "pan"}));
        assert_eq!(load_document(&path).unwrap()["seed"], json!(5));
    }

    #[test]
    fn checkout_then_commit_forks_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        run(&path, &["commit", "--payload", "{\"a\":1}", "-m", "one"]).unwrap();
        let first = tree(&path).head().cloned().unwrap();
        run(&path, &["commit", "--payload", "{\"a\":2}", "-m", "two"]).unwrap();
        run(&path, &["checkout", first.short()]).unwrap();
        run(&path, &["commit", "--payload", "{\"a\":3}", "-m", "three"]).unwrap();

        let store = tree(&path);
        assert_eq!(store.len(), 3);
        assert!(store.branches().contains("branch_1"));
        assert_eq!(store.current().unwrap().parent.as_ref(), Some(&first));
    }

    #[test]
    fn checkout_restore_merges_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        save_document(&path, &json!({"seed": 1, "negative": "blur"})).unwrap();
        run(&path, &["commit", "-m", "seed one"]).unwrap();
        let first = tree(&path).head().cloned().unwrap();

        let mut doc = load_document(&path).unwrap();
        doc["seed"] = json!(2);
        save_document(&path, &doc).unwrap();

        run(&path, &["checkout", first.as_str(), "--restore"]).unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc["seed"], json!(1));
        assert_eq!(doc["negative"], json!("blur"));
    }

    #[test]
    fn migrate_persists_legacy_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        save_document(
            &path,
            &json!({"prompt_history": [{"note": "new"}, {"note": "old"}]}),
        )
        .unwrap();

        run(&path, &["migrate"]).unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc["history_tree"]["nodes"].as_object().unwrap().len(), 2);
        assert_eq!(doc["prompt_history"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn read_only_commands_leave_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        save_document(&path, &json!({"prompt_history": [{"note": "x"}]})).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        run(&path, &["status"]).unwrap();
        run(&path, &["log", "--all"]).unwrap();
        run(&path, &["branches"]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        run(&path, &["commit", "--payload", "1"]).unwrap();
        assert!(run(&path, &["checkout", "zzzz"]).is_err());
        assert!(run(&path, &["delete", "zzzz"]).is_err());
    }

    #[test]
    fn delete_prunes_and_verify_flags_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        run(&path, &["commit", "--payload", "1", "-m", "a"]).unwrap();
        let first = tree(&path).head().cloned().unwrap();
        run(&path, &["commit", "--payload", "2", "-m", "b"]).unwrap();

        run(&path, &["delete", first.as_str()]).unwrap();
        assert!(run(&path, &["verify"]).is_err());
        assert_eq!(tree(&path).len(), 1);
    }

    #[test]
    fn document_payload_skips_history_keys() {
        let doc = json!({"seed": 1, "history_tree": {}, "prompt_history": []});
        let payload = document_payload(&doc, &HistoryConfig::default());
        assert_eq!(payload, json!({"seed": 1}));
    }

    #[test]
    fn deleting_everything_does_not_bring_legacy_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        save_document(&path, &json!({"prompt_history": [{"note": "only"}]})).unwrap();

        run(&path, &["migrate"]).unwrap();
        let only = tree(&path).head().cloned().unwrap();
        run(&path, &["delete", only.as_str()]).unwrap();

        run(&path, &["migrate"]).unwrap();
        assert!(tree(&path).is_empty());
        let doc = load_document(&path).unwrap();
        assert_eq!(doc["history_tree"]["nodes"], json!({}));
    }

    #[test]
    fn diff_against_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        save_document(&path, &json!({"seed": 1, "prompt": "cat", "batch_data": [1]})).unwrap();
        run(&path, &["commit", "-m", "base"]).unwrap();
        let base = tree(&path).head().cloned().unwrap();

        let mut doc = load_document(&path).unwrap();
        doc["seed"] = json!(2);
        doc["camera"] = json!("pan");
        doc.as_object_mut().unwrap().remove("prompt");
        doc["batch_data"] = json!([2]);
        save_document(&path, &doc).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        run(&path, &["diff", base.short()]).unwrap();
        run(&path, &["--format", "json", "diff", base.as_str()]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);

        let store = tree(&path);
        let snapshot = store.get(&base).unwrap().payload.as_object().unwrap().clone();
        let diff = diff_payloads(&snapshot, doc.as_object().unwrap(), &HistoryConfig::default());
        assert_eq!(diff.modifications(), 1);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.removals(), 1);
    }

    #[test]
    fn diff_rejects_non_object_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        run(&path, &["commit", "--payload", "7"]).unwrap();
        let id = tree(&path).head().cloned().unwrap();
        assert!(run(&path, &["diff", id.as_str()]).is_err());
    }

    #[test]
    fn config_file_changes_fork_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let cfg = dir.path().join("timeline.toml");
        fs::write(&cfg, "fork_prefix = \"alt\"\n").unwrap();
        let cfg_arg = cfg.to_str().unwrap();

        run(&path, &["--config", cfg_arg, "commit", "--payload", "1"]).unwrap();
        let first = tree(&path).head().cloned().unwrap();
        run(&path, &["--config", cfg_arg, "commit", "--payload", "2"]).unwrap();
        run(&path, &["--config", cfg_arg, "checkout", first.as_str()]).unwrap();
        run(&path, &["--config", cfg_arg, "commit", "--payload", "3"]).unwrap();

        assert!(tree(&path).branches().contains("alt_1"));
    }
}
