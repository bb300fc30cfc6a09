//! Terminal output. Every printer has a JSON twin so `--json` emits the
//! same data machine-readably.

use chrono::{DateTime, Utc};
use serde_json::json;

use threads_core::criteria::BatchReport;
use threads_core::delete::DeletePlan;
use threads_core::merge::MergePlan;
use threads_core::model::{short_id, EntityKind, Group};
use threads_core::ops::{ChillReport, GroupDeletePlan};
use threads_core::views::{
    ChildView, ContainerRow, GroupRow, Recommendation, SearchHit, ShowReport, StatsReport,
    ThreadRow, TimelineEntry, TreeNode,
};

pub fn ack(json_mode: bool, message: String, payload: serde_json::Value) {
    if json_mode {
        println!("{payload}");
    } else {
        println!("{message}");
    }
}

fn date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn datetime(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

pub fn print_threads(rows: &[ThreadRow], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "threads": rows }));
        return;
    }
    if rows.is_empty() {
        println!("No threads found.");
        return;
    }
    for row in rows {
        let tags = if row.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", row.tags.join(", "))
        };
        println!(
            "{:<10} {:<36} {:<10} i{} {:<9} {:<7}{}",
            short_id(&row.id),
            truncate(&row.name, 36),
            row.status.as_str(),
            row.importance,
            row.temperature.as_str(),
            row.size.as_str(),
            tags
        );
    }
}

pub fn print_containers(rows: &[ContainerRow], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "containers": rows }));
        return;
    }
    if rows.is_empty() {
        println!("No containers found.");
        return;
    }
    for row in rows {
        let parent = row.parent.as_deref().unwrap_or("-");
        println!(
            "{:<10} {:<36} parent: {:<20} children: {}",
            short_id(&row.id),
            truncate(&row.name, 36),
            truncate(parent, 20),
            row.children
        );
    }
}

pub fn print_groups(rows: &[GroupRow], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "groups": rows }));
        return;
    }
    if rows.is_empty() {
        println!("No groups found.");
        return;
    }
    for row in rows {
        println!(
            "{:<10} {:<28} members: {:<4} {}",
            short_id(&row.id),
            truncate(&row.name, 28),
            row.members,
            truncate(&row.description, 48)
        );
    }
}

pub fn print_group_show(group: &Group, members: &[ChildView], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "group": group, "members": members }));
        return;
    }
    println!("group {}  {}", short_id(&group.id), group.name);
    if !group.description.is_empty() {
        println!("  description: {}", group.description);
    }
    if members.is_empty() {
        println!("  no members");
        return;
    }
    println!("  members:");
    for member in members {
        println!(
            "    {:<10} {} [{}]",
            short_id(&member.id),
            member.name,
            member.kind
        );
    }
}

pub fn print_show(report: &ShowReport, json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "entity": report }));
        return;
    }
    println!(
        "{} {}  {}",
        report.kind,
        short_id(&report.id),
        report.name
    );
    if let (Some(status), Some(importance), Some(temperature), Some(size)) = (
        report.status,
        report.importance,
        report.temperature,
        report.size,
    ) {
        println!("  status: {status}   importance: {importance}   temperature: {temperature}   size: {size}");
    }
    if let Some(score) = report.score {
        println!("  score: {score:.1}");
    }
    if !report.path.is_empty() {
        println!("  path: {}", report.path.join(" > "));
    }
    if let Some(group) = &report.group {
        println!("  group: {group}");
    }
    if !report.tags.is_empty() {
        println!("  tags: {}", report.tags.join(", "));
    }
    if !report.description.is_empty() {
        println!("  description: {}", report.description);
    }
    if let Some(detail) = &report.detail {
        println!("  detail: {detail}");
    }
    if !report.links.is_empty() {
        println!("  links:");
        for link in &report.links {
            println!("    {link}");
        }
    }
    if !report.dependencies.is_empty() {
        println!("  depends on:");
        for dep in &report.dependencies {
            let name = dep.name.as_deref().unwrap_or("(missing)");
            let why = dep
                .why
                .as_deref()
                .map(|why| format!("  ({why})"))
                .unwrap_or_default();
            println!("    {:<10} {}{}", short_id(&dep.thread_id), name, why);
        }
    }
    if !report.children.is_empty() {
        println!("  children:");
        for child in &report.children {
            println!("    {:<10} {} [{}]", short_id(&child.id), child.name, child.kind);
        }
    }
    match &report.siblings {
        None => println!("  siblings: (has no parent)"),
        Some(siblings) if siblings.is_empty() => {}
        Some(siblings) => {
            println!("  siblings:");
            for sibling in siblings {
                println!(
                    "    {:<10} {} [{}]",
                    short_id(&sibling.id),
                    sibling.name,
                    sibling.kind
                );
            }
        }
    }
    if !report.progress.is_empty() {
        println!("  progress:");
        for entry in report.progress.iter().rev().take(5) {
            println!("    {}  {}", datetime(entry.timestamp), entry.note);
        }
    }
    println!(
        "  created: {}   updated: {}",
        date(report.created_at),
        date(report.updated_at)
    );
}

pub fn print_search(hits: &[SearchHit], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "hits": hits }));
        return;
    }
    if hits.is_empty() {
        println!("No matches.");
        return;
    }
    for hit in hits {
        println!(
            "{:<10} {:<36} [{}] {}: {}",
            short_id(&hit.id),
            truncate(&hit.name, 36),
            hit.kind,
            hit.matched_in,
            hit.snippet
        );
    }
}

pub fn print_timeline(entries: &[TimelineEntry], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "timeline": entries }));
        return;
    }
    if entries.is_empty() {
        println!("No progress recorded yet.");
        return;
    }
    for entry in entries {
        println!(
            "{}  {:<28} {}",
            datetime(entry.timestamp),
            truncate(&entry.thread_name, 28),
            entry.note
        );
    }
}

pub fn print_next(recommendations: &[Recommendation], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "next": recommendations }));
        return;
    }
    if recommendations.is_empty() {
        println!("No active threads to recommend.");
        return;
    }
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. {:<36} score {:>5.1}  (i{}, {}, idle {:.1}d)",
            rank + 1,
            truncate(&rec.name, 36),
            rec.score,
            rec.importance,
            rec.temperature,
            rec.days_idle
        );
    }
}

fn print_tree_level(nodes: &[TreeNode], depth: usize) {
    for node in nodes {
        let detail = match (node.status, node.temperature) {
            (Some(status), Some(temperature)) => format!(" ({status}, {temperature})"),
            _ => String::new(),
        };
        let marker = match node.kind {
            EntityKind::Thread => '-',
            EntityKind::Container => '+',
        };
        println!("{}{} {}{}", "  ".repeat(depth), marker, node.name, detail);
        print_tree_level(&node.children, depth + 1);
    }
}

pub fn print_tree(nodes: &[TreeNode], json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "tree": nodes }));
        return;
    }
    if nodes.is_empty() {
        println!("Nothing to show.");
        return;
    }
    print_tree_level(nodes, 0);
}

pub fn print_stats(report: &StatsReport, json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "stats": report }));
        return;
    }
    println!(
        "{} threads, {} containers, {} groups, {} progress entries",
        report.threads, report.containers, report.groups, report.progress_entries
    );
    let status_line: Vec<String> = report
        .by_status
        .iter()
        .filter(|row| row.count > 0)
        .map(|row| format!("{} {}", row.count, row.key))
        .collect();
    if !status_line.is_empty() {
        println!("  status: {}", status_line.join(", "));
    }
    let temp_line: Vec<String> = report
        .by_temperature
        .iter()
        .filter(|row| row.count > 0)
        .map(|row| format!("{} {}", row.count, row.key))
        .collect();
    if !temp_line.is_empty() {
        println!("  temperature: {}", temp_line.join(", "));
    }
}

pub fn print_batch(report: &BatchReport, json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "ok": true, "batch": report }));
        return;
    }
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!(
        "{}Matched {}: {} changed, {} unchanged, {} skipped.",
        prefix, report.matched, report.changed, report.unchanged, report.skipped
    );
    for result in &report.results {
        println!(
            "  {:<9} {:<10} {} [{}]",
            format!("{:?}", result.outcome).to_lowercase(),
            short_id(&result.id),
            truncate(&result.name, 36),
            result.kind
        );
    }
}

pub fn print_delete_plan(plan: &DeletePlan, json_mode: bool, applied: bool) {
    if json_mode {
        println!("{}", json!({ "ok": true, "applied": applied, "plan": plan }));
        return;
    }
    let verb = if applied { "Removed" } else { "Would remove" };
    println!("{} {}:", verb, count_noun(plan.removed.len(), "entity", "entities"));
    for target in &plan.removed {
        println!(
            "  {:<10} {} [{}]",
            short_id(&target.id),
            truncate(&target.name, 36),
            target.kind
        );
    }
    if !plan.reparented.is_empty() {
        let destination = plan
            .new_parent
            .as_deref()
            .map(short_id)
            .unwrap_or("the root");
        let verb = if applied { "Reparented" } else { "Would reparent" };
        println!(
            "{} {} under {}.",
            verb,
            count_noun(plan.reparented.len(), "child", "children"),
            destination
        );
    }
    if plan.dependencies_scrubbed > 0 {
        let verb = if applied { "Dropped" } else { "Would drop" };
        println!(
            "{} {} pointing at removed threads.",
            verb,
            count_noun(plan.dependencies_scrubbed, "dependency", "dependencies")
        );
    }
}

pub fn print_group_delete(plan: &GroupDeletePlan, json_mode: bool, applied: bool) {
    if json_mode {
        println!("{}", json!({ "ok": true, "applied": applied, "plan": plan }));
        return;
    }
    if applied {
        println!(
            "Deleted group '{}'; cleared {} memberships.",
            plan.name, plan.members
        );
    } else {
        println!(
            "Would delete group '{}' and clear {} memberships.",
            plan.name, plan.members
        );
    }
}

pub fn print_merge(plan: &MergePlan, json_mode: bool, applied: bool) {
    if json_mode {
        println!("{}", json!({ "ok": true, "applied": applied, "merge": plan }));
        return;
    }
    let verb = if applied { "Merged" } else { "Would merge" };
    println!("{} '{}' into '{}'.", verb, plan.source_name, plan.target_name);
    println!(
        "  progress +{}, details +{}, tags +{}, links +{}, dependencies +{} (-{})",
        plan.progress_added,
        plan.details_added,
        plan.tags_added.len(),
        plan.links_added.len(),
        plan.dependencies_added,
        plan.dependencies_dropped
    );
    if !plan.children_moved.is_empty() {
        println!(
            "  {} reparented to the target",
            count_noun(plan.children_moved.len(), "child", "children")
        );
    }
    if plan.archive_source {
        let note = if applied {
            "source archived"
        } else {
            "source will be archived"
        };
        println!("  {note}");
    }
}

pub fn print_chill(report: &ChillReport, json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "ok": true, "chill": report }));
        return;
    }
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    if report.changes.is_empty() {
        println!(
            "{}All {} temperatures already match their activity.",
            prefix, report.considered
        );
        return;
    }
    println!(
        "{}Adjusted {} of {} threads:",
        prefix,
        report.changes.len(),
        report.considered
    );
    for change in &report.changes {
        println!(
            "  {:<36} {} -> {}",
            truncate(&change.name, 36),
            change.from,
            change.to
        );
    }
}

fn count_noun(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {plural}")
    }
}
