//! Command handlers for formsensectl.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use console::style;
use owo_colors::OwoColorize;

use formsense::bank::QuestionBank;
use formsense::cache::{CacheStore, ExactCache};
use formsense::field::normalize_label;
use formsense::paths;
use formsense::review::{ReviewQueue, ReviewStatus};
use formsense::{
    ClassifierConfig, FieldDescriptor, FieldType, PageHint, Profile, TrustCascade,
};

pub fn classify(config: ClassifierConfig, file: &Path, profile: Option<&Path>) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let fields: Vec<FieldDescriptor> = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse field descriptors in {}", file.display()))?;

    let profile: Profile = match profile {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("failed to parse profile in {}", path.display()))?
        }
        None => Profile::default(),
    };

    let hints = page_hints(&fields);
    let mut cascade = TrustCascade::new(config)?;

    for (field, hint) in fields.iter().zip(&hints) {
        let resolved = cascade.classify_and_resolve(field, hint.as_ref(), &profile);
        let type_display = if resolved.field_type == FieldType::Unknown
            && resolved.answer.is_none()
        {
            format!("{}", "unresolved".red())
        } else {
            format!("{}", resolved.field_type.green())
        };
        println!(
            "{:<40} {:<24} {:<20} {:>5.2}  {}",
            truncate(&field.label, 40),
            type_display,
            resolved.source.as_str(),
            resolved.confidence,
            resolved.answer.as_deref().unwrap_or("-"),
        );
    }

    cascade.flush();
    tracing::debug!(fields = fields.len(), "classification run complete");
    Ok(())
}

/// Page-level context for groups of generically-labeled fields, so
/// tier 3 can tell several "Select One" dropdowns apart by position.
fn page_hints(fields: &[FieldDescriptor]) -> Vec<Option<PageHint>> {
    let mut hints: Vec<Option<PageHint>> = vec![None; fields.len()];

    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, field) in fields.iter().enumerate() {
        if field.has_generic_label() {
            groups
                .entry(normalize_label(&field.label))
                .or_default()
                .push(i);
        }
    }

    for indices in groups.values() {
        if indices.len() < 2 {
            continue;
        }
        let questions: Vec<String> = indices
            .iter()
            .map(|&i| {
                fields[i]
                    .section_context
                    .clone()
                    .unwrap_or_else(|| fields[i].label.clone())
            })
            .collect();
        for (position, &i) in indices.iter().enumerate() {
            hints[i] = Some(PageHint {
                questions: questions.clone(),
                position: position + 1,
                total: indices.len(),
            });
        }
    }

    hints
}

pub fn review_list(config: &ClassifierConfig) -> Result<()> {
    let queue = ReviewQueue::load(&paths::review_queue_path(&config.data_dir()))?;
    if queue.items().is_empty() {
        println!("review queue is empty");
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "{:<38} {:<10} {:<24} {}",
            "id", "status", "type", "evidence"
        ))
        .bold()
    );
    for item in queue.items() {
        let status = match item.status {
            ReviewStatus::Pending => style("pending").yellow(),
            ReviewStatus::Approved => style("approved").green(),
            ReviewStatus::Rejected => style("rejected").red(),
        };
        let evidence = item
            .evidence
            .question
            .as_deref()
            .or(item.evidence.label.as_deref())
            .unwrap_or("-");
        println!(
            "{:<38} {:<10} {:<24} {}",
            item.id,
            status,
            item.field_type.as_str(),
            truncate(evidence, 60),
        );
    }
    println!(
        "\n{} pending (approved items materialize on the next run)",
        queue.pending_count()
    );
    Ok(())
}

pub fn review_set(config: &ClassifierConfig, id: &str, approve: bool) -> Result<()> {
    let mut queue = ReviewQueue::load(&paths::review_queue_path(&config.data_dir()))?;
    let changed = if approve {
        queue.approve(id)
    } else {
        queue.reject(id)
    };
    if !changed {
        bail!("no review item with id {id}");
    }
    queue.flush();
    println!(
        "{} {}",
        id,
        if approve {
            style("approved").green()
        } else {
            style("rejected").red()
        }
    );
    Ok(())
}

pub fn cache_stats(config: &ClassifierConfig) -> Result<()> {
    let dir = config.data_dir();
    let cache = CacheStore::load(&paths::cache_store_path(&dir))?;
    let exact = ExactCache::load(&paths::exact_cache_path(&dir))?;
    let stats = cache.stats();

    println!("{}", style("cache levels").bold());
    println!("{:<12} {}", "global", stats.global);
    println!("{:<12} {}", "platform", stats.platform);
    println!("{:<12} {}", "question", stats.question);
    println!(
        "{:<12} {}  ({} verified)",
        "learned", stats.learned, stats.verified_learned
    );
    println!("{:<12} {}", "exact", exact.len());
    Ok(())
}

pub fn bank_list(config: &ClassifierConfig) -> Result<()> {
    let bank = QuestionBank::load(&paths::question_bank_path(&config.data_dir()))?;
    if bank.is_empty() {
        println!("question bank is empty");
        return Ok(());
    }

    println!(
        "{}",
        style(format!("{:<24} {:<12} {:<12} {}", "type", "source", "added", "question")).bold()
    );
    for entry in bank.entries() {
        let added = entry
            .added_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<12} {:<12} {}",
            entry.field_type.as_str(),
            entry.source,
            added,
            truncate(&entry.text, 60),
        );
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    }
}
