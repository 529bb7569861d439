use std::collections::BTreeMap;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use dataset_common::class_map::ClassMap;
use dataset_common::config::ProjectConfig;
use dataset_common::merge::{merge_dataset, ForeignDataset, MergeOptions};
use dataset_common::translation::{resolve_translation, TranslationTable, TranslationTarget, IGNORE};

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Dataset directory or `.zip` archive holding a `data.yaml`.
    source: PathBuf,
    /// Explicit class mapping `foreign=project` (or `foreign=ignore`).
    #[arg(long = "map", value_parser = parse_mapping)]
    mappings: Vec<(String, String)>,
    /// Keep images whose every label is ignored, as negatives.
    #[arg(long, action, default_value = "false")]
    keep_negatives: bool,
    /// Frame Store split receiving the merged images.
    #[arg(long, default_value = "train")]
    split: String,
}

fn parse_mapping(s: &str) -> Result<(String, String), String> {
    let (foreign, target) = s
        .split_once('=')
        .ok_or_else(|| format!("expected foreign=project, got '{s}'"))?;
    let (foreign, target) = (foreign.trim(), target.trim());
    if foreign.is_empty() || target.is_empty() {
        return Err(format!("expected foreign=project, got '{s}'"));
    }
    Ok((foreign.to_string(), target.to_string()))
}

pub fn merge(config: &ProjectConfig, args: &MergeArgs) -> anyhow::Result<()> {
    let foreign = ForeignDataset::load(&args.source)?;
    println!("Classes in '{}': {}", foreign.name, foreign.classes);

    let explicit: BTreeMap<String, String> = args.mappings.iter().cloned().collect();
    let resolution = resolve_translation(&foreign.classes, config.classes(), &explicit);
    let mut table = resolution.table;

    if !resolution.unresolved.is_empty() {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            let answers = prompt_unresolved(
                &resolution.unresolved,
                config.classes(),
                &mut stdin.lock(),
                &mut io::stdout(),
            )
            .context("Failed to read class mapping")?;
            for (foreign_id, target) in answers {
                table.insert(foreign_id, target);
            }
        } else {
            for (foreign_id, name) in &resolution.unresolved {
                log::warn!("No mapping for '{name}'; its labels will be dropped (use --map {name}=<class>)");
                table.insert(*foreign_id, TranslationTarget::Ignore);
            }
        }
    }
    print_table(&table, &foreign.classes, config.classes());

    let options = MergeOptions {
        split: args.split.clone(),
        keep_negatives: args.keep_negatives,
    };
    let summary = merge_dataset(&foreign, &table, &config.frame_store(), &options)?;
    for (path, reason) in &summary.failed {
        log::warn!("Failed to merge {path:?}: {reason}");
    }
    println!(
        "Merged {} of {} images ({} skipped)",
        summary.merged,
        summary.images_found,
        summary.skipped()
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Asks for a project class (or `ignore`) for each unresolved foreign
/// class until a valid answer is given. End of input ignores the rest.
fn prompt_unresolved<R: BufRead, W: Write>(
    unresolved: &[(u32, String)],
    project: &ClassMap,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<Vec<(u32, TranslationTarget)>> {
    writeln!(output, "Project classes: {project}")?;
    let mut answers = Vec::with_capacity(unresolved.len());
    let mut line = String::new();
    for (foreign_id, name) in unresolved {
        let target = loop {
            write!(output, "Map '{name}' to (class name or '{IGNORE}'): ")?;
            output.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                log::warn!("Input closed; '{name}' will be ignored");
                break TranslationTarget::Ignore;
            }
            match TranslationTarget::parse(&line, project) {
                Some(target) => break target,
                None => writeln!(output, "'{}' is not a project class", line.trim())?,
            }
        };
        answers.push((*foreign_id, target));
    }
    Ok(answers)
}

fn print_table(table: &TranslationTable, foreign: &ClassMap, project: &ClassMap) {
    for (foreign_id, target) in table.iter() {
        let from = foreign.name(foreign_id).unwrap_or("?");
        let to = match target {
            TranslationTarget::Class(id) => project.name(id).unwrap_or("?"),
            TranslationTarget::Ignore => IGNORE,
        };
        println!("  {from} -> {to}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn project() -> ClassMap {
        ClassMap::from_names(["persona", "teclado", "mouse"])
    }

    #[test]
    fn test_parse_mapping() {
        assert_eq!(
            parse_mapping("keyboard = teclado").unwrap(),
            ("keyboard".to_string(), "teclado".to_string())
        );
        assert!(parse_mapping("keyboard").is_err());
        assert!(parse_mapping("=teclado").is_err());
    }

    #[test]
    fn test_prompt_retries_until_valid() {
        let unresolved = vec![(0, "keyboard".to_string()), (3, "cat".to_string())];
        let mut input = Cursor::new("tastiera\nteclado\nIgnore\n");
        let mut output = Vec::new();
        let answers = prompt_unresolved(&unresolved, &project(), &mut input, &mut output).unwrap();
        assert_eq!(
            answers,
            vec![(0, TranslationTarget::Class(1)), (3, TranslationTarget::Ignore)]
        );
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("'tastiera' is not a project class"));
    }

    #[test]
    fn test_prompt_end_of_input_ignores() {
        let unresolved = vec![(1, "dog".to_string())];
        let mut input = Cursor::new("");
        let answers = prompt_unresolved(&unresolved, &project(), &mut input, &mut Vec::new()).unwrap();
        assert_eq!(answers, vec![(1, TranslationTarget::Ignore)]);
    }
}
