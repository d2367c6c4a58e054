use zmna_search::ConjugationSearchIndex;

use crate::{print_json, App, OutputFormat};

pub(crate) async fn cmd_search(app: &App, term: &str, limit: Option<usize>) -> Result<(), String> {
    let index = ConjugationSearchIndex::new(app.store.clone(), app.settings.index);
    let summary = index
        .build_from_catalog()
        .await
        .map_err(|e| format!("error: {}", e))?;
    if summary.verbs_skipped > 0 && !app.quiet {
        eprintln!(
            "warning: {} verb(s) could not be loaded and were not searched",
            summary.verbs_skipped
        );
    }

    let mut hits = index.search(term);
    if let Some(limit) = limit {
        hits.truncate(limit);
    }

    match app.output {
        OutputFormat::Json => print_json(&hits),
        OutputFormat::Text => {
            if hits.is_empty() && !app.quiet {
                println!("no matches for '{}'", term.trim());
            }
            for hit in &hits {
                let preverb = if hit.has_multiple_preverbs {
                    hit.preverb.as_str()
                } else {
                    "-"
                };
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    hit.form,
                    hit.verb_id,
                    hit.tense.as_str(),
                    hit.person.as_str(),
                    preverb
                );
            }
        }
    }
    Ok(())
}
