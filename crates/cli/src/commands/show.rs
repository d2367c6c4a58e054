use tokio::sync::broadcast;
use zmna_core::{is_sentinel, normalize_preverb, Conjugations, Person, Tense, VerbRecord};
use zmna_store::{LazyLoader, LoadEvent};

use crate::{print_json, App, OutputFormat};

pub(crate) async fn cmd_show(app: &App, verb: &str, preverb: Option<&str>) -> Result<(), String> {
    let loader = LazyLoader::new(app.store.clone(), app.settings.lazy);
    let mut events = loader.subscribe();

    let record = match loader.navigate_to_anchor(verb).await {
        Some(record) => record,
        None => return Err(load_failure(&mut events, verb)),
    };

    let preverb = preverb
        .map(str::to_string)
        .unwrap_or_else(|| record.default_preverb().to_string());
    let multiple = record.preverb_config.has_multiple_preverbs;
    if !app.quiet && multiple && !offers_preverb(&record, &preverb) {
        eprintln!(
            "warning: '{}' is not among the preverbs of '{}'; forms use it as a literal prefix",
            preverb, record.id
        );
    }
    let forms = record.forms_for(&preverb);

    match app.output {
        OutputFormat::Text => print_table(&record, &preverb, &forms),
        OutputFormat::Json => print_json(&table_json(&record, &preverb, &forms)),
    }
    Ok(())
}

/// The error behind a failed load, as announced by the loader.
fn load_failure(events: &mut broadcast::Receiver<LoadEvent>, verb: &str) -> String {
    while let Ok(event) = events.try_recv() {
        if let LoadEvent::Failed { error, .. } = event {
            return format!("error: {}", error);
        }
    }
    format!("error: could not load verb '{}'", verb)
}

fn offers_preverb(record: &VerbRecord, preverb: &str) -> bool {
    let wanted = normalize_preverb(preverb);
    record
        .preverbs()
        .iter()
        .any(|p| normalize_preverb(p) == wanted)
}

fn print_table(record: &VerbRecord, preverb: &str, forms: &Conjugations) {
    println!("{} ({})", record.georgian, record.id);
    if !record.description.is_empty() {
        println!("{}", record.description);
    }
    if record.preverb_config.has_multiple_preverbs {
        println!(
            "preverb: {} (available: {})",
            preverb,
            record.preverbs().join(", ")
        );
    }

    for tense in Tense::ALL {
        let Some(data) = forms.get(&tense) else {
            continue;
        };
        println!();
        println!("{}", tense.as_str());
        for person in Person::ALL {
            println!("  {:<4} {}", person.as_str(), data.forms.get(person));
        }
        if let Some(english) = record.english_for(preverb, tense) {
            println!("  {:<4} {}", "en", english);
        }
    }
}

fn table_json(record: &VerbRecord, preverb: &str, forms: &Conjugations) -> serde_json::Value {
    let tenses: serde_json::Map<String, serde_json::Value> = forms
        .iter()
        .map(|(tense, data)| {
            let cells: serde_json::Map<String, serde_json::Value> = Person::ALL
                .into_iter()
                .map(|person| {
                    let form = data.forms.get(person);
                    let value = if is_sentinel(form) {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::from(form)
                    };
                    (person.as_str().to_string(), value)
                })
                .collect();
            let value = serde_json::json!({
                "forms": cells,
                "english": record.english_for(preverb, *tense),
                "examples": record.examples_for(preverb, *tense),
                "gloss": record.gloss_for(preverb, *tense),
            });
            (tense.as_str().to_string(), value)
        })
        .collect();

    serde_json::json!({
        "verb_id": record.id,
        "georgian": record.georgian,
        "description": record.description,
        "category": record.category,
        "class": record.verb_class,
        "preverb": preverb,
        "preverbs": record.preverbs(),
        "tenses": tenses,
    })
}
