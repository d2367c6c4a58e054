use zmna_store::LazyLoader;

use crate::{print_json, App, OutputFormat};

pub(crate) async fn cmd_stats(app: &App) -> Result<(), String> {
    let verb_ids = app
        .store
        .verb_ids()
        .await
        .map_err(|e| format!("error: {}", e))?;

    let loader = LazyLoader::new(app.store.clone(), app.settings.lazy);
    let loaded = loader.load_all(&verb_ids).await;
    let stats = app.store.cache_stats();

    match app.output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "verbs": verb_ids.len(),
            "loaded": loaded,
            "cache": stats,
        })),
        OutputFormat::Text => {
            println!("verbs:            {}", verb_ids.len());
            println!("loaded:           {}", stats.loaded);
            println!("failed:           {}", stats.failed);
            println!("cached resources: {}", stats.cached_resources);
        }
    }

    if loaded < verb_ids.len() {
        return Err(format!(
            "error: {} of {} verb(s) failed to load",
            verb_ids.len() - loaded,
            verb_ids.len()
        ));
    }
    Ok(())
}
