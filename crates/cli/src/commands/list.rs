use crate::{print_json, App, OutputFormat};

pub(crate) async fn cmd_list(app: &App) -> Result<(), String> {
    let catalog = app
        .store
        .catalog()
        .await
        .map_err(|e| format!("error: {}", e))?;

    match app.output {
        OutputFormat::Json => print_json(&catalog),
        OutputFormat::Text => {
            for meta in &catalog {
                println!("{}\t{}\t{}", meta.id, meta.georgian, meta.description);
            }
        }
    }
    Ok(())
}
