use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::{info, Level};

use lesson_editor::config::AppConfig;
use lesson_editor::models::{ComponentQuery, PublishResponse, TemplateQuery};
use lesson_editor::registry::Registry;
use lesson_editor::store::{Backend, FileStore};
use lesson_editor::sync::EditorSession;

const USAGE: &str = "usage: lesson-editor <command>

commands:
  show <page>                      print the page's blocks
  publish <page>                   publish the page's saved content
  templates <page> [search]        list the page's templates
  components <block-type> [search] search importable components
  kinds                            list the registered block types";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    let level: Level = config.log_level.parse().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
    info!("Using data directory {}", config.data_dir.display());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let registry = Arc::new(Registry::builtin()?);
    let store = Arc::new(FileStore::with_registry(&config.data_dir, (*registry).clone()));
    let backend = Backend::single(store);
    let open = |page: &str| {
        EditorSession::new(page, registry.clone(), backend.clone())
            .with_config(config.sync.clone())
    };

    match args.as_slice() {
        ["kinds"] => {
            for entry in registry.quick_insert_menu() {
                println!("{:<12} {:<14} {}", entry.tag, entry.title, entry.subtitle);
            }
        }
        ["show", page] => {
            let mut session = open(*page);
            session.load().await?;
            println!(
                "{} ({:?}, {} blocks)",
                page,
                session.state().publication_status(),
                session.state().blocks().len()
            );
            for rendered in session.render() {
                println!("{}\n", rendered.to_text());
            }
        }
        ["publish", page] => {
            let mut session = open(*page);
            session.load().await?;
            match session.publish().await? {
                PublishResponse::Success(data) => println!("published: {}", data),
                PublishResponse::Failure(failure) => {
                    println!("{}", failure.message);
                    for error in &failure.errors {
                        println!("  {}: {}", error.block_id, error.error);
                    }
                    bail!("publish rejected");
                }
            }
        }
        ["templates", page, rest @ ..] => {
            let query = TemplateQuery {
                search: rest.first().map(|s| s.to_string()),
                component_type: None,
            };
            let mut session = open(*page);
            let templates = session.list_templates(&query).await?;
            let shown = config.templates.page_size as usize;
            for template in templates.iter().take(shown) {
                println!(
                    "{:<6} {:<12} {}",
                    template.id, template.component_type, template.name
                );
            }
            if templates.len() > shown {
                println!("... and {} more", templates.len() - shown);
            }
        }
        ["components", block_type, rest @ ..] => {
            let mut query = ComponentQuery::first_page(config.components.page_size);
            if let Some(term) = rest.first() {
                query = query.search(*term);
            }
            let session = open("");
            let page = session.search_components(*block_type, &query).await?;
            for record in &page.items {
                println!("{}", record);
            }
            println!("({} of {})", page.items.len(), page.total);
        }
        _ => return Err(anyhow!("{}", USAGE)),
    }

    Ok(())
}
