//! Show command - prints the documents of a persisted store.

use mirrordoc::store::{Filter, InMemory};

use crate::cli::ShowArgs;
use crate::output::{OutputFormat, print_document};

/// Run the show command
pub async fn run(args: &ShowArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemory::load_from_file(&args.store.data_file).await?;

    let documents = match &args.id {
        Some(id) => {
            let filter = Filter::new().eq("array_id", id.as_str());
            store.document(&filter).await.into_iter().collect()
        }
        None => store.documents().await,
    };

    if documents.is_empty() && format == OutputFormat::Human {
        println!("No documents in {}", args.store.data_file.display());
        return Ok(());
    }
    for document in &documents {
        print_document(document, format)?;
    }
    Ok(())
}
