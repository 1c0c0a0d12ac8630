//! Demo command - mirrors a bounded sequence and prints the stored result.
//!
//! The sequence always starts from `[1, 2, [6, 7, 8]]`, replacing whatever the
//! data file held at the same path, so repeated runs print the same document.

use std::sync::Arc;

use mirrordoc::{
    MirrorBuilder, MirrorConfig, MirrorSeq,
    store::{DocumentStore, Filter, InMemory},
};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::DemoArgs;
use crate::output::{OutputFormat, print_document, print_field};

/// Run the demo command
pub async fn run(args: &DemoArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => MirrorConfig::load(path).await?,
        None => MirrorConfig::default(),
    };
    let store = Arc::new(
        InMemory::load_from_file(&args.store.data_file)
            .await?
            .with_op_log_capacity(0),
    );
    let filter = Filter::new().eq("array_id", args.id.as_str());

    let arr = MirrorBuilder::new()
        .config(&config)
        .store(store.clone())
        .filter(filter.clone())
        .path(args.path.as_str())
        .initial(json!([1, 2, [6, 7, 8]]))
        .capacity(args.capacity)
        .overwrite(true)
        .open_seq()
        .await?;

    arr.append(9)?;
    arr.pop_left()?;
    // Nested sequences are nodes as soon as they exist locally
    let nested = nested_seq(&arr, 1)?;
    nested.extend([json!("a"), json!("b"), json!([4, 5, 6])])?;
    let deepest = nested_seq(&nested, -1)?;
    let popped = deepest.pop()?;

    print_field("local", &arr.snapshot(), format);
    print_field("popped", &popped, format);

    arr.shutdown().await?;
    info!(pending = arr.dispatcher().pending(arr.ordering_key()), "Demo writes drained");

    if let Some(document) = store.document(&filter).await {
        print_document(&document, format)?;
    }
    let stored = store.find_one(&filter, &arr.path()).await?;
    print_field("converged", &Value::Bool(stored == Some(arr.snapshot())), format);

    if !args.no_save {
        store.save_to_file(&args.store.data_file).await?;
        info!(file = %args.store.data_file.display(), "Saved store");
    }
    Ok(())
}

fn nested_seq(seq: &MirrorSeq, index: isize) -> Result<MirrorSeq, Box<dyn std::error::Error>> {
    seq.get(index)
        .and_then(|item| item.as_seq().cloned())
        .ok_or_else(|| format!("no nested sequence at {}.{index}", seq.path()).into())
}
