//! Opening mirrored roots.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    Binding, Codec, Item, Kind, MirrorError, MirrorMap, MirrorSeq, Patch,
    hydrate::{self, Leaves, Resolved},
};
use crate::{
    Clock, Result,
    config::MirrorConfig,
    dispatch::{DispatcherOptions, OrderingKey, Priority, WriteDispatcher, WriteObserver},
    store::{DocumentStore, Filter, path},
};

/// Builder for root nodes.
///
/// A root needs a store, a filter selecting its document and the path of the
/// field it mirrors. Everything else is optional:
///
/// - `initial` contents, used when the stored field is absent or empty (or
///   always, with `overwrite`);
/// - a [`Codec`] for leaves;
/// - a `capacity` bounding a root sequence;
/// - an `observer` receiving write completions. Without one, a failed write
///   halts the root and later calls return the failure;
/// - a shared `dispatcher`; by default every root starts its own.
#[derive(Default)]
pub struct MirrorBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    filter: Option<Filter>,
    path: Option<String>,
    initial: Option<Value>,
    codec: Codec,
    capacity: Option<usize>,
    overwrite: Option<bool>,
    priority: Option<Priority>,
    observer: Option<Arc<dyn WriteObserver>>,
    clock: Option<Arc<dyn Clock>>,
    dispatcher: Option<WriteDispatcher>,
    config: MirrorConfig,
}

impl MirrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the tree is mirrored to.
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Filter selecting the backing document.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Dot-delimited path of the root field.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Initial contents.
    pub fn initial(mut self, initial: impl Into<Value>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    /// Leaf transforms.
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Maximum length of a root sequence.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Replace the stored contents with `initial` even when they are not
    /// empty, and replace a stored value of the wrong shape.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    /// Scheduling priority of this root's writes relative to other roots on
    /// a shared dispatcher.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Observer for write completions.
    pub fn observer(mut self, observer: Arc<dyn WriteObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Clock stamping completed writes.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an existing dispatcher instead of starting one.
    pub fn dispatcher(mut self, dispatcher: WriteDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Applies runtime settings. Explicit builder calls take precedence.
    pub fn config(mut self, config: &MirrorConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Opens the field as a map, hydrating it from the store.
    pub async fn open_map(self) -> Result<MirrorMap> {
        let mut opened = self.open(Kind::Map).await?;
        let fields = match std::mem::take(&mut opened.resolved.value) {
            Value::Object(fields) => fields,
            other => return Err(shape_error(&opened.path, Kind::Map, &other)),
        };
        let entries =
            hydrate::children_of_map(&opened.binding, &opened.path, fields, opened.resolved.leaves)?;
        let map = MirrorMap::root(opened.binding.clone(), opened.path.clone(), entries);
        if opened.resolved.write_through {
            opened.write_through(map.dehydrate())?;
        }
        Ok(map)
    }

    /// Opens the field as a sequence, hydrating it from the store.
    ///
    /// A bounded sequence keeps the last `capacity` elements of whatever it
    /// is opened with.
    pub async fn open_seq(self) -> Result<MirrorSeq> {
        let capacity = self.capacity;
        let mut opened = self.open(Kind::Seq).await?;
        let mut values = match std::mem::take(&mut opened.resolved.value) {
            Value::Array(values) => values,
            other => return Err(shape_error(&opened.path, Kind::Seq, &other)),
        };
        if let Some(capacity) = capacity {
            if values.len() > capacity {
                values.drain(..values.len() - capacity);
                opened.resolved.write_through = true;
            }
        }
        let items: Vec<Item> =
            hydrate::children_of_seq(&opened.binding, &opened.path, values, opened.resolved.leaves)?;
        let seq = MirrorSeq::root(opened.binding.clone(), opened.path.clone(), items, capacity);
        if opened.resolved.write_through {
            opened.write_through(seq.dehydrate())?;
        }
        Ok(seq)
    }

    async fn open(self, kind: Kind) -> Result<Opened> {
        let store = self
            .store
            .ok_or(MirrorError::MissingBinding { binding: "store" })?;
        let filter = self
            .filter
            .ok_or(MirrorError::MissingBinding { binding: "filter" })?;
        let path = self
            .path
            .map(|p| path::normalize_path(&p))
            .filter(|p| !p.is_empty())
            .ok_or(MirrorError::MissingBinding { binding: "path" })?;

        let overwrite = self.overwrite.unwrap_or(self.config.overwrite);
        let priority = self
            .priority
            .unwrap_or(Priority(self.config.default_priority));
        let key = OrderingKey::new(format!("{filter}:{path}"));

        let (dispatcher, owns_dispatcher) = match self.dispatcher {
            Some(dispatcher) => {
                if self.observer.is_some() {
                    warn!(%key, "Observer ignored: root uses a shared dispatcher");
                }
                (dispatcher, false)
            }
            None => {
                let mut options = DispatcherOptions::from_config(&self.config);
                if let Some(observer) = self.observer {
                    options = options.with_observer(observer);
                }
                if let Some(clock) = self.clock {
                    options = options.with_clock(clock);
                }
                (WriteDispatcher::start(options), true)
            }
        };

        let binding = Arc::new(Binding::new(
            store,
            filter,
            self.codec,
            dispatcher,
            key,
            priority,
            owns_dispatcher,
        ));

        let stored = hydrate::fetch(&binding, &path, kind).await?;
        let resolved = hydrate::resolve(&path, kind, stored, self.initial, overwrite)?;
        debug!(
            key = %binding.key,
            kind = kind.name(),
            write_through = resolved.write_through,
            "Opening root"
        );
        if resolved.leaves == Leaves::Stored {
            info!(key = %binding.key, "Hydrated root from store");
        }

        Ok(Opened {
            binding,
            path,
            resolved,
        })
    }
}

impl fmt::Debug for MirrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorBuilder")
            .field("filter", &self.filter)
            .field("path", &self.path)
            .field("initial", &self.initial)
            .field("capacity", &self.capacity)
            .field("overwrite", &self.overwrite)
            .field("priority", &self.priority)
            .field("shared_dispatcher", &self.dispatcher.is_some())
            .field("config", &self.config)
            .finish()
    }
}

struct Opened {
    binding: Arc<Binding>,
    path: String,
    resolved: Resolved,
}

impl Opened {
    fn write_through(&self, value: Value) -> Result<()> {
        self.binding.submit(Patch::Set {
            path: self.path.clone(),
            value,
            upsert: true,
        })?;
        Ok(())
    }
}

fn shape_error(path: &str, kind: Kind, found: &Value) -> crate::Error {
    MirrorError::TypeMismatch {
        path: path.to_string(),
        expected: kind.name(),
        found: path::kind_name(found),
    }
    .into()
}
