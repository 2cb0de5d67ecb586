use std::sync::Arc;

use super::{ClassEntry, FunctionalShape, ROOT_CLASS, Target, Whitelist};
use crate::catalog::DescriptorCatalog;
use crate::error::Result;
use crate::typ::ScriptType;
use crate::util::fast_map::{FastHashMap, fast_hash_map_new};
use crate::val::Val;

/// Collects classes, targets and functional shapes, interning a descriptor
/// for each registered operation.
///
/// ```ignore
/// let mut b = Whitelist::builder();
/// b.class("Doc", None)
///     .method("Doc", "score", &[], ScriptType::DOUBLE, |args| Ok(Val::Double(1.0)))?;
/// let whitelist = b.build();
/// ```
pub struct WhitelistBuilder<'c> {
    catalog: &'c DescriptorCatalog,
    classes: FastHashMap<Arc<str>, ClassEntry>,
    functions: FastHashMap<Arc<str>, FastHashMap<usize, Target>>,
    shapes: FastHashMap<Arc<str>, FunctionalShape>,
}

impl WhitelistBuilder<'static> {
    pub fn new() -> Self {
        WhitelistBuilder::with_catalog(DescriptorCatalog::global())
    }
}

impl Default for WhitelistBuilder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> WhitelistBuilder<'c> {
    pub fn with_catalog(catalog: &'c DescriptorCatalog) -> Self {
        Self {
            catalog,
            classes: fast_hash_map_new(),
            functions: fast_hash_map_new(),
            shapes: fast_hash_map_new(),
        }
    }

    /// Declares a class. Without a parent the class derives from the root.
    pub fn class(&mut self, name: &str, parent: Option<&str>) -> &mut Self {
        let entry = self.entry(name);
        entry.parent = match parent {
            Some(p) => Some(Arc::from(p)),
            None if name == ROOT_CLASS => None,
            None => Some(Arc::from(ROOT_CLASS)),
        };
        self
    }

    /// Registers instance method `class.name(params) -> ret`. The host
    /// function receives the receiver as its first argument.
    pub fn method<F>(&mut self, class: &str, name: &str, params: &[ScriptType], ret: ScriptType, func: F) -> Result<&mut Self>
    where
        F: Fn(&[Val]) -> anyhow::Result<Val> + Send + Sync + 'static,
    {
        let mut full = Vec::with_capacity(params.len() + 1);
        full.push(receiver_type(class));
        full.extend_from_slice(params);
        let descriptor = self.catalog.intern(&format!("{class}.{name}"), &full, ret)?;
        self.entry(class)
            .methods
            .entry(Arc::from(name))
            .or_default()
            .insert(params.len(), Target::new(descriptor, func));
        Ok(self)
    }

    /// Registers a static function callable without a receiver.
    pub fn function<F>(&mut self, name: &str, params: &[ScriptType], ret: ScriptType, func: F) -> Result<&mut Self>
    where
        F: Fn(&[Val]) -> anyhow::Result<Val> + Send + Sync + 'static,
    {
        let descriptor = self.catalog.intern(name, params, ret)?;
        self.functions
            .entry(Arc::from(name))
            .or_default()
            .insert(params.len(), Target::new(descriptor, func));
        Ok(self)
    }

    pub fn getter<F>(&mut self, class: &str, field: &str, ty: ScriptType, func: F) -> Result<&mut Self>
    where
        F: Fn(&[Val]) -> anyhow::Result<Val> + Send + Sync + 'static,
    {
        let descriptor = self.catalog.intern(&format!("{class}.get_{field}"), &[receiver_type(class)], ty)?;
        self.entry(class).getters.insert(Arc::from(field), Target::new(descriptor, func));
        Ok(self)
    }

    /// The host function receives `[receiver, value]`.
    pub fn setter<F>(&mut self, class: &str, field: &str, ty: ScriptType, func: F) -> Result<&mut Self>
    where
        F: Fn(&[Val]) -> anyhow::Result<Val> + Send + Sync + 'static,
    {
        let descriptor = self
            .catalog
            .intern(&format!("{class}.set_{field}"), &[receiver_type(class), ty], ScriptType::Void)?;
        self.entry(class).setters.insert(Arc::from(field), Target::new(descriptor, func));
        Ok(self)
    }

    /// Registers functional shape `name` whose single method is
    /// `method(params) -> ret`.
    pub fn shape(&mut self, name: &str, method: &str, params: &[ScriptType], ret: ScriptType) -> Result<&mut Self> {
        let descriptor = self.catalog.intern(&format!("{name}.{method}"), params, ret)?;
        let name: Arc<str> = Arc::from(name);
        self.shapes.insert(
            name.clone(),
            FunctionalShape {
                name,
                method: Arc::from(method),
                descriptor,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> Whitelist {
        tracing::debug!(
            target: "scour::catalog",
            classes = self.classes.len(),
            functions = self.functions.len(),
            shapes = self.shapes.len(),
            "whitelist built"
        );
        Whitelist {
            classes: self.classes,
            functions: self.functions,
            shapes: self.shapes,
        }
    }

    fn entry(&mut self, class: &str) -> &mut ClassEntry {
        self.classes.entry(Arc::from(class)).or_insert_with(|| ClassEntry {
            parent: (class != ROOT_CLASS).then(|| Arc::from(ROOT_CLASS)),
            ..ClassEntry::default()
        })
    }
}

fn receiver_type(class: &str) -> ScriptType {
    ScriptType::parse(class).unwrap_or_else(|| ScriptType::object(class))
}
