use once_cell::sync::OnceCell;

use super::{Descriptor, DescriptorCatalog};
use crate::error::Result;
use crate::typ::{ScriptType, TypeTag};
use crate::util::fast_map::{FastHashMap, fast_hash_map_with_capacity};

/// Descriptors the backend itself emits, interned once at startup.
pub struct WellKnown {
    /// `(target tag, explicit, boxed)` → coercion routine descriptor.
    coercions: FastHashMap<(TypeTag, bool, bool), Descriptor>,
    /// Accumulator append routine per operand tag.
    appends: FastHashMap<TypeTag, Descriptor>,
}

static WELL_KNOWN: OnceCell<WellKnown> = OnceCell::new();

impl WellKnown {
    /// Interns the backend descriptors into the global catalog on first call.
    pub fn global() -> Result<&'static WellKnown> {
        WELL_KNOWN.get_or_try_init(|| WellKnown::build(DescriptorCatalog::global()))
    }

    pub fn build(catalog: &DescriptorCatalog) -> Result<WellKnown> {
        let def = [ScriptType::Def];
        let mut coercions = fast_hash_map_with_capacity(TypeTag::CONVERTIBLE.len() * 4);
        for tag in TypeTag::CONVERTIBLE {
            for explicit in [false, true] {
                let mode = if explicit { "explicit" } else { "implicit" };
                let (name, ret) = match tag {
                    TypeTag::Text => (format!("def_to_string_{mode}"), ScriptType::Text),
                    TypeTag::Object => (format!("def_to_object_{mode}"), ScriptType::object("Object")),
                    prim => (format!("def_to_{}_{mode}", prim.name()), ScriptType::Primitive(prim)),
                };
                coercions.insert((tag, explicit, false), catalog.intern(&name, &def, ret)?);
                if tag.is_primitive() {
                    let boxed_name = format!("def_to_boxed_{}_{mode}", tag.name());
                    let descriptor = catalog.intern(&boxed_name, &def, ScriptType::Boxed(tag))?;
                    coercions.insert((tag, explicit, true), descriptor);
                }
            }
        }

        let mut appends = fast_hash_map_with_capacity(TypeTag::CONVERTIBLE.len());
        for tag in TypeTag::CONVERTIBLE.into_iter().chain([TypeTag::Null]) {
            let operand = match tag {
                TypeTag::Text => ScriptType::Text,
                TypeTag::Object | TypeTag::Null => ScriptType::Def,
                prim => ScriptType::Primitive(prim),
            };
            let descriptor = catalog.intern(
                &format!("append_{}", tag.name()),
                &[ScriptType::Text, operand],
                ScriptType::Text,
            )?;
            appends.insert(tag, descriptor);
        }

        Ok(WellKnown { coercions, appends })
    }

    pub fn coercion(&self, target: TypeTag, explicit: bool, boxed: bool) -> Option<&Descriptor> {
        self.coercions.get(&(target, explicit, boxed))
    }

    pub fn append(&self, operand: TypeTag) -> Option<&Descriptor> {
        self.appends.get(&operand)
    }
}
