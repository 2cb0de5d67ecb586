//! Dynamic coercion table.
//!
//! Converts `def` values into typed slots (and between tags) following a
//! fixed pairwise matrix. Each conversion the code generator can emit is a
//! [`CoercionRoutine`] addressed by a catalog descriptor, e.g.
//! `def_to_int_implicit(def)int` or `def_to_boxed_long_explicit(def)Long`.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::catalog::{Descriptor, WellKnown};
use crate::error::{Result, ScriptError};
use crate::typ::{ScriptType, TypeTag};
use crate::util::fast_map::{FastHashMap, fast_hash_map_with_capacity};
use crate::val::{FromVal, Val};
use crate::whitelist::{Lookup, ROOT_CLASS};

mod matrix;
mod routines;

pub use matrix::conversion;
pub(crate) use routines::render_text;

/// How a source tag may flow into a target tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Applied automatically wherever a value flows into a typed slot.
    Implicit,
    /// Only through a cast written in the script.
    Explicit,
    Unsupported,
}

/// Which path a conversion is requested through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastMode {
    Implicit,
    Explicit,
}

impl CastMode {
    #[inline]
    pub fn is_explicit(self) -> bool {
        self == CastMode::Explicit
    }
}

impl fmt::Display for CastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastMode::Implicit => f.write_str("implicit"),
            CastMode::Explicit => f.write_str("explicit"),
        }
    }
}

/// One emitted conversion: `def` → `target` under `mode`.
#[derive(Debug, Clone)]
pub struct CoercionRoutine {
    descriptor: Descriptor,
    target: TypeTag,
    mode: CastMode,
    boxed: bool,
}

impl CoercionRoutine {
    #[inline]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    #[inline]
    pub fn target(&self) -> TypeTag {
        self.target
    }

    #[inline]
    pub fn mode(&self) -> CastMode {
        self.mode
    }

    #[inline]
    pub fn is_boxed(&self) -> bool {
        self.boxed
    }

    pub fn apply(&self, val: &Val) -> Result<Val> {
        if self.boxed && val.is_null() {
            return Ok(Val::Null);
        }
        routines::convert(val, self.target, self.mode)
    }
}

type RoutineKey = (TypeTag, CastMode, bool);

pub struct CoercionTable {
    routines: FastHashMap<RoutineKey, CoercionRoutine>,
}

static GLOBAL_TABLE: OnceCell<CoercionTable> = OnceCell::new();

impl CoercionTable {
    /// Table built over the well-known descriptors of the global catalog.
    pub fn global() -> Result<&'static CoercionTable> {
        GLOBAL_TABLE.get_or_try_init(|| Ok(CoercionTable::build(WellKnown::global()?)))
    }

    pub fn build(well_known: &WellKnown) -> CoercionTable {
        let mut routines = fast_hash_map_with_capacity(TypeTag::CONVERTIBLE.len() * 4);
        for target in TypeTag::CONVERTIBLE {
            for mode in [CastMode::Implicit, CastMode::Explicit] {
                for boxed in [false, true] {
                    if let Some(descriptor) = well_known.coercion(target, mode.is_explicit(), boxed) {
                        routines.insert(
                            (target, mode, boxed),
                            CoercionRoutine {
                                descriptor: descriptor.clone(),
                                target,
                                mode,
                                boxed,
                            },
                        );
                    }
                }
            }
        }
        CoercionTable { routines }
    }

    /// Matrix rule for a pair of tags.
    #[inline]
    pub fn conversion(from: TypeTag, to: TypeTag) -> Conversion {
        conversion(from, to)
    }

    pub fn routine(&self, target: TypeTag, mode: CastMode, boxed: bool) -> Option<&CoercionRoutine> {
        self.routines.get(&(target, mode, boxed))
    }

    /// Converts a value between tags.
    pub fn convert(&self, val: &Val, to: TypeTag, mode: CastMode) -> Result<Val> {
        routines::convert(val, to, mode)
    }

    /// Converts a value into a slot of declared type `target`.
    ///
    /// Object-typed slots consult `lookup` for class assignability; without a
    /// lookup only an exact class match or the `Object` root is accepted.
    pub fn coerce(&self, val: &Val, target: &ScriptType, mode: CastMode, lookup: Option<&dyn Lookup>) -> Result<Val> {
        match target {
            ScriptType::Def => Ok(val.clone()),
            ScriptType::Void => Ok(Val::Null),
            ScriptType::Primitive(tag) => self.routine_or_convert(val, *tag, mode, false),
            ScriptType::Boxed(tag) => self.routine_or_convert(val, *tag, mode, true),
            ScriptType::Text => self.routine_or_convert(val, TypeTag::Text, mode, false),
            ScriptType::Object(class) => match val {
                Val::Null => Ok(Val::Null),
                Val::Object(obj) => {
                    let assignable = obj.class() == class
                        || class.as_ref() == ROOT_CLASS
                        || lookup.is_some_and(|l| l.is_assignable(obj.class(), class));
                    if assignable {
                        Ok(val.clone())
                    } else {
                        Err(ScriptError::coercion(
                            TypeTag::Object,
                            class,
                            format!("{} is not assignable to {class}", obj.class()),
                        ))
                    }
                }
                // every value is an Object; other classes must be whitelisted supertypes
                other if class.as_ref() == ROOT_CLASS || lookup.is_some_and(|l| l.is_assignable(other.type_name(), class)) => {
                    Ok(other.clone())
                }
                other => Err(ScriptError::coercion(other.tag(), class, "conversion is not defined")),
            },
        }
    }

    /// Converts and unwraps into a Rust primitive.
    pub fn extract<T: FromVal>(&self, val: &Val, mode: CastMode) -> Result<T> {
        let converted = self.routine_or_convert(val, T::TAG, mode, false)?;
        T::from_val(&converted).ok_or_else(|| ScriptError::coercion(val.tag(), T::TAG, "null cannot be unboxed"))
    }

    /// Converts into a boxed slot; `null` yields `None`.
    pub fn extract_boxed<T: FromVal>(&self, val: &Val, mode: CastMode) -> Result<Option<T>> {
        if val.is_null() {
            return Ok(None);
        }
        self.extract(val, mode).map(Some)
    }

    /// Text conversion used for string operands; never fails.
    #[inline]
    pub fn to_text(&self, val: &Val) -> Arc<str> {
        render_text(val)
    }

    fn routine_or_convert(&self, val: &Val, target: TypeTag, mode: CastMode, boxed: bool) -> Result<Val> {
        match self.routine(target, mode, boxed) {
            Some(routine) => routine.apply(val),
            None => routines::convert(val, target, mode),
        }
    }
}
