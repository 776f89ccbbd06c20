//! Typed flag values: how each supported field type renders its default,
//! parses command-line text and writes the result back.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use super::duration;

/// The closed set of flag kinds a field can be bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FlagKind {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Duration,
    StringList,
    IntList,
    StringMap,
}

impl FlagKind {
    /// Kinds that accumulate repeated command-line occurrences.
    pub fn is_collection(self) -> bool {
        matches!(self, Self::StringList | Self::IntList | Self::StringMap)
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Duration => "duration",
            Self::StringList => "string-list",
            Self::IntList => "int-list",
            Self::StringMap => "string-map",
        };
        f.write_str(name)
    }
}

/// A value that can live behind a flag.
///
/// `render` and `parse` must round-trip: the override pass re-applies a
/// rendered value through `parse`.
pub trait FlagValue: Sized + 'static {
    const KIND: FlagKind;

    fn render(&self) -> String;

    fn parse(text: &str) -> Result<Self, String>;
}

impl FlagValue for String {
    const KIND: FlagKind = FlagKind::String;

    fn render(&self) -> String {
        self.clone()
    }

    fn parse(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }
}

impl FlagValue for bool {
    const KIND: FlagKind = FlagKind::Bool;

    fn render(&self) -> String {
        self.to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        match text {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(format!("invalid boolean {text:?}")),
        }
    }
}

macro_rules! numeric_flag_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FlagValue for $ty {
                const KIND: FlagKind = FlagKind::$kind;

                fn render(&self) -> String {
                    self.to_string()
                }

                fn parse(text: &str) -> Result<Self, String> {
                    text.trim().parse().map_err(|e| format!("{e}"))
                }
            }
        )*
    };
}

numeric_flag_value! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
}

impl FlagValue for Duration {
    const KIND: FlagKind = FlagKind::Duration;

    fn render(&self) -> String {
        duration::format(*self)
    }

    fn parse(text: &str) -> Result<Self, String> {
        duration::parse(text).map_err(|e| e.to_string())
    }
}

impl FlagValue for Vec<String> {
    const KIND: FlagKind = FlagKind::StringList;

    fn render(&self) -> String {
        self.join(",")
    }

    fn parse(text: &str) -> Result<Self, String> {
        Ok(split_list(text).map(str::to_string).collect())
    }
}

impl FlagValue for Vec<i64> {
    const KIND: FlagKind = FlagKind::IntList;

    fn render(&self) -> String {
        self.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
    }

    fn parse(text: &str) -> Result<Self, String> {
        split_list(text)
            .map(|item| item.trim().parse().map_err(|e| format!("{item:?}: {e}")))
            .collect()
    }
}

impl FlagValue for HashMap<String, String> {
    const KIND: FlagKind = FlagKind::StringMap;

    fn render(&self) -> String {
        let sorted: BTreeMap<_, _> = self.iter().collect();
        render_pairs(sorted)
    }

    fn parse(text: &str) -> Result<Self, String> {
        parse_pairs(text).collect()
    }
}

impl FlagValue for BTreeMap<String, String> {
    const KIND: FlagKind = FlagKind::StringMap;

    fn render(&self) -> String {
        render_pairs(self.iter())
    }

    fn parse(text: &str) -> Result<Self, String> {
        parse_pairs(text).collect()
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').filter(|item| !item.is_empty())
}

fn render_pairs<'a>(pairs: impl IntoIterator<Item = (&'a String, &'a String)>) -> String {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_pairs(text: &str) -> impl Iterator<Item = Result<(String, String), String>> + '_ {
    split_list(text).map(|pair| {
        pair.split_once('=')
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .ok_or_else(|| format!("{pair:?} must be formatted as key=value"))
    })
}

/// Type-erased "render default, parse, write back" operations for one field
/// type, plus the kind of flag it becomes.
pub struct Adapter<V> {
    kind: FlagKind,
    render: fn(&V) -> String,
    assign: fn(&mut V, &str) -> Result<(), String>,
}

impl<V: FlagValue> Adapter<V> {
    /// The adapter for a type implementing [`FlagValue`]; use it to give
    /// your own types a [`FieldType`](super::FieldType) shape.
    pub fn of() -> Self {
        Self {
            kind: V::KIND,
            render: V::render,
            assign: assign_parsed::<V>,
        }
    }
}

impl<V: 'static> Adapter<V> {
    /// Adapter for a generic container whose concrete type `U` was identified
    /// at runtime (e.g. `Vec<E>` with `E = String`).
    pub(crate) fn erased<U: FlagValue>() -> Self {
        Self {
            kind: U::KIND,
            render: render_erased::<V, U>,
            assign: assign_erased::<V, U>,
        }
    }
}

impl<V> Adapter<V> {
    pub(crate) fn kind(&self) -> FlagKind {
        self.kind
    }

    pub(crate) fn render(&self, value: &V) -> String {
        (self.render)(value)
    }

    pub(crate) fn assign(&self, slot: &mut V, text: &str) -> Result<(), String> {
        (self.assign)(slot, text)
    }
}

impl<V> fmt::Debug for Adapter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter").field("kind", &self.kind).finish()
    }
}

fn assign_parsed<V: FlagValue>(slot: &mut V, text: &str) -> Result<(), String> {
    *slot = V::parse(text)?;
    Ok(())
}

fn render_erased<V: 'static, U: FlagValue>(value: &V) -> String {
    (value as &dyn Any)
        .downcast_ref::<U>()
        .map(U::render)
        .unwrap_or_default()
}

fn assign_erased<V: 'static, U: FlagValue>(slot: &mut V, text: &str) -> Result<(), String> {
    let slot = (slot as &mut dyn Any)
        .downcast_mut::<U>()
        .ok_or_else(|| format!("field is not a {}", U::KIND))?;
    *slot = U::parse(text)?;
    Ok(())
}
